//! Finishing passes run after every asset has been placed.
use crate::document::SlideDeck;
use crate::document::TextBox;
use crate::error::RustyDeckError;
use log::debug;
use log::info;

/// Rewrites every page number shape with its slide's 1-based position.
///
/// # Returns
/// Number of shapes updated
pub fn renumber_pages<D: SlideDeck + ?Sized>(deck: &mut D, shape_name: &str) -> Result<usize, RustyDeckError> {
    let mut updated = 0;
    for slide in 0..deck.slide_count() {
        updated += deck.set_text_by_name(slide, shape_name, &(slide + 1).to_string())?;
    }
    debug!("Renumbered {} page number shape(s)", updated);
    Ok(updated)
}

/// Replaces template tables nobody filled with a "No Data" message.
///
/// A template table counts as untouched while none of its cells holds text.
/// Slides out of range are ignored.
///
/// # Returns
/// Number of tables replaced
pub fn cleanup_placeholder_tables<D: SlideDeck + ?Sized>(deck: &mut D, slides: &[usize]) -> Result<usize, RustyDeckError> {
    let mut replaced = 0;
    for &slide in slides {
        if slide >= deck.slide_count() {
            continue;
        }
        let leftovers: Vec<_> = deck
            .shapes(slide)?
            .into_iter()
            .filter(|shape| shape.has_table && shape.text.trim().is_empty())
            .collect();
        for shape in leftovers {
            let Some(bounds) = shape.bounds else {
                debug!("Leaving table '{}' on slide {}: it has no position of its own", shape.name, slide + 1);
                continue;
            };
            deck.remove_shape(slide, shape.id)?;
            deck.add_text_box(slide, &TextBox::no_data(&shape.name, bounds))?;
            info!("Replaced unused table '{}' on slide {} with a No Data message", shape.name, slide + 1);
            replaced += 1;
        }
    }
    Ok(replaced)
}
