//! One network-detection section per sensor.
use crate::config::ReportConfig;
use crate::document::SlideDeck;
use crate::error::RustyDeckError;
use crate::placement::orchestrator::continuation_title;
use crate::placement::PlacementAsset;
use crate::placement::PlacementError;
use log::debug;
use log::info;
use std::collections::BTreeMap;

/// Slides of each sensor's section after duplication.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SensorSections {
    /// Sensor to its section slides, in section order
    pub slides: BTreeMap<String, Vec<usize>>,
    /// Base slide positions, in section order
    pub base_slides: Vec<usize>,
    /// First inserted slide
    pub insert_at: usize,
    /// Number of slides inserted
    pub inserted: usize,
}

impl SensorSections {
    fn section_of(&self, sensor: &str) -> Option<&Vec<usize>> {
        self.slides.iter().find(|(name, _)| name.eq_ignore_ascii_case(sensor)).map(|(_, slides)| slides)
    }
}

/// Duplicates the section made of `base_slides` once per sensor after the first.
///
/// The copies go right after the last base slide, in sensor order. Each copy gets
/// ` (SENSOR)` appended to its title, and the section placeholders named in the
/// configuration are renamed `<name>_<sensor>` so assets can target them.
///
/// # Arguments
/// * `deck` - Document to mutate
/// * `config` - Supplies the title shape and section placeholder names
/// * `sensors` - Sensor labels; the first one keeps the base slides
/// * `base_slides` - Slides making up the section
///
/// # Returns
/// Where each sensor's section ended up
pub fn duplicate_sections_for_sensors<D: SlideDeck + ?Sized>(
    deck: &mut D,
    config: &ReportConfig,
    sensors: &[String],
    base_slides: &[usize],
) -> Result<SensorSections, RustyDeckError> {
    let mut base: Vec<usize> = base_slides.to_vec();
    base.sort_unstable();
    base.dedup();
    if let Some(&index) = base.iter().find(|&&index| index >= deck.slide_count()) {
        Err(PlacementError::SlideIndexOutOfRange { index, count: deck.slide_count() })?
    }

    let insert_at = base.last().map(|last| last + 1).unwrap_or(0);
    let mut sections = SensorSections { base_slides: base.clone(), insert_at, ..Default::default() };
    let Some((first, others)) = sensors.split_first() else { return Ok(sections) };
    sections.slides.insert(first.clone(), base.clone());

    let mut position = insert_at;
    for sensor in others {
        let suffix = sensor.to_lowercase();
        let mut copies = Vec::with_capacity(base.len());
        for &source in &base {
            deck.duplicate_slide(source, position)?;
            let title = deck.shape_text(position, &config.title_shape)?.unwrap_or_default();
            let title = continuation_title(&title, &format!("({})", sensor));
            deck.set_text_by_name(position, &config.title_shape, &title)?;
            for shape in deck.shapes(position)? {
                if config.section_placeholders.contains(&shape.name) {
                    deck.rename_shape(position, shape.id, &format!("{}_{}", shape.name, suffix))?;
                }
            }
            copies.push(position);
            position += 1;
        }
        debug!("Section for sensor '{}' on slides {:?}", sensor, copies);
        sections.slides.insert(sensor.clone(), copies);
    }
    sections.inserted = position - insert_at;
    info!("Duplicated {} slide(s) for {} sensor(s)", sections.inserted, sensors.len());
    Ok(sections)
}

/// Points assets at their sensor's section.
///
/// A tagged asset aimed at a base slide moves to the same offset in its sensor's
/// section. Any other asset past the section shifts by the number of inserted slides.
pub fn remap_assets_for_sensors(assets: &mut [PlacementAsset], sections: &SensorSections) {
    for asset in assets.iter_mut() {
        let offset = sections.base_slides.iter().position(|&slide| slide == asset.slide_index);
        let section = asset.sensor.as_deref().and_then(|sensor| sections.section_of(sensor));
        match (offset, section) {
            (Some(offset), Some(section)) => {
                if let Some(&slide) = section.get(offset) {
                    asset.slide_index = slide;
                }
            }
            _ if asset.slide_index >= sections.insert_at => asset.slide_index += sections.inserted,
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::MemoryDeck;
    use crate::transform::Rect;

    fn sensors() -> Vec<String> {
        vec!["VAPRD".to_owned(), "Sensor-B".to_owned(), "HQ".to_owned()]
    }

    /// Slides 2 and 3 form the section; slide 4 is a table slide after it.
    fn deck() -> MemoryDeck {
        let mut deck = MemoryDeck::new(5);
        let bar = Rect::sized(100, 10).unwrap();
        for slide in 0..5 {
            deck.add_text_shape(slide, "slide_title", &format!("Slide {}", slide + 1), bar).unwrap();
        }
        deck.add_plain_shape(2, "ndr_overview_chart", Some(bar)).unwrap();
        deck.add_table_placeholder(3, "ndr_table", bar).unwrap();
        deck.add_plain_shape(3, "logo", Some(bar)).unwrap();
        deck
    }

    #[test]
    fn sections_are_copied_per_sensor() {
        let mut deck = deck();
        let sections = duplicate_sections_for_sensors(&mut deck, &ReportConfig::default(), &sensors(), &[3, 2]).unwrap();

        assert_eq!(deck.slide_count(), 9);
        assert_eq!(sections.inserted, 4);
        assert_eq!(sections.slides["VAPRD"], vec![2, 3]);
        assert_eq!(sections.slides["Sensor-B"], vec![4, 5]);
        assert_eq!(sections.slides["HQ"], vec![6, 7]);

        assert_eq!(deck.shape_text(4, "slide_title").unwrap().as_deref(), Some("Slide 3 (Sensor-B)"));
        assert_eq!(deck.shape_text(7, "slide_title").unwrap().as_deref(), Some("Slide 4 (HQ)"));
        assert!(deck.find_shape(4, "ndr_overview_chart_sensor-b").unwrap().is_some());
        assert!(deck.find_shape(7, "ndr_table_hq").unwrap().is_some());
        assert!(deck.find_shape(7, "logo").unwrap().is_some());
        assert!(deck.find_shape(3, "ndr_table").unwrap().is_some());
        assert_eq!(deck.shape_text(8, "slide_title").unwrap().as_deref(), Some("Slide 5"));
    }

    #[test]
    fn assets_follow_their_section() {
        let mut deck = deck();
        let sections = duplicate_sections_for_sensors(&mut deck, &ReportConfig::default(), &sensors(), &[2, 3]).unwrap();
        let mut assets = vec![
            PlacementAsset::image("a.png", 2, "ndr_overview_chart").with_sensor("VAPRD"),
            PlacementAsset::image("b.png", 3, "ndr_table").with_sensor("hq"),
            PlacementAsset::table("c.csv", 4, "summary_table"),
            PlacementAsset::image("d.png", 1, "cover"),
            PlacementAsset::image("e.png", 2, "ndr_overview_chart").with_sensor("unknown"),
        ];
        remap_assets_for_sensors(&mut assets, &sections);
        let slides: Vec<usize> = assets.iter().map(|asset| asset.slide_index).collect();
        assert_eq!(slides, vec![2, 7, 8, 1, 2]);
        assert_eq!(assets[1].template_slide, 3);
        assert_eq!(assets[1].placeholder_names()[0], "ndr_table_hq");
    }

    #[test]
    fn single_sensor_changes_nothing() {
        let mut deck = deck();
        let sections = duplicate_sections_for_sensors(&mut deck, &ReportConfig::default(), &sensors()[..1], &[2, 3]).unwrap();
        assert_eq!(deck.slide_count(), 5);
        assert_eq!(sections.inserted, 0);
        assert!(duplicate_sections_for_sensors(&mut deck, &ReportConfig::default(), &sensors(), &[2, 9]).is_err());
    }
}
