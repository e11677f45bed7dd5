//! # Slide Document Abstraction
//!
//! The layout engines never touch markup directly. They see a [`SlideDeck`]: slides
//! holding [`Shape`]s that advertise what they carry (text, table, picture), plus a
//! handful of explicit mutations. [`pptx::PptxDeck`] implements it over an Office
//! Open XML package and [`memory::MemoryDeck`] is a plain in-memory model.
pub mod memory;
pub mod picture;
pub mod pptx;

pub use picture::Picture;
pub use picture::PictureFormat;

use crate::error::ResultOptionChain;
use crate::error::RustyDeckError;
use crate::table::native::NativeTable;
use crate::table::style;
use crate::table::style::Rgb;
use crate::transform::Rect;
use thiserror::Error;

/// Errors raised by document operations.
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Slide index {index} is out of range, the deck has {count} slides")]
    SlideOutOfRange { index: usize, count: usize },

    #[error("Shape {id} not found on slide {slide}")]
    ShapeNotFound { slide: usize, id: u32 },

    #[error("Missing package part '{0}'")]
    MissingPart(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),
}

/// A shape as seen by the layout engines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Shape {
    /// Identifier unique within its slide
    pub id: u32,
    pub name: String,
    /// Position and size; `None` when inherited from a layout
    pub bounds: Option<Rect>,
    pub has_text: bool,
    pub has_table: bool,
    pub has_picture: bool,
    /// Text content, paragraphs separated by newlines
    pub text: String,
}

/// Horizontal text alignment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
}

/// A free-standing text box.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    pub name: String,
    pub bounds: Rect,
    pub paragraphs: Vec<String>,
    pub font_pt: f64,
    pub bold: bool,
    pub color: Rgb,
    pub align: TextAlign,
    /// Center the text vertically instead of anchoring it to the top
    pub middle: bool,
}

impl TextBox {
    /// Large centered "No Data" message across the top of a panel.
    pub fn no_data(name: &str, panel: Rect) -> Self {
        TextBox {
            name: name.to_owned(),
            bounds: Rect { height: crate::transform::inches_to_emu(0.5), ..panel },
            paragraphs: vec![style::NO_DATA_PANEL.to_owned()],
            font_pt: 24.0,
            bold: true,
            color: style::WHITE,
            align: TextAlign::Center,
            middle: true,
        }
    }

    /// One paragraph per item, top anchored.
    pub fn paragraphs(name: &str, bounds: Rect, paragraphs: Vec<String>, font_pt: f64) -> Self {
        TextBox {
            name: name.to_owned(),
            bounds,
            paragraphs,
            font_pt,
            bold: false,
            color: style::WHITE,
            align: TextAlign::Left,
            middle: false,
        }
    }
}

/// A presentation the orchestrator can inspect and mutate.
///
/// Slide indices are zero based and refer to the current order, so they shift
/// when slides are inserted.
pub trait SlideDeck {
    fn slide_count(&self) -> usize;

    /// Shapes of a slide in z-order.
    fn shapes(&self, slide: usize) -> Result<Vec<Shape>, RustyDeckError>;

    fn remove_shape(&mut self, slide: usize, id: u32) -> Result<(), RustyDeckError>;

    fn rename_shape(&mut self, slide: usize, id: u32, name: &str) -> Result<(), RustyDeckError>;

    /// Replaces the text of a shape, keeping the formatting of its first run.
    /// Returns false when the shape has no text body.
    fn replace_text(&mut self, slide: usize, id: u32, text: &str) -> Result<bool, RustyDeckError>;

    /// Adds a picture stretched to `bounds` and returns its shape id.
    fn add_picture(&mut self, slide: usize, picture: &Picture, bounds: Rect, name: &str) -> Result<u32, RustyDeckError>;

    fn add_table(&mut self, slide: usize, table: &NativeTable, name: &str) -> Result<u32, RustyDeckError>;

    fn add_text_box(&mut self, slide: usize, text_box: &TextBox) -> Result<u32, RustyDeckError>;

    /// Inserts a copy of `source` (shapes and chrome) so that it ends up at `position`.
    fn duplicate_slide(&mut self, source: usize, position: usize) -> Result<(), RustyDeckError>;

    fn check_slide(&self, slide: usize) -> Result<(), DeckError> {
        if slide < self.slide_count() {
            Ok(())
        } else {
            Err(DeckError::SlideOutOfRange { index: slide, count: self.slide_count() })
        }
    }

    fn find_shape(&self, slide: usize, name: &str) -> Result<Option<Shape>, RustyDeckError> {
        Ok(self.shapes(slide)?.into_iter().find(|shape| shape.name == name))
    }

    fn first_table_shape(&self, slide: usize) -> Result<Option<Shape>, RustyDeckError> {
        Ok(self.shapes(slide)?.into_iter().find(|shape| shape.has_table))
    }

    /// First shape matching any of `names`, else the first table on the slide.
    fn find_placeholder(&self, slide: usize, names: &[String]) -> Result<Option<Shape>, RustyDeckError> {
        let shapes = self.shapes(slide)?;
        let named = names.iter().find_map(|name| shapes.iter().find(|shape| &shape.name == name).cloned());
        Ok(named).ok_none_else(|| self.first_table_shape(slide))
    }

    /// Text of the named shape, if present.
    fn shape_text(&self, slide: usize, name: &str) -> Result<Option<String>, RustyDeckError> {
        Ok(self.find_shape(slide, name)?.map(|shape| shape.text))
    }

    /// Sets the text of every shape called `name`; returns how many were updated.
    fn set_text_by_name(&mut self, slide: usize, name: &str, text: &str) -> Result<usize, RustyDeckError> {
        let targets: Vec<u32> = self
            .shapes(slide)?
            .into_iter()
            .filter(|shape| shape.name == name && shape.has_text)
            .map(|shape| shape.id)
            .collect();
        let mut updated = 0;
        for id in targets {
            if self.replace_text(slide, id, text)? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
