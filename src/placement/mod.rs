//! # Placement Orchestrator
//!
//! Walks a batch of [`PlacementAsset`]s against an open [`SlideDeck`]: resolves each
//! target placeholder, swaps it for the rendered content, inserts continuation slides
//! for paginated content and records one [`AuditRecord`] per attempt. A failing asset
//! is recorded and skipped; it never stops the batch.
//!
//! [`SlideDeck`]: crate::document::SlideDeck
pub mod audit;
pub mod cleanup;
pub mod orchestrator;
pub mod sensors;

pub use audit::AuditRecord;
pub use audit::AuditSummary;
pub use audit::PlacementStatus;
pub use cleanup::cleanup_placeholder_tables;
pub use cleanup::renumber_pages;
pub use orchestrator::PlacementOrchestrator;
pub use orchestrator::PlacementSummary;
pub use sensors::duplicate_sections_for_sensors;
pub use sensors::remap_assets_for_sensors;
pub use sensors::SensorSections;

use crate::config::TableRendering;
use crate::table::TableData;
use crate::transform::Rect;
use std::path::PathBuf;
use thiserror::Error;

/// Group name used for assets without a sensor tag
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Errors raised while placing a single asset.
#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("Asset not found: '{0}'")]
    AssetNotFound(String),

    #[error("No placeholder named {names:?} and no table on slide {slide}")]
    PlaceholderNotFound { slide: usize, names: Vec<String> },

    #[error("Slide index {index} is out of range, the deck has {count} slides")]
    SlideIndexOutOfRange { index: usize, count: usize },

    #[error("Placement cancelled before this asset was started")]
    Cancelled,
}

/// Content carried by an asset.
#[derive(Clone, Debug, PartialEq)]
pub enum AssetSource {
    /// Chart or screenshot on disk
    Image(PathBuf),
    /// CSV export on disk
    Table(PathBuf),
    /// Table already loaded by the caller
    TableData(TableData),
    /// Findings or bullet items, one paragraph each
    Narrative(Vec<String>),
}

/// A unit of work for the orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementAsset {
    pub source: AssetSource,
    /// Target slide, zero based, in the deck as it is when the batch starts
    pub slide_index: usize,
    /// Slide the asset was authored against; selects the panel geometry
    pub template_slide: usize,
    /// Placeholder to replace
    pub shape_name: String,
    /// Explicit box; bypasses placeholder lookup
    pub fixed_box: Option<Rect>,
    pub original_filename: Option<String>,
    /// Caller-supplied label, preferred over the file name
    pub given_label: Option<String>,
    pub sensor: Option<String>,
    /// Overrides the configured table rendering
    pub table_mode: Option<TableRendering>,
}

impl PlacementAsset {
    pub fn new(source: AssetSource, slide_index: usize, shape_name: &str) -> Self {
        let original_filename = match &source {
            AssetSource::Image(path) | AssetSource::Table(path) => {
                path.file_name().map(|name| name.to_string_lossy().into_owned())
            }
            _ => None,
        };
        PlacementAsset {
            source,
            slide_index,
            template_slide: slide_index,
            shape_name: shape_name.to_owned(),
            fixed_box: None,
            original_filename,
            given_label: None,
            sensor: None,
            table_mode: None,
        }
    }

    pub fn image<P: Into<PathBuf>>(path: P, slide_index: usize, shape_name: &str) -> Self {
        Self::new(AssetSource::Image(path.into()), slide_index, shape_name)
    }

    pub fn table<P: Into<PathBuf>>(path: P, slide_index: usize, shape_name: &str) -> Self {
        Self::new(AssetSource::Table(path.into()), slide_index, shape_name)
    }

    pub fn with_sensor(mut self, sensor: &str) -> Self {
        self.sensor = Some(sensor.to_owned());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.given_label = Some(label.to_owned()).filter(|label| !label.trim().is_empty());
        self
    }

    pub fn with_box(mut self, bounds: Rect) -> Self {
        self.fixed_box = Some(bounds);
        self
    }

    pub fn with_table_mode(mut self, mode: TableRendering) -> Self {
        self.table_mode = Some(mode);
        self
    }

    /// Name used in logs and audit records.
    pub fn label(&self) -> String {
        if let Some(label) = &self.given_label {
            return label.clone();
        }
        match &self.original_filename {
            Some(name) if !name.is_empty() => name.clone(),
            _ if !self.shape_name.is_empty() => self.shape_name.clone(),
            _ => format!("slide {} asset", self.slide_index + 1),
        }
    }

    /// Sensor tag, or the default group.
    pub fn group(&self) -> &str {
        match self.sensor.as_deref() {
            Some(sensor) if !sensor.trim().is_empty() => sensor,
            _ => DEFAULT_GROUP,
        }
    }

    /// Path of the backing file, if any.
    pub fn source_path(&self) -> Option<String> {
        match &self.source {
            AssetSource::Image(path) | AssetSource::Table(path) => Some(path.display().to_string()),
            _ => None,
        }
    }

    /// Placeholder names to try, most specific first.
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2);
        if let Some(sensor) = self.sensor.as_deref().filter(|sensor| !sensor.eq_ignore_ascii_case(DEFAULT_GROUP)) {
            names.push(format!("{}_{}", self.shape_name, sensor.to_lowercase()));
        }
        names.push(self.shape_name.clone());
        names
    }
}
