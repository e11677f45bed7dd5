//! Layout configuration shared by the table engine and the placement orchestrator.
//!
//! Every geometric constant lives here so a panel can be swapped per slide type
//! without touching rendering code. All fields have defaults, so a JSON file only
//! needs to name what it overrides.
use crate::error::RustyDeckError;
use crate::error::ResultMessage;
use crate::transform::inches_to_emu;
use crate::transform::Rect;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors related to layout configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid panel geometry '{0}'")]
    InvalidPanel(String),

    #[error("Page size for {0} must be positive")]
    InvalidPageSize(&'static str),
}

/// Geometry of the content panel a rendered table must fit in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelGeometry {
    /// Left edge of the panel (inches)
    pub panel_left: f64,
    /// Top edge of the panel (inches)
    pub panel_top: f64,
    /// Panel width (inches)
    pub panel_width: f64,
    /// Height budget (inches); small tables use less
    pub max_height: f64,
    /// Raster resolution
    pub dpi: u32,
    /// Smallest font size tried by the raster search, in rendered pixels
    pub min_font_pt: u32,
    /// Largest font size tried by the raster search, in rendered pixels
    pub max_font_pt: u32,
    /// Minimum width of a native table column (inches)
    pub min_col_width: f64,
}

impl PanelGeometry {
    pub fn new(panel_left: f64, panel_top: f64, panel_width: f64, max_height: f64) -> Self {
        PanelGeometry { panel_left, panel_top, panel_width, max_height, ..Default::default() }
    }

    /// Raster canvas size for this panel.
    pub fn canvas_pixels(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        ((self.panel_width * dpi) as u32, (self.max_height * dpi) as u32)
    }

    /// Full panel rectangle in EMU.
    pub fn bounds(&self) -> Rect {
        Rect::from_inches(self.panel_left, self.panel_top, self.panel_width, self.max_height)
    }

    pub fn min_col_width_emu(&self) -> i64 {
        inches_to_emu(self.min_col_width)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let sizes_ok = self.panel_width > 0.0 && self.max_height > 0.0 && self.dpi > 0;
        let fonts_ok = self.min_font_pt > 0 && self.min_font_pt <= self.max_font_pt;
        if sizes_ok && fonts_ok && self.min_col_width >= 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidPanel(name.to_owned()))
        }
    }
}

impl Default for PanelGeometry {
    fn default() -> Self {
        PanelGeometry {
            panel_left: 1.44,
            panel_top: 1.10,
            panel_width: 7.12,
            max_height: 3.70,
            dpi: 200,
            min_font_pt: 8,
            max_font_pt: 28,
            min_col_width: 0.55,
        }
    }
}

/// A fixed box given in inches.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxInches {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxInches {
    pub fn to_rect(&self) -> Rect {
        Rect::from_inches(self.left, self.top, self.width, self.height)
    }
}

/// Panels per slide type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelSet {
    /// Network-detection chart slides
    pub ndr: PanelGeometry,
    /// Dedicated table slides
    pub table: PanelGeometry,
    /// Everything else
    pub default: PanelGeometry,
}

impl Default for PanelSet {
    fn default() -> Self {
        PanelSet {
            ndr: PanelGeometry::new(1.44, 1.00, 7.12, 4.00),
            table: PanelGeometry::new(1.44, 1.10, 7.12, 3.25),
            default: PanelGeometry::default(),
        }
    }
}

/// Rows or items per rendered page, by content type.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationLimits {
    /// Data rows per raster table image; sized for a full-height panel at 200 dpi
    pub raster_rows: usize,
    /// Data rows per native table; the native box is smaller and uses larger type
    pub native_rows: usize,
    /// Narrative items (findings, bullets) per slide
    pub narrative_items: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        PaginationLimits { raster_rows: 40, native_rows: 7, narrative_items: 2 }
    }
}

/// How tabular assets are drawn onto a slide.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRendering {
    #[default]
    Raster,
    Native,
}

/// Ranked font identifiers with search directories; the built-in bitmap font always backs them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontStrategy {
    /// Regular weight candidates, file names or absolute paths, best first
    pub regular: Vec<String>,
    /// Bold weight candidates
    pub bold: Vec<String>,
    /// Directories searched recursively for bare file names
    pub search_dirs: Vec<PathBuf>,
}

impl FontStrategy {
    /// A strategy that always resolves to the built-in font.
    pub fn builtin_only() -> Self {
        FontStrategy { regular: Vec::new(), bold: Vec::new(), search_dirs: Vec::new() }
    }
}

impl Default for FontStrategy {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|name| name.to_string()).collect();
        FontStrategy {
            regular: names(&["Calibri.ttf", "calibri.ttf", "Carlito-Regular.ttf", "DejaVuSans.ttf", "LiberationSans-Regular.ttf", "Arial.ttf"]),
            bold: names(&["Calibri Bold.ttf", "calibrib.ttf", "Carlito-Bold.ttf", "DejaVuSans-Bold.ttf", "LiberationSans-Bold.ttf", "Arial Bold.ttf"]),
            search_dirs: vec![
                PathBuf::from("/usr/share/fonts"),
                PathBuf::from("/usr/local/share/fonts"),
                PathBuf::from("/Library/Fonts"),
                PathBuf::from("/System/Library/Fonts"),
                PathBuf::from("C:\\Windows\\Fonts"),
            ],
        }
    }
}

/// Complete configuration for one generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    pub panels: PanelSet,
    /// Zero-based slide indices that use the network-detection panel
    pub ndr_slides: BTreeSet<usize>,
    /// Zero-based slide indices that use the table panel
    pub table_slides: BTreeSet<usize>,
    /// Image box used when a slide has no placeholder to replace
    pub default_image_box: BoxInches,
    /// Box for native tables
    pub native_table_box: BoxInches,
    pub pagination: PaginationLimits,
    pub table_rendering: TableRendering,
    pub fonts: FontStrategy,
    /// Fallback date for table titles whose metadata row carries none
    pub report_date: Option<String>,
    /// Shape carrying the slide heading
    pub title_shape: String,
    /// Shape carrying the page number
    pub page_number_shape: String,
    pub continuation_suffix: String,
    /// Resolution assumed for images that do not declare one
    pub default_image_dpi: f64,
    /// Placeholder names renamed per sensor when sections are duplicated
    pub section_placeholders: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            panels: PanelSet::default(),
            ndr_slides: (5..=12).collect(),
            table_slides: [14, 15].into_iter().collect(),
            default_image_box: BoxInches { left: 1.56, top: 1.15, width: 6.88, height: 3.70 },
            native_table_box: BoxInches { left: 1.56, top: 1.20, width: 6.88, height: 2.80 },
            pagination: PaginationLimits::default(),
            table_rendering: TableRendering::Raster,
            fonts: FontStrategy::default(),
            report_date: None,
            title_shape: "slide_title".to_owned(),
            page_number_shape: "page_number".to_owned(),
            continuation_suffix: "(cont.)".to_owned(),
            default_image_dpi: 96.0,
            section_placeholders: [
                "ndr_high_trend_chart",
                "ndr_overview_chart",
                "ndr_alert_categories_chart",
                "ndr_asset_exposure_chart",
                "ndr_rare_ports_chart",
                "ndr_beaconing_chart",
                "ndr_data_exfil_chart",
                "ndr_lateral_movement_chart",
                "ndr_table",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}

impl ReportConfig {
    /// Loads and validates a configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RustyDeckError> {
        let path = path.as_ref();
        let load = || -> Result<Self, RustyDeckError> {
            let bytes = std::fs::read(path)?;
            let config: ReportConfig = serde_json::from_slice(&bytes)?;
            config.validate()?;
            Ok(config)
        };
        load().with_prefix(&format!("Failed to load configuration '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.panels.ndr.validate("ndr")?;
        self.panels.table.validate("table")?;
        self.panels.default.validate("default")?;
        if self.pagination.raster_rows == 0 {
            Err(ConfigError::InvalidPageSize("raster tables"))?
        }
        if self.pagination.native_rows == 0 {
            Err(ConfigError::InvalidPageSize("native tables"))?
        }
        if self.pagination.narrative_items == 0 {
            Err(ConfigError::InvalidPageSize("narrative content"))?
        }
        Ok(())
    }

    /// Panel for a slide, keyed by its template (pre-insertion) index.
    pub fn panel_for(&self, slide_index: usize) -> &PanelGeometry {
        if self.ndr_slides.contains(&slide_index) {
            &self.panels.ndr
        } else if self.table_slides.contains(&slide_index) {
            &self.panels.table
        } else {
            &self.panels.default
        }
    }

    /// Rows per page for the given rendering.
    pub fn rows_per_page(&self, rendering: TableRendering) -> usize {
        match rendering {
            TableRendering::Raster => self.pagination.raster_rows,
            TableRendering::Native => self.pagination.native_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn panels_follow_slide_type() {
        let config = ReportConfig::default();
        assert_eq!(config.panel_for(5).max_height, 4.00);
        assert_eq!(config.panel_for(14).max_height, 3.25);
        assert_eq!(config.panel_for(3).max_height, 3.70);
        assert_eq!(config.panel_for(5).canvas_pixels(), (1424, 800));
        assert_eq!(config.rows_per_page(TableRendering::Native), 7);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"panels": {{"table": {{"maxHeight": 2.5, "dpi": 150}}}}, "tableRendering": "native", "reportDate": "2026-10-01"}}"#).unwrap();
        let config = ReportConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.panels.table.max_height, 2.5);
        assert_eq!(config.panels.table.dpi, 150);
        assert_eq!(config.panels.table.panel_width, 7.12);
        assert_eq!(config.table_rendering, TableRendering::Native);
        assert_eq!(config.report_date.as_deref(), Some("2026-10-01"));
        assert_eq!(config.pagination.raster_rows, 40);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"panels": {{"ndr": {{"minFontPt": 30, "maxFontPt": 10}}}}}}"#).unwrap();
        let error = ReportConfig::from_json_file(file.path()).unwrap_err();
        assert!(error.to_string().contains("Invalid panel geometry 'ndr'"));
    }
}
