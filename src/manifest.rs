//! Layout manifests: which image goes on which slide, as JSON or CSV.
//!
//! Each entry names a slide, an image and either a placeholder shape or an explicit
//! box in EMU. An entry without a shape name is placed freely into its box.
use crate::error::ResultMessage;
use crate::error::RustyDeckError;
use crate::placement::PlacementAsset;
use crate::table::csv;
use crate::transform::Rect;
use log::info;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Columns every manifest must carry
const REQUIRED_COLUMNS: [&str; 2] = ["slide_index", "image_path"];

/// Errors related to layout manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Unsupported manifest format '{0}', expected .json or .csv")]
    UnsupportedFormat(String),

    #[error("Manifest is missing columns: {0}")]
    MissingColumns(String),

    #[error("Invalid {column} '{value}' in manifest row {row}")]
    InvalidValue { row: usize, column: &'static str, value: String },
}

/// One manifest row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub slide_index: usize,
    #[serde(default)]
    pub shape_name: String,
    pub image_path: String,
    #[serde(default)]
    pub box_x_emu: Option<i64>,
    #[serde(default)]
    pub box_y_emu: Option<i64>,
    #[serde(default)]
    pub box_w_emu: Option<i64>,
    #[serde(default)]
    pub box_h_emu: Option<i64>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sensor: Option<String>,
}

impl ManifestEntry {
    /// The explicit box, when all four coordinates are present.
    pub fn fixed_box(&self) -> Option<Rect> {
        match (self.box_x_emu, self.box_y_emu, self.box_w_emu, self.box_h_emu) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(Rect { x, y, width, height }),
            _ => None,
        }
    }

    /// Builds the placement asset, resolving a relative image path against `assets_dir`.
    pub fn to_asset(&self, assets_dir: &Path) -> PlacementAsset {
        let path = PathBuf::from(&self.image_path);
        let path = if path.is_absolute() { path } else { assets_dir.join(path) };
        let mut asset = PlacementAsset::image(path, self.slide_index, self.shape_name.trim()).with_label(&self.label);
        if self.shape_name.trim().is_empty() {
            asset.fixed_box = self.fixed_box();
        }
        if let Some(sensor) = self.sensor.as_deref().filter(|sensor| !sensor.trim().is_empty()) {
            asset = asset.with_sensor(sensor.trim());
        }
        asset
    }
}

/// A loaded manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Loads a `.json` or `.csv` manifest.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RustyDeckError> {
        let path = path.as_ref();
        let extension = path.extension().map(|extension| extension.to_string_lossy().to_lowercase()).unwrap_or_default();
        let load = || -> Result<Self, RustyDeckError> {
            let manifest = match extension.as_str() {
                "json" => Self::from_json(&std::fs::read(path)?)?,
                "csv" => Self::from_records(csv::read_records(path)?)?,
                _ => Err(ManifestError::UnsupportedFormat(extension.clone()))?,
            };
            info!("Loaded manifest with {} entries from '{}'", manifest.entries.len(), path.display());
            Ok(manifest)
        };
        load().with_prefix(&format!("Failed to load manifest '{}'", path.display()))
    }

    /// Parses a JSON array of entries.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RustyDeckError> {
        let entries: Vec<ManifestEntry> = serde_json::from_slice(bytes)?;
        Ok(Manifest { entries })
    }

    /// Parses CSV records; the first record holds the column names.
    pub fn from_records(records: Vec<Vec<String>>) -> Result<Self, RustyDeckError> {
        let mut records = records.into_iter();
        let header = records.next().unwrap_or_default();
        let columns: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_lowercase(), index))
            .collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS.iter().copied().filter(|column| !columns.contains_key(*column)).collect();
        if !missing.is_empty() {
            Err(ManifestError::MissingColumns(missing.join(", ")))?
        }

        let mut entries = Vec::new();
        for (index, record) in records.enumerate() {
            let row = Row { number: index + 1, record: &record, columns: &columns };
            let slide_index = row.integer("slide_index")?.unwrap_or(0);
            let slide_index = usize::try_from(slide_index).map_err(|_| ManifestError::InvalidValue {
                row: row.number,
                column: "slide_index",
                value: slide_index.to_string(),
            })?;
            entries.push(ManifestEntry {
                slide_index,
                shape_name: row.text("shape_name"),
                image_path: row.text("image_path"),
                box_x_emu: row.integer("box_x_emu")?,
                box_y_emu: row.integer("box_y_emu")?,
                box_w_emu: row.integer("box_w_emu")?,
                box_h_emu: row.integer("box_h_emu")?,
                label: row.text("label"),
                sensor: Some(row.text("sensor")).filter(|sensor| !sensor.is_empty()),
            });
        }
        Ok(Manifest { entries })
    }

    pub fn to_assets(&self, assets_dir: &Path) -> Vec<PlacementAsset> {
        self.entries.iter().map(|entry| entry.to_asset(assets_dir)).collect()
    }
}

/// A CSV record addressed by column name.
struct Row<'a> {
    number: usize,
    record: &'a [String],
    columns: &'a HashMap<String, usize>,
}

impl Row<'_> {
    fn text(&self, column: &str) -> String {
        self.columns
            .get(column)
            .and_then(|index| self.record.get(*index))
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    }

    /// Integer cell; spreadsheets export whole numbers as `914400.0`, which is accepted.
    fn integer(&self, column: &'static str) -> Result<Option<i64>, ManifestError> {
        let value = self.text(column);
        if value.is_empty() {
            return Ok(None);
        }
        let invalid = || ManifestError::InvalidValue { row: self.number, column, value: value.clone() };
        match value.parse::<i64>() {
            Ok(number) => Ok(Some(number)),
            Err(_) => {
                let number = value.parse::<f64>().map_err(|_| invalid())?;
                if number.fract() == 0.0 {
                    Ok(Some(number as i64))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::AssetSource;

    const CSV: &str = "slide_index,shape_name,image_path,box_x_emu,box_y_emu,box_w_emu,box_h_emu,label\n\
                       3,overview_chart,charts/overview.png,,,,,Alert Overview\n\
                       4,,/srv/shared/map.png,914400.0,457200,1828800,914400,\n";

    #[test]
    fn csv_manifest_entries() {
        let manifest = Manifest::from_records(csv::parse_records(CSV)).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].fixed_box(), None);
        assert_eq!(manifest.entries[1].fixed_box(), Some(Rect { x: 914_400, y: 457_200, width: 1_828_800, height: 914_400 }));

        let assets = manifest.to_assets(Path::new("/data/run"));
        assert_eq!(assets[0].source, AssetSource::Image(PathBuf::from("/data/run/charts/overview.png")));
        assert_eq!(assets[0].label(), "Alert Overview");
        assert_eq!(assets[0].fixed_box, None);
        assert_eq!(assets[1].source, AssetSource::Image(PathBuf::from("/srv/shared/map.png")));
        assert_eq!(assets[1].label(), "map.png");
        assert!(assets[1].fixed_box.is_some());
    }

    #[test]
    fn json_manifest_entries() {
        let json = br#"[{"slide_index": 2, "shape_name": "ndr_overview_chart", "image_path": "a.png", "sensor": "VAPRD"},
                        {"slide_index": 5, "image_path": "b.png", "box_x_emu": 1, "box_y_emu": 2, "box_w_emu": 3, "box_h_emu": 4}]"#;
        let manifest = Manifest::from_json(json).unwrap();
        let assets = manifest.to_assets(Path::new("assets"));
        assert_eq!(assets[0].placeholder_names(), vec!["ndr_overview_chart_vaprd", "ndr_overview_chart"]);
        assert_eq!(assets[1].fixed_box, Some(Rect { x: 1, y: 2, width: 3, height: 4 }));
    }

    #[test]
    fn rejects_bad_manifests() {
        let missing = Manifest::from_records(csv::parse_records("slide,shape_name\n1,a\n")).unwrap_err();
        assert!(missing.to_string().contains("slide_index, image_path"));

        let invalid = Manifest::from_records(csv::parse_records("slide_index,image_path\nthree,a.png\n")).unwrap_err();
        assert!(invalid.to_string().contains("Invalid slide_index 'three' in manifest row 1"));

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"- a").unwrap();
        let unsupported = Manifest::load(file.path()).unwrap_err();
        assert!(unsupported.to_string().contains("Unsupported manifest format 'yaml'"));
    }

    #[test]
    fn loads_files_by_extension() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("layout.CSV");
        std::fs::write(&path, CSV).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().entries.len(), 2);
    }
}
