//! # Table Layout Engine
//!
//! Turns CSV exports into fixed-size table renderings: normalized [`TableData`],
//! weight-based column allocation, font-size search, pagination and the two
//! renderers (raster image and native slide table).
pub mod bitmap;
pub mod csv;
pub mod font;
pub mod layout;
pub mod native;
pub mod raster;
pub mod style;

use crate::error::RustyDeckError;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

/// Errors related to tabular data and its rendering.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Malformed data in '{name}': {reason}")]
    MalformedData { name: String, reason: String },

    #[error("Failed to allocate a {0}x{1} table canvas")]
    CanvasError(u32, u32),

    #[error("Failed to encode table image: {0}")]
    EncodingError(String),
}

impl TableError {
    pub(crate) fn malformed(name: &str, reason: &str) -> Self {
        TableError::MalformedData { name: name.to_owned(), reason: reason.to_owned() }
    }
}

/// Normalized column names that mark a list of sources rather than a metric
const SOURCE_PATTERNS: [&str; 6] = ["source", "sources", "data_source", "reference", "references", "origin"];

static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").expect("Hardcode regex pattern"));

/// Title fields carried by a non-tabular first row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableMetadata {
    pub title: Option<String>,
    pub sensor: Option<String>,
    pub date: Option<String>,
}

impl TableMetadata {
    /// Title bar text: title, sensor and date joined by a visible separator.
    pub fn caption(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        for part in [&self.title, &self.sensor, &self.date].into_iter().flatten() {
            let part = part.trim();
            if !part.is_empty() && !parts.contains(&part) {
                parts.push(part);
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("  |  "))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caption().is_none()
    }
}

/// A normalized dataset: every row has exactly `headers.len()` cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub metadata: TableMetadata,
}

impl TableData {
    /// Normalizes rows to the header width and drops source columns.
    ///
    /// # Arguments
    /// * `name` - Label used in error messages
    /// * `headers` - Column names
    /// * `rows` - Data rows, possibly ragged
    ///
    /// # Returns
    /// The table, or `MalformedData` when no column survives filtering
    pub fn new(name: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        let keep: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !is_source_column(header))
            .map(|(index, _)| index)
            .collect();
        if keep.is_empty() {
            return Err(TableError::malformed(name, "no columns left after removing source columns"));
        }
        if keep.len() < headers.len() {
            debug!("Dropped {} source column(s) from '{}'", headers.len() - keep.len(), name);
        }

        let pick = |cells: &[String]| -> Vec<String> {
            keep.iter()
                .map(|index| cells.get(*index).map(|cell| cell.trim().to_owned()).unwrap_or_default())
                .collect()
        };
        Ok(TableData {
            headers: pick(headers.as_slice()),
            rows: rows.iter().map(|row| pick(row.as_slice())).collect(),
            metadata: TableMetadata::default(),
        })
    }

    /// Builds a table from raw CSV records, extracting a leading metadata row.
    ///
    /// A record set holding only a metadata row yields a blank table (no headers),
    /// which callers present as a full-panel "No Data" message.
    pub fn from_records(name: &str, mut records: Vec<Vec<String>>) -> Result<Self, TableError> {
        if records.is_empty() {
            return Err(TableError::malformed(name, "file is empty"));
        }

        let starts_with_blank = records[0].first().map(|cell| cell.trim().is_empty()).unwrap_or(true);
        let metadata = if starts_with_blank && records.len() >= 2 {
            extract_metadata(&records.remove(0))
        } else if starts_with_blank && records[0].iter().any(|cell| !cell.trim().is_empty()) {
            let metadata = extract_metadata(&records[0]);
            return Ok(TableData { metadata, ..Default::default() });
        } else {
            TableMetadata::default()
        };

        let mut records = records.into_iter();
        let headers = records.next().unwrap_or_default();
        let mut table = TableData::new(name, headers, records.collect())?;
        table.metadata = metadata;
        Ok(table)
    }

    /// Reads and normalizes a CSV file.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self, RustyDeckError> {
        let path = path.as_ref();
        let records = csv::read_records(path)?;
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(TableData::from_records(&name, records)?)
    }

    /// Fills missing sensor and date metadata.
    pub fn fill_metadata(&mut self, sensor: Option<&str>, date: Option<&str>) {
        let blank = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or("").is_empty();
        if let Some(sensor) = sensor.filter(|sensor| !sensor.eq_ignore_ascii_case("DEFAULT")) {
            if blank(&self.metadata.sensor) {
                self.metadata.sensor = Some(sensor.to_owned());
            }
        }
        if let Some(date) = date {
            if blank(&self.metadata.date) {
                self.metadata.date = Some(date.to_owned());
            }
        }
    }

    /// True when the source had no tabular content at all.
    pub fn is_blank(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Copy of this table restricted to a range of data rows.
    pub fn page(&self, range: Range<usize>) -> TableData {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        TableData {
            headers: self.headers.clone(),
            rows: self.rows[start..end].to_vec(),
            metadata: self.metadata.clone(),
        }
    }
}

fn extract_metadata(row: &[String]) -> TableMetadata {
    let cell = |index: usize| {
        row.get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    TableMetadata {
        title: row.iter().rev().map(|value| value.trim()).find(|value| !value.is_empty()).map(str::to_owned),
        sensor: cell(1),
        date: cell(2),
    }
}

/// True when a column lists sources or references rather than measuring something.
///
/// Names are compared after trimming, lowercasing and folding whitespace and
/// hyphens to underscores. A name matches when it contains a pattern or is part of
/// one, so blank and truncated headers such as `ref` are dropped too. Columns
/// mentioning both "unique" and "source" are counts and are kept.
pub fn is_source_column(name: &str) -> bool {
    let normalized = SEPARATOR.replace_all(name.trim(), "_").to_lowercase();
    if normalized.contains("unique") && normalized.contains("source") {
        return false;
    }
    SOURCE_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern) || pattern.contains(normalized.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|row| row.iter().map(|cell| cell.to_string()).collect()).collect()
    }

    #[test]
    fn source_columns_are_recognized() {
        assert!(is_source_column("Source"));
        assert!(is_source_column("data_source"));
        assert!(is_source_column("Data Source"));
        assert!(is_source_column(" References "));
        assert!(is_source_column("Origin"));
        assert!(!is_source_column("Unique Sources"));
        assert!(!is_source_column("unique-source-count"));
        assert!(!is_source_column("Destination IP"));
        assert!(!is_source_column("Count"));
        assert!(is_source_column(""));
        assert!(is_source_column("  "));
        assert!(is_source_column("ref"));
        assert!(is_source_column("Refer"));
        assert!(is_source_column("data"));
    }

    #[test]
    fn blank_and_truncated_headers_are_dropped() {
        let table = TableData::from_records("hosts.csv", records(&[&["Host", "", "Ref", "Hits"], &["a", "x", "y", "4"]])).unwrap();
        assert_eq!(table.headers, vec!["Host", "Hits"]);
        assert_eq!(table.rows, vec![vec!["a", "4"]]);
    }

    #[test]
    fn source_columns_are_dropped_from_rows() {
        let table = TableData::from_records(
            "alerts.csv",
            records(&[&["Host", "Source", "Unique Sources", "data_source"], &["a", "x", "3", "y"], &["b"]]),
        )
        .unwrap();
        assert_eq!(table.headers, vec!["Host", "Unique Sources"]);
        assert_eq!(table.rows, vec![vec!["a", "3"], vec!["b", ""]]);
    }

    #[test]
    fn only_source_columns_is_malformed() {
        let error = TableData::from_records("refs.csv", records(&[&["Source", "References"], &["a", "b"]])).unwrap_err();
        assert!(matches!(error, TableError::MalformedData { .. }));
        assert!(TableData::from_records("empty.csv", Vec::new()).is_err());
    }

    #[test]
    fn metadata_row_becomes_caption() {
        let table = TableData::from_records(
            "beacons.csv",
            records(&[&["", "VAPRD", "2026-10-01", "Beaconing Hosts"], &["Host", "Score"], &["10.0.0.1", "97"]]),
        )
        .unwrap();
        assert_eq!(table.metadata.title.as_deref(), Some("Beaconing Hosts"));
        assert_eq!(table.metadata.caption().as_deref(), Some("Beaconing Hosts  |  VAPRD  |  2026-10-01"));
        assert_eq!(table.headers, vec!["Host", "Score"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn metadata_defaults_fill_gaps() {
        let mut table = TableData::from_records("ports.csv", records(&[&["", "", "", "Rare Ports"], &["Port"], &["4444"]])).unwrap();
        table.fill_metadata(Some("SENSOR-B"), Some("2026-10-18"));
        assert_eq!(table.metadata.caption().as_deref(), Some("Rare Ports  |  SENSOR-B  |  2026-10-18"));

        let mut untouched = table.clone();
        untouched.metadata.sensor = None;
        untouched.fill_metadata(Some("default"), None);
        assert_eq!(untouched.metadata.sensor, None);
    }

    #[test]
    fn metadata_only_file_is_blank() {
        let table = TableData::from_records("none.csv", records(&[&["", "VAPRD", "2026-10-01", "Exfil"]])).unwrap();
        assert!(table.is_blank());
        assert_eq!(table.metadata.title.as_deref(), Some("Exfil"));
    }

    #[test]
    fn header_only_table_has_no_rows() {
        let table = TableData::from_records("hdr.csv", records(&[&["Host", "Count"]])).unwrap();
        assert!(!table.is_blank());
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn pages_slice_rows() {
        let rows = (0..5).map(|index| vec![index.to_string()]).collect();
        let table = TableData::new("hits.csv", vec!["Hits".to_owned()], rows).unwrap();
        assert_eq!(table.page(3..10).rows, vec![vec!["3"], vec!["4"]]);
        assert!(table.page(7..9).rows.is_empty());
    }
}
