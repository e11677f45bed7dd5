//! Append-only record of every placement attempt.
use crate::error::RustyDeckError;
use crate::placement::PlacementError;
use crate::table::TableError;
use crate::transform::TransformAudit;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

/// Outcome of one placement attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    Ok,
    Skipped,
    Error,
}

impl PlacementStatus {
    /// Status for a failed attempt. Missing or unusable inputs are skips: absent
    /// files, unknown slides or placeholders, malformed tables and cancellation.
    /// Files that exist but cannot be decoded, invalid geometry and document
    /// failures are errors.
    pub fn of(error: &RustyDeckError) -> Self {
        match error {
            RustyDeckError::PlacementError(
                PlacementError::AssetNotFound(_)
                | PlacementError::SlideIndexOutOfRange { .. }
                | PlacementError::PlaceholderNotFound { .. }
                | PlacementError::Cancelled,
            ) => PlacementStatus::Skipped,
            RustyDeckError::TableError(TableError::MalformedData { .. }) => PlacementStatus::Skipped,
            _ => PlacementStatus::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditRecord {
    pub label: String,
    /// Slide the content landed on (or was aimed at), zero based
    pub slide_index: usize,
    pub source_path: Option<String>,
    pub status: PlacementStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Geometry of an image placement
    pub transform: Option<TransformAudit>,
}

impl AuditRecord {
    pub fn ok(label: &str, slide_index: usize, source_path: Option<String>, transform: Option<TransformAudit>) -> Self {
        AuditRecord {
            label: label.to_owned(),
            slide_index,
            source_path,
            status: PlacementStatus::Ok,
            error_message: None,
            timestamp: Utc::now(),
            transform,
        }
    }

    pub fn failed(label: &str, slide_index: usize, source_path: Option<String>, error: &RustyDeckError) -> Self {
        AuditRecord {
            label: label.to_owned(),
            slide_index,
            source_path,
            status: PlacementStatus::of(error),
            error_message: Some(error.to_string()),
            timestamp: Utc::now(),
            transform: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PlacementStatus::Ok
    }
}

/// Record counts by status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl AuditSummary {
    pub fn of(records: &[AuditRecord]) -> Self {
        records.iter().fold(AuditSummary::default(), |mut summary, record| {
            summary.total += 1;
            match record.status {
                PlacementStatus::Ok => summary.ok += 1,
                PlacementStatus::Skipped => summary.skipped += 1,
                PlacementStatus::Error => summary.errors += 1,
            }
            summary
        })
    }
}
