//! # Rusty Deck
//!
//! A layout engine for cybersecurity report presentations. It fills named placeholders
//! of a PPTX template with charts, screenshots and CSV tables, paginating long tables
//! onto continuation slides, and writes a JSON audit trail of every placement.
//!
//! ## Features
//!
//! - **Contain fit**: images keep their aspect ratio and are centered inside the
//!   placeholder they replace, with the full affine transform recorded
//! - **Table layout**: weight-based column widths, font-size search that guarantees
//!   the widest cell fits, raster (PNG) or native slide tables
//! - **Pagination**: overflowing tables and narratives continue on duplicated slides
//!   titled `(cont.)`, and page numbers follow the final slide order
//! - **Sensor sections**: one copy of the network-detection section per sensor, with
//!   assets routed to their sensor's placeholders
//! - **Resilient**: a failing asset is recorded and skipped, the deck is always saved
//!
//! ## Example
//!
//! ```no_run
//! use rusty_deck::PlacementAsset;
//! use rusty_deck::ReportConfig;
//! use rusty_deck::ReportGenerator;
//! use std::path::Path;
//!
//! let assets = vec![
//!     PlacementAsset::image("charts/overview.png", 5, "ndr_overview_chart"),
//!     PlacementAsset::table("tables/rare_ports.csv", 9, "ndr_table"),
//! ];
//! let report = ReportGenerator::new(ReportConfig::default()).generate(
//!     Path::new("template.pptx"),
//!     assets,
//!     Path::new("out/report.pptx"),
//! );
//! println!("{} placed, audit in {}", report.placed, report.audit_path.display());
//! ```
pub mod config;
pub mod document;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod placement;
pub mod table;
pub mod transform;

mod helpers;

pub use config::ReportConfig;
pub use config::TableRendering;
pub use document::pptx::PptxDeck;
pub use document::SlideDeck;
pub use error::RustyDeckError;
pub use generator::GenerationReport;
pub use generator::ReportGenerator;
pub use manifest::Manifest;
pub use placement::AssetSource;
pub use placement::PlacementAsset;
pub use placement::PlacementOrchestrator;
pub use table::TableData;
pub use transform::compute_contain_transform;
pub use transform::Rect;
