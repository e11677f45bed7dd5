//! End-to-end report generation: open a template, place assets, save the deck and its audit trail.
//!
//! [`ReportGenerator::generate`] never fails. Whatever goes wrong is logged, carried in
//! the returned [`GenerationReport`] and written to the audit file next to the output.
use crate::config::ReportConfig;
use crate::document::pptx::PptxDeck;
use crate::document::SlideDeck;
use crate::manifest::Manifest;
use crate::placement::cleanup_placeholder_tables;
use crate::placement::duplicate_sections_for_sensors;
use crate::placement::remap_assets_for_sensors;
use crate::placement::renumber_pages;
use crate::placement::AuditRecord;
use crate::placement::AuditSummary;
use crate::placement::PlacementAsset;
use crate::placement::PlacementOrchestrator;
use crate::placement::SensorSections;
use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use log::error;
use log::info;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// What a generation run produced.
#[derive(Clone, Debug, Default)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub audit_path: PathBuf,
    /// True once the deck was written
    pub saved: bool,
    /// Assets placed completely
    pub placed: usize,
    pub per_group: BTreeMap<String, usize>,
    pub slides_inserted: usize,
    pub records: Vec<AuditRecord>,
    /// Run-level failure, such as an unreadable template
    pub error: Option<String>,
}

impl GenerationReport {
    pub fn summary(&self) -> AuditSummary {
        AuditSummary::of(&self.records)
    }
}

/// Layout of `<output>.audit.json`.
#[derive(Serialize)]
struct AuditFile<'a> {
    generated_at: DateTime<Utc>,
    template: String,
    manifest: Option<String>,
    output: String,
    saved: bool,
    error: Option<&'a str>,
    placements: &'a [AuditRecord],
    per_group: &'a BTreeMap<String, usize>,
    summary: AuditSummary,
}

/// Audit trail location for an output deck: `report.pptx` gives `report.audit.json`.
pub fn audit_path(output: &Path) -> PathBuf {
    output.with_extension("audit.json")
}

pub struct ReportGenerator {
    config: ReportConfig,
    sensors: Vec<String>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Self {
        ReportGenerator { config, sensors: Vec::new(), cancel: None }
    }

    /// Gives every sensor after the first its own copy of the network-detection section.
    pub fn with_sensors(mut self, sensors: Vec<String>) -> Self {
        self.sensors = sensors;
        self
    }

    /// Stops placing assets once `flag` is set; the deck is still saved.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Builds a deck from `template` with `assets` and saves it to `output`.
    ///
    /// # Arguments
    /// * `template` - PPTX file with named placeholders
    /// * `assets` - Content to place
    /// * `output` - Destination deck; the audit trail goes next to it
    ///
    /// # Returns
    /// The run's report; this call does not fail
    pub fn generate(&self, template: &Path, assets: Vec<PlacementAsset>, output: &Path) -> GenerationReport {
        self.run(template, None, assets, output)
    }

    /// Like [`generate`](Self::generate) with the assets read from a layout manifest.
    /// Relative image paths resolve against `assets_dir`.
    pub fn generate_from_manifest(&self, template: &Path, manifest: &Path, assets_dir: &Path, output: &Path) -> GenerationReport {
        let assets = match Manifest::load(manifest) {
            Ok(manifest) => manifest.to_assets(assets_dir),
            Err(e) => {
                error!("{}; the template is saved without placements", e);
                Vec::new()
            }
        };
        self.run(template, Some(manifest), assets, output)
    }

    fn run(&self, template: &Path, manifest: Option<&Path>, assets: Vec<PlacementAsset>, output: &Path) -> GenerationReport {
        let mut report = GenerationReport { output: output.to_path_buf(), audit_path: audit_path(output), ..Default::default() };
        if let Err(e) = self.build(template, assets, output, &mut report) {
            error!("Report generation failed: {:#}", e);
            report.error = Some(format!("{:#}", e));
        }
        if let Err(e) = self.write_audit(template, manifest, &report) {
            error!("Failed to write audit trail: {:#}", e);
        }
        info!(
            "Report '{}': {} asset(s) placed, {} record(s), {} slide(s) inserted",
            output.display(),
            report.placed,
            report.records.len(),
            report.slides_inserted
        );
        report
    }

    fn build(&self, template: &Path, mut assets: Vec<PlacementAsset>, output: &Path, report: &mut GenerationReport) -> anyhow::Result<()> {
        let mut deck = PptxDeck::open(template).with_context(|| format!("Failed to open template '{}'", template.display()))?;
        info!("Opened template '{}' with {} slide(s)", template.display(), deck.slide_count());

        let sections = self.split_sensor_sections(&mut deck, &mut assets);
        let mut orchestrator = PlacementOrchestrator::new(self.config.clone());
        if let Some(flag) = &self.cancel {
            orchestrator = orchestrator.with_cancellation(flag.clone());
        }
        let summary = orchestrator.place_all(&mut deck, assets);

        let table_slides: Vec<usize> = self
            .config
            .table_slides
            .iter()
            .map(|&slide| shifted(slide, sections.as_ref()))
            .filter_map(|slide| summary.current_index(slide))
            .collect();
        if let Err(e) = cleanup_placeholder_tables(&mut deck, &table_slides) {
            warn!("Failed to clean up placeholder tables: {}", e);
        }
        if let Err(e) = renumber_pages(&mut deck, &self.config.page_number_shape) {
            warn!("Failed to renumber pages: {}", e);
        }

        report.placed = summary.placed;
        report.per_group = summary.per_group;
        report.slides_inserted = summary.slides_inserted + sections.map(|sections| sections.inserted).unwrap_or(0);
        report.records = summary.records;

        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        deck.save(output).with_context(|| format!("Failed to save '{}'", output.display()))?;
        report.saved = true;
        info!("Saved presentation '{}'", output.display());
        Ok(())
    }

    /// Duplicates sensor sections when more than one sensor is configured.
    fn split_sensor_sections(&self, deck: &mut PptxDeck, assets: &mut [PlacementAsset]) -> Option<SensorSections> {
        if self.sensors.len() < 2 {
            return None;
        }
        let base: Vec<usize> = self.config.ndr_slides.iter().copied().collect();
        match duplicate_sections_for_sensors(deck, &self.config, &self.sensors, &base) {
            Ok(sections) => {
                remap_assets_for_sensors(assets, &sections);
                Some(sections)
            }
            Err(e) => {
                warn!("Keeping a single detection section: {}", e);
                None
            }
        }
    }

    fn write_audit(&self, template: &Path, manifest: Option<&Path>, report: &GenerationReport) -> anyhow::Result<()> {
        let audit = AuditFile {
            generated_at: Utc::now(),
            template: template.display().to_string(),
            manifest: manifest.map(|manifest| manifest.display().to_string()),
            output: report.output.display().to_string(),
            saved: report.saved,
            error: report.error.as_deref(),
            placements: &report.records,
            per_group: &report.per_group,
            summary: report.summary(),
        };
        if let Some(parent) = report.audit_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&audit)?;
        std::fs::write(&report.audit_path, json).with_context(|| format!("Failed to write '{}'", report.audit_path.display()))?;
        info!("Saved audit trail '{}'", report.audit_path.display());
        Ok(())
    }
}

/// Template index of a slide after sensor sections were inserted.
fn shifted(slide: usize, sections: Option<&SensorSections>) -> usize {
    match sections {
        Some(sections) if slide >= sections.insert_at => slide + sections.inserted,
        _ => slide,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontStrategy;
    use crate::document::pptx::fixture::*;
    use crate::placement::PlacementStatus;
    use crate::transform::Rect;
    use std::fmt::Write as _;

    fn config() -> ReportConfig {
        ReportConfig {
            ndr_slides: [1].into_iter().collect(),
            table_slides: [2].into_iter().collect(),
            fonts: FontStrategy::builtin_only(),
            ..Default::default()
        }
    }

    fn panel() -> Rect {
        Rect { x: 914_400, y: 914_400, width: 6_000_000, height: 3_000_000 }
    }

    /// Cover, detection slide with a table, table slide, chart slide.
    fn write_template(directory: &Path) -> PathBuf {
        let page = |id: u32| text_shape(id, "page_number", "0", Rect::default());
        let slides = vec![
            vec![text_shape(2, "slide_title", "Security Report", Rect::default()), page(3)],
            vec![text_shape(2, "slide_title", "Rare Ports", Rect::default()), table_shape(3, "ndr_table", panel()), page(4)],
            vec![text_shape(2, "slide_title", "Summary", Rect::default()), table_shape(3, "summary_table", panel()), page(4)],
            vec![plain_shape(2, "chart_placeholder", panel()), page(3)],
        ];
        let path = directory.join("template.pptx");
        std::fs::write(&path, template(&slides)).unwrap();
        path
    }

    fn write_csv(directory: &Path, rows: usize) -> PathBuf {
        let mut text = String::from(",VAPRD,2026-10-01,Rare Ports\nPort,Hits,Source\n");
        for row in 0..rows {
            writeln!(text, "{},{},feed", 1000 + row, row * 2).unwrap();
        }
        let path = directory.join("rare_ports.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn write_chart(directory: &Path) -> PathBuf {
        let path = directory.join("overview.png");
        image::RgbImage::new(300, 100).save(&path).unwrap();
        path
    }

    fn audit_json(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn generates_deck_and_audit_trail() {
        let _ = env_logger::builder().is_test(true).try_init();
        let directory = tempfile::tempdir().unwrap();
        let template = write_template(directory.path());
        let assets = vec![
            PlacementAsset::image(write_chart(directory.path()), 3, "chart_placeholder"),
            PlacementAsset::image(directory.path().join("missing.png"), 3, "chart_placeholder"),
            PlacementAsset::table(write_csv(directory.path(), 95), 1, "ndr_table"),
        ];
        let output = directory.path().join("out").join("report.pptx");
        let report = ReportGenerator::new(config()).generate(&template, assets, &output);

        assert!(report.saved);
        assert_eq!(report.error, None);
        assert_eq!(report.placed, 2);
        assert_eq!(report.slides_inserted, 2);
        assert_eq!(report.summary(), AuditSummary { total: 5, ok: 4, skipped: 1, errors: 0 });

        let deck = PptxDeck::open(&output).unwrap();
        assert_eq!(deck.slide_count(), 6);
        assert_eq!(deck.shape_text(2, "slide_title").unwrap().as_deref(), Some("Rare Ports (cont.)"));
        assert_eq!(deck.shape_text(3, "slide_title").unwrap().as_deref(), Some("Rare Ports (cont.)"));
        for slide in 0..6 {
            assert_eq!(deck.shape_text(slide, "page_number").unwrap(), Some((slide + 1).to_string()));
        }
        for slide in 1..4 {
            assert!(deck.find_shape(slide, "ndr_table").unwrap().unwrap().has_picture);
        }
        // The unused summary table became a message
        let summary = deck.find_shape(4, "summary_table").unwrap().unwrap();
        assert!(!summary.has_table);
        assert_eq!(summary.text, "No Data");
        assert!(deck.find_shape(5, "chart_placeholder").unwrap().unwrap().has_picture);

        let audit = audit_json(&report.audit_path);
        assert_eq!(report.audit_path, directory.path().join("out").join("report.audit.json"));
        assert_eq!(audit["summary"]["total"], 5);
        assert_eq!(audit["summary"]["skipped"], 1);
        assert_eq!(audit["placements"].as_array().unwrap().len(), 5);
        assert_eq!(audit["placements"][3]["transform"]["scale_axis"], "width");
        assert_eq!(audit["placements"][4]["status"], "skipped");
        assert_eq!(audit["saved"], true);
    }

    #[test]
    fn missing_template_still_writes_an_audit_trail() {
        let directory = tempfile::tempdir().unwrap();
        let output = directory.path().join("report.pptx");
        let report = ReportGenerator::new(config()).generate(&directory.path().join("nope.pptx"), Vec::new(), &output);
        assert!(!report.saved);
        assert!(report.error.as_deref().unwrap().contains("Failed to open template"));
        assert!(!output.exists());
        let audit = audit_json(&report.audit_path);
        assert_eq!(audit["saved"], false);
        assert_eq!(audit["summary"]["total"], 0);
    }

    #[test]
    fn manifest_driven_generation() {
        let directory = tempfile::tempdir().unwrap();
        let template = write_template(directory.path());
        write_chart(directory.path());
        let manifest = directory.path().join("layout.json");
        std::fs::write(
            &manifest,
            r#"[{"slide_index": 3, "shape_name": "chart_placeholder", "image_path": "overview.png", "label": "Overview"},
                {"slide_index": 0, "image_path": "overview.png", "box_x_emu": 0, "box_y_emu": 0, "box_w_emu": 914400, "box_h_emu": 914400}]"#,
        )
        .unwrap();
        let output = directory.path().join("report.pptx");
        let report = ReportGenerator::new(config()).generate_from_manifest(&template, &manifest, directory.path(), &output);
        assert_eq!(report.placed, 2);
        assert_eq!(report.records.iter().filter(|record| record.status == PlacementStatus::Ok).count(), 2);
        let audit = audit_json(&report.audit_path);
        assert!(audit["manifest"].as_str().unwrap().ends_with("layout.json"));
        assert_eq!(audit["placements"][1]["label"], "Overview");
    }

    #[test]
    fn sensors_get_their_own_sections() {
        let directory = tempfile::tempdir().unwrap();
        let template = write_template(directory.path());
        let assets = vec![
            PlacementAsset::table(write_csv(directory.path(), 3), 1, "ndr_table").with_sensor("VAPRD"),
            PlacementAsset::table(write_csv(directory.path(), 3), 1, "ndr_table").with_sensor("Edge"),
        ];
        let output = directory.path().join("report.pptx");
        let report = ReportGenerator::new(config())
            .with_sensors(vec!["VAPRD".to_owned(), "Edge".to_owned()])
            .generate(&template, assets, &output);

        assert_eq!(report.placed, 2);
        assert_eq!(report.per_group.get("Edge"), Some(&1));
        assert_eq!(report.slides_inserted, 1);
        let deck = PptxDeck::open(&output).unwrap();
        assert_eq!(deck.slide_count(), 5);
        assert_eq!(deck.shape_text(2, "slide_title").unwrap().as_deref(), Some("Rare Ports (Edge)"));
        assert!(deck.find_shape(1, "ndr_table").unwrap().unwrap().has_picture);
        assert!(deck.find_shape(2, "ndr_table_edge").unwrap().unwrap().has_picture);
        // The table slide moved behind the new section and was still cleaned up
        assert_eq!(deck.shape_text(3, "summary_table").unwrap().as_deref(), Some("No Data"));
    }
}
