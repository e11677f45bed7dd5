//! The per-asset placement loop.
use crate::config::ReportConfig;
use crate::config::TableRendering;
use crate::document::Picture;
use crate::document::Shape;
use crate::document::SlideDeck;
use crate::document::TextBox;
use crate::error::RustyDeckError;
use crate::placement::AssetSource;
use crate::placement::AuditRecord;
use crate::placement::AuditSummary;
use crate::placement::PlacementAsset;
use crate::placement::PlacementError;
use crate::table::font::FontCache;
use crate::table::layout::paginate;
use crate::table::native;
use crate::table::native::NativeTable;
use crate::table::raster::TableRasterizer;
use crate::table::TableData;
use crate::table::TableError;
use crate::transform::compute_contain_transform;
use crate::transform::pixels_to_emu;
use crate::transform::Rect;
use crate::transform::TransformResult;
use log::debug;
use log::info;
use log::warn;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Font size of narrative paragraphs (points)
const NARRATIVE_FONT_PT: f64 = 14.0;

/// Stages of placing paginated content.
///
/// Continuation slides are copies of the target slide, so they must be made while
/// it still holds its placeholder: duplication comes before page one is populated.
/// Every page is rendered before the first duplication, so a page that fails to
/// render leaves the deck untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PageStage {
    SinglePage,
    Page1Rendering,
    DuplicateRemaining,
    PopulateContinuations,
    Done,
}

/// One page of content ready to go on a slide.
enum PageContent {
    /// Rendered image with its contain fit already computed
    Picture { picture: Picture, transform: TransformResult },
    Table(NativeTable),
    Text(TextBox),
}

/// Outcome of a batch.
#[derive(Clone, Debug, Default)]
pub struct PlacementSummary {
    /// Assets placed completely
    pub placed: usize,
    /// Placed assets per sensor group
    pub per_group: BTreeMap<String, usize>,
    /// One record per attempted page
    pub records: Vec<AuditRecord>,
    pub slides_inserted: usize,
    /// Index each current slide had when the batch started; `None` for inserted slides
    origins: Vec<Option<usize>>,
}

impl PlacementSummary {
    /// Where a slide that existed when the batch started sits now.
    pub fn current_index(&self, original: usize) -> Option<usize> {
        self.origins.iter().position(|origin| *origin == Some(original))
    }

    pub fn audit_summary(&self) -> AuditSummary {
        AuditSummary::of(&self.records)
    }

    fn record_insertions(&mut self, after: usize, count: usize) {
        let at = (after + 1).min(self.origins.len());
        self.origins.splice(at..at, std::iter::repeat(None).take(count));
        self.slides_inserted += count;
    }
}

/// Places assets into a deck one at a time.
pub struct PlacementOrchestrator {
    config: ReportConfig,
    rasterizer: TableRasterizer,
    cancel: Option<Arc<AtomicBool>>,
}

impl PlacementOrchestrator {
    pub fn new(config: ReportConfig) -> Self {
        let rasterizer = TableRasterizer::new(FontCache::for_strategy(&config.fonts));
        PlacementOrchestrator { config, rasterizer, cancel: None }
    }

    /// Stops the batch before the next asset once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Places every asset, in ascending slide order.
    ///
    /// Slide indices of the assets refer to the deck as it is on entry; slides
    /// inserted for continuation pages are accounted for as the batch proceeds.
    ///
    /// # Arguments
    /// * `deck` - Document to mutate
    /// * `assets` - Work items, consumed
    ///
    /// # Returns
    /// Counts and the audit trail; failures are recorded, never returned
    pub fn place_all<D: SlideDeck + ?Sized>(&self, deck: &mut D, mut assets: Vec<PlacementAsset>) -> PlacementSummary {
        assets.sort_by_key(|asset| asset.slide_index);
        let mut summary = PlacementSummary { origins: (0..deck.slide_count()).map(Some).collect(), ..Default::default() };

        let mut assets = assets.into_iter();
        while let Some(asset) = assets.next() {
            let slide = summary
                .current_index(asset.slide_index)
                .unwrap_or(asset.slide_index + summary.slides_inserted);

            if self.is_cancelled() {
                info!("Placement cancelled with {} asset(s) not started", assets.len() + 1);
                let error = RustyDeckError::from(PlacementError::Cancelled);
                for asset in std::iter::once(asset).chain(assets.by_ref()) {
                    summary.records.push(AuditRecord::failed(&asset.label(), asset.slide_index, asset.source_path(), &error));
                }
                break;
            }

            let label = asset.label();
            let before = deck.slide_count();
            match self.place(deck, &asset, slide) {
                Ok(records) => {
                    info!("Placed '{}' on slide {} ({} page(s))", label, slide + 1, records.len());
                    summary.placed += 1;
                    *summary.per_group.entry(asset.group().to_owned()).or_default() += 1;
                    summary.records.extend(records);
                }
                Err(error) => {
                    warn!("Skipping '{}' on slide {}: {}", label, slide + 1, error);
                    summary.records.push(AuditRecord::failed(&label, slide, asset.source_path(), &error));
                }
            }

            let inserted = deck.slide_count().saturating_sub(before);
            if inserted > 0 {
                summary.record_insertions(slide, inserted);
            }
        }
        summary
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
    }

    fn place<D: SlideDeck + ?Sized>(&self, deck: &mut D, asset: &PlacementAsset, slide: usize) -> Result<Vec<AuditRecord>, RustyDeckError> {
        if slide >= deck.slide_count() {
            Err(PlacementError::SlideIndexOutOfRange { index: slide, count: deck.slide_count() })?
        }
        match &asset.source {
            AssetSource::Image(path) => Ok(vec![self.place_image(deck, asset, slide, path)?]),
            AssetSource::Table(path) => {
                ensure_exists(path)?;
                let table = TableData::read_csv(path)?;
                self.place_table(deck, asset, slide, table)
            }
            AssetSource::TableData(table) => self.place_table(deck, asset, slide, table.clone()),
            AssetSource::Narrative(items) => self.place_narrative(deck, asset, slide, items),
        }
    }

    /// Contain-fits an image into its placeholder, an explicit box or the default box.
    fn place_image<D: SlideDeck + ?Sized>(
        &self,
        deck: &mut D,
        asset: &PlacementAsset,
        slide: usize,
        path: &Path,
    ) -> Result<AuditRecord, RustyDeckError> {
        ensure_exists(path)?;
        let picture = Picture::load(path)?;
        let (width, height) = picture.size_emu(self.config.default_image_dpi);
        let source = Rect { x: 0, y: 0, width, height };

        let (destination, placeholder, name) = match asset.fixed_box {
            Some(bounds) => (bounds, None, content_name(asset)),
            None => match deck.find_placeholder(slide, &asset.placeholder_names())? {
                Some(shape) => (self.bounds_of(&shape, slide), Some(shape.id), shape.name),
                None => {
                    warn!("No placeholder '{}' on slide {}, using the default image box", asset.shape_name, slide + 1);
                    (self.config.default_image_box.to_rect(), None, content_name(asset))
                }
            },
        };

        let transform = compute_contain_transform(&source, &destination)?;
        if let Some(id) = placeholder {
            deck.remove_shape(slide, id)?;
        }
        deck.add_picture(slide, &picture, transform.placed, &name)?;
        debug!("'{}' scaled by {:.4} along {}", asset.label(), transform.scale_factor, transform.scale_axis.as_str());
        Ok(AuditRecord::ok(&asset.label(), slide, asset.source_path(), Some(transform.to_audit())))
    }

    fn bounds_of(&self, shape: &Shape, slide: usize) -> Rect {
        shape.bounds.unwrap_or_else(|| {
            warn!("Placeholder '{}' on slide {} inherits its position, using the default image box", shape.name, slide + 1);
            self.config.default_image_box.to_rect()
        })
    }

    /// Renders a table as raster images or native tables, one page per slide.
    fn place_table<D: SlideDeck + ?Sized>(
        &self,
        deck: &mut D,
        asset: &PlacementAsset,
        slide: usize,
        mut table: TableData,
    ) -> Result<Vec<AuditRecord>, RustyDeckError> {
        table.fill_metadata(asset.sensor.as_deref(), self.config.report_date.as_deref());
        let panel = self.config.panel_for(asset.template_slide);
        let mode = asset.table_mode.unwrap_or(self.config.table_rendering);

        if table.is_blank() {
            let bounds = match mode {
                TableRendering::Raster => panel.bounds(),
                TableRendering::Native => self.config.native_table_box.to_rect(),
            };
            info!("'{}' has no tabular content, showing a No Data message", asset.label());
            return self.place_pages(deck, asset, slide, 1, |_| Ok(PageContent::Text(TextBox::no_data(&asset.shape_name, bounds))));
        }

        let rows_per_page = self.config.rows_per_page(mode);
        let ranges = paginate(table.row_count(), rows_per_page);
        match mode {
            TableRendering::Raster => {
                let plan = self.rasterizer.plan(&table, panel, rows_per_page);
                let origin = panel.bounds();
                let dpi = panel.dpi as f64;
                self.place_pages(deck, asset, slide, ranges.len(), |page| {
                    let rendered = self.rasterizer.render_page(&plan, &table.page(ranges[page].clone()))?;
                    let area = Rect { height: pixels_to_emu(rendered.height, dpi), ..origin };
                    let picture = Picture::png(rendered.png, rendered.width, rendered.height);
                    picture_page(picture, &area)
                })
            }
            TableRendering::Native => {
                let area = self.config.native_table_box.to_rect();
                let widths = native::column_widths(&table, area, panel.min_col_width_emu());
                self.place_pages(deck, asset, slide, ranges.len(), |page| {
                    Ok(PageContent::Table(native::build_page(&table.page(ranges[page].clone()), &widths, area)))
                })
            }
        }
    }

    /// Findings or bullets as a text box, a few items per slide.
    fn place_narrative<D: SlideDeck + ?Sized>(
        &self,
        deck: &mut D,
        asset: &PlacementAsset,
        slide: usize,
        items: &[String],
    ) -> Result<Vec<AuditRecord>, RustyDeckError> {
        let items: Vec<String> = items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect();
        if items.is_empty() {
            Err(TableError::malformed(&asset.label(), "no narrative items"))?
        }
        let bounds = self.config.panel_for(asset.template_slide).bounds();
        let ranges = paginate(items.len(), self.config.pagination.narrative_items);
        self.place_pages(deck, asset, slide, ranges.len(), |page| {
            let paragraphs = items[ranges[page].clone()].to_vec();
            Ok(PageContent::Text(TextBox::paragraphs(&asset.shape_name, bounds, paragraphs, NARRATIVE_FONT_PT)))
        })
    }

    /// Puts `pages` pages of content on `slide` and on continuation slides inserted after it.
    fn place_pages<D, F>(
        &self,
        deck: &mut D,
        asset: &PlacementAsset,
        slide: usize,
        pages: usize,
        mut render: F,
    ) -> Result<Vec<AuditRecord>, RustyDeckError>
    where
        D: SlideDeck + ?Sized,
        F: FnMut(usize) -> Result<PageContent, RustyDeckError>,
    {
        let names = asset.placeholder_names();
        let placeholder = find_placeholder(deck, slide, &names)?;
        let label = asset.label();
        let mut records = Vec::with_capacity(pages);
        let mut rendered: Vec<PageContent> = Vec::with_capacity(pages);

        let mut stage = if pages <= 1 { PageStage::SinglePage } else { PageStage::Page1Rendering };
        while stage != PageStage::Done {
            stage = match stage {
                PageStage::SinglePage => {
                    let content = render(0)?;
                    records.push(self.populate(deck, slide, &placeholder, content, &label, asset)?);
                    PageStage::Done
                }
                PageStage::Page1Rendering => {
                    for page in 0..pages {
                        rendered.push(render(page)?);
                    }
                    PageStage::DuplicateRemaining
                }
                PageStage::DuplicateRemaining => {
                    self.insert_continuations(deck, slide, pages - 1)?;
                    PageStage::PopulateContinuations
                }
                PageStage::PopulateContinuations => {
                    for (page, content) in rendered.drain(..).enumerate() {
                        let target = slide + page;
                        let placeholder = if page == 0 { placeholder.clone() } else { find_placeholder(deck, target, &names)? };
                        records.push(self.populate(deck, target, &placeholder, content, &page_label(&label, page, pages), asset)?);
                    }
                    PageStage::Done
                }
                PageStage::Done => PageStage::Done,
            };
        }
        Ok(records)
    }

    /// Inserts `count` copies of `slide` right after it, titled as continuations.
    fn insert_continuations<D: SlideDeck + ?Sized>(&self, deck: &mut D, slide: usize, count: usize) -> Result<(), RustyDeckError> {
        let title = deck.shape_text(slide, &self.config.title_shape)?.unwrap_or_default();
        let title = continuation_title(&title, &self.config.continuation_suffix);
        for page in 1..=count {
            deck.duplicate_slide(slide, slide + page)?;
            deck.set_text_by_name(slide + page, &self.config.title_shape, &title)?;
        }
        debug!("Inserted {} continuation slide(s) after slide {}", count, slide + 1);
        Ok(())
    }

    /// Swaps the placeholder for one page of content.
    fn populate<D: SlideDeck + ?Sized>(
        &self,
        deck: &mut D,
        slide: usize,
        placeholder: &Shape,
        content: PageContent,
        label: &str,
        asset: &PlacementAsset,
    ) -> Result<AuditRecord, RustyDeckError> {
        let transform = match content {
            PageContent::Picture { picture, transform } => {
                deck.remove_shape(slide, placeholder.id)?;
                deck.add_picture(slide, &picture, transform.placed, &placeholder.name)?;
                Some(transform.to_audit())
            }
            PageContent::Table(table) => {
                deck.remove_shape(slide, placeholder.id)?;
                deck.add_table(slide, &table, &placeholder.name)?;
                None
            }
            PageContent::Text(mut text_box) => {
                text_box.name = placeholder.name.clone();
                deck.remove_shape(slide, placeholder.id)?;
                deck.add_text_box(slide, &text_box)?;
                None
            }
        };
        Ok(AuditRecord::ok(label, slide, asset.source_path(), transform))
    }
}

/// Contain-fits a rendered page into `area`.
fn picture_page(picture: Picture, area: &Rect) -> Result<PageContent, RustyDeckError> {
    let source = Rect { x: 0, y: 0, width: picture.width_px as i64, height: picture.height_px as i64 };
    let transform = compute_contain_transform(&source, area)?;
    Ok(PageContent::Picture { picture, transform })
}

fn find_placeholder<D: SlideDeck + ?Sized>(deck: &D, slide: usize, names: &[String]) -> Result<Shape, RustyDeckError> {
    let shape = deck.find_placeholder(slide, names)?;
    Ok(shape.ok_or_else(|| PlacementError::PlaceholderNotFound { slide, names: names.to_vec() })?)
}

fn ensure_exists(path: &Path) -> Result<(), PlacementError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PlacementError::AssetNotFound(path.display().to_string()))
    }
}

/// Name for content placed without a placeholder.
fn content_name(asset: &PlacementAsset) -> String {
    if asset.shape_name.is_empty() {
        asset.label()
    } else {
        asset.shape_name.clone()
    }
}

fn page_label(label: &str, page: usize, pages: usize) -> String {
    format!("{} (page {}/{})", label, page + 1, pages)
}

/// Heading of a continuation slide.
pub(crate) fn continuation_title(title: &str, suffix: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        suffix.to_owned()
    } else if title.ends_with(suffix) {
        title.to_owned()
    } else {
        format!("{} {}", title, suffix)
    }
}
