//! Raster table renderer: font-size search, natural column widths, compact rows.
use crate::config::PanelGeometry;
use crate::error::RustyDeckError;
use crate::table::font::FontCache;
use crate::table::font::FontHandle;
use crate::table::font::FontWeight;
use crate::table::layout::distribute;
use crate::table::layout::total_rows;
use crate::table::style;
use crate::table::style::Rgb;
use crate::table::TableData;
use crate::table::TableError;
use log::debug;
use std::sync::Arc;
use tiny_skia::Paint;
use tiny_skia::Pixmap;
use tiny_skia::Transform;

/// Share of the per-row height budget used as the starting font size
const HEIGHT_TO_FONT: f64 = 0.60;

/// Layout decisions shared by every page of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterPlan {
    pub font_size: u32,
    pub pad_x: u32,
    pub column_widths: Vec<u32>,
    pub canvas_width: u32,
    pub height_budget: u32,
    pub caption: Option<String>,
    /// True when even the smallest font did not fit and columns were squeezed
    pub forced_fit: bool,
}

impl RasterPlan {
    pub fn table_width(&self) -> u32 {
        self.column_widths.iter().sum()
    }

    /// Left margin that centers the table on the canvas.
    pub fn x_offset(&self) -> u32 {
        self.canvas_width.saturating_sub(self.table_width()) / 2
    }

    /// Row heights for a page with `data_rows` rows.
    pub fn row_heights(&self, data_rows: usize) -> Vec<u32> {
        let rows = total_rows(self.caption.is_some(), data_rows);
        let preferred = ((self.font_size as f64 * 2.5) as u32).max(self.font_size + 10);
        let compact = (preferred.saturating_mul(rows as u32)).min(self.height_budget);
        distribute(compact, rows)
    }
}

/// One rendered page.
#[derive(Clone, Debug)]
pub struct RasterPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Renders tables to transparent PNG images.
#[derive(Clone, Debug)]
pub struct TableRasterizer {
    fonts: Arc<FontCache>,
}

impl TableRasterizer {
    pub fn new(fonts: Arc<FontCache>) -> Self {
        TableRasterizer { fonts }
    }

    /// Picks font size and column widths for the whole dataset.
    ///
    /// # Arguments
    /// * `table` - All rows of the table, so every page shares one layout
    /// * `panel` - Canvas geometry and font bounds
    /// * `rows_per_page` - Page size, used for the height-derived starting size
    pub fn plan(&self, table: &TableData, panel: &PanelGeometry, rows_per_page: usize) -> RasterPlan {
        let (canvas_width, height_budget) = panel.canvas_pixels();
        let caption = table.metadata.caption();
        let rows = total_rows(caption.is_some(), table.row_count().min(rows_per_page.max(1)));
        let (min_font, max_font) = (panel.min_font_pt, panel.max_font_pt.max(panel.min_font_pt));

        let start = ((height_budget as f64 / rows as f64 * HEIGHT_TO_FONT) as u32).clamp(min_font, max_font);
        let mut font_size = start;
        let mut column_widths = self.natural_widths(table, font_size);
        while font_size > min_font && column_widths.iter().sum::<u32>() > canvas_width {
            font_size -= 1;
            column_widths = self.natural_widths(table, font_size);
        }

        let natural: u32 = column_widths.iter().sum();
        let forced_fit = natural > canvas_width;
        if forced_fit {
            squeeze(&mut column_widths, canvas_width);
            debug!("Table needs {}px at {}px font, squeezed into {}px", natural, font_size, canvas_width);
        }

        RasterPlan {
            font_size,
            pad_x: pad_x(font_size),
            column_widths,
            canvas_width,
            height_budget,
            caption,
            forced_fit,
        }
    }

    /// Widest text per column at `font_size`, plus padding; headers are measured bold.
    pub fn natural_widths(&self, table: &TableData, font_size: u32) -> Vec<u32> {
        let regular = self.fonts.font(font_size, FontWeight::Regular);
        let bold = self.fonts.font(font_size, FontWeight::Bold);
        let padding = 2 * pad_x(font_size);
        table
            .headers
            .iter()
            .enumerate()
            .map(|(column, header)| {
                let widest = table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| regular.text_width(cell))
                    .fold(bold.text_width(header), u32::max);
                widest + padding
            })
            .collect()
    }

    /// Draws one page of `plan` with the rows of `page`.
    pub fn render_page(&self, plan: &RasterPlan, page: &TableData) -> Result<RasterPage, RustyDeckError> {
        let heights = plan.row_heights(page.row_count());
        let height: u32 = heights.iter().sum();
        let mut pixmap = Pixmap::new(plan.canvas_width, height).ok_or(TableError::CanvasError(plan.canvas_width, height))?;

        let regular = self.fonts.font(plan.font_size, FontWeight::Regular);
        let bold = self.fonts.font(plan.font_size, FontWeight::Bold);
        let mut painter = RowPainter { pixmap: &mut pixmap, plan, y: 0 };
        let mut heights = heights.into_iter();

        if let Some(caption) = &plan.caption {
            let row_height = heights.next().unwrap_or(0);
            painter.fill(plan.x_offset(), plan.table_width(), row_height, style::TITLE_BACKGROUND);
            painter.text(&bold, caption, plan.x_offset() + plan.pad_x, row_height);
            painter.advance(row_height);
        }

        let header_height = heights.next().unwrap_or(0);
        painter.row(&bold, &page.headers, header_height, style::HEADER_BACKGROUND);

        if page.rows.is_empty() {
            let row_height = heights.next().unwrap_or(0);
            painter.row(&regular, &[style::NO_DATA_ROW.to_owned()], row_height, style::row_background(0));
        }
        for (index, (row, row_height)) in page.rows.iter().zip(heights).enumerate() {
            painter.row(&regular, row, row_height, style::row_background(index));
        }

        let png = pixmap.encode_png().map_err(|error| TableError::EncodingError(error.to_string()))?;
        Ok(RasterPage { png, width: plan.canvas_width, height })
    }
}

fn pad_x(font_size: u32) -> u32 {
    ((font_size as f64 * 0.4) as u32).max(3)
}

/// Shrinks widths proportionally so they sum to `target`; the last column takes the remainder.
fn squeeze(widths: &mut [u32], target: u32) {
    let natural: u32 = widths.iter().sum();
    if natural == 0 || widths.is_empty() {
        return;
    }
    let factor = target as f64 / natural as f64;
    for width in widths.iter_mut() {
        *width = ((*width as f64 * factor) as u32).max(1);
    }
    let others: u32 = widths[..widths.len() - 1].iter().sum();
    if let Some(last) = widths.last_mut() {
        *last = target.saturating_sub(others).max(1);
    }
}

/// Paints consecutive rows top to bottom.
struct RowPainter<'a> {
    pixmap: &'a mut Pixmap,
    plan: &'a RasterPlan,
    y: u32,
}

impl RowPainter<'_> {
    fn fill(&mut self, x: u32, width: u32, height: u32, color: Rgb) {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.0, color.1, color.2, 255);
        if let Some(rect) = tiny_skia::Rect::from_xywh(x as f32, self.y as f32, width as f32, height as f32) {
            self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn text(&mut self, font: &FontHandle, text: &str, x: u32, row_height: u32) {
        if text.is_empty() {
            return;
        }
        let pad_y = (row_height.saturating_sub(font.size()) / 2).max(2);
        font.draw_text(self.pixmap, text, x as f32, (self.y + pad_y) as f32, style::TEXT);
    }

    /// Draws a full-width row; cells beyond `cells` stay empty.
    fn row(&mut self, font: &FontHandle, cells: &[String], height: u32, background: Rgb) {
        let mut x = self.plan.x_offset();
        for (column, width) in self.plan.column_widths.iter().enumerate() {
            self.fill(x, *width, height, background);
            if let Some(cell) = cells.get(column) {
                self.text(font, cell, x + self.plan.pad_x, height);
            }
            x += width;
        }
        self.advance(height);
    }

    fn advance(&mut self, height: u32) {
        self.y += height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontStrategy;

    fn rasterizer() -> TableRasterizer {
        TableRasterizer::new(Arc::new(FontCache::new(FontStrategy::builtin_only())))
    }

    fn table(columns: usize, rows: usize, cell: &str) -> TableData {
        TableData {
            headers: (0..columns).map(|column| format!("C{}", column)).collect(),
            rows: (0..rows).map(|_| vec![cell.to_owned(); columns]).collect(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn small_table_keeps_large_font_and_compact_height() {
        let panel = PanelGeometry::default();
        let plan = rasterizer().plan(&table(2, 2, "abc"), &panel, 40);
        // 740px budget over 3 rows
        assert_eq!(plan.font_size, 28);
        assert!(!plan.forced_fit);
        assert_eq!(plan.pad_x, 11);
        // "abc" at 28px is 3 * 21 = 63px plus 22px padding
        assert_eq!(plan.column_widths, vec![85, 85]);
        assert_eq!(plan.x_offset(), (1424 - 170) / 2);
        assert_eq!(plan.row_heights(2), vec![70, 70, 70]);
    }

    #[test]
    fn wide_table_searches_down_to_a_fitting_size() {
        let panel = PanelGeometry::default();
        let rasterizer = rasterizer();
        let data = table(6, 3, "abcdefghijklmnopqrst");
        let plan = rasterizer.plan(&data, &panel, 40);
        assert!(!plan.forced_fit);
        assert!(plan.table_width() <= plan.canvas_width);
        assert!(plan.font_size < 28);
        let larger: u32 = rasterizer.natural_widths(&data, plan.font_size + 1).iter().sum();
        assert!(larger > plan.canvas_width);
    }

    #[test]
    fn overflowing_table_is_squeezed_at_minimum_font() {
        let panel = PanelGeometry::default();
        let plan = rasterizer().plan(&table(12, 1, &"x".repeat(60)), &panel, 40);
        assert!(plan.forced_fit);
        assert_eq!(plan.font_size, 8);
        assert_eq!(plan.table_width(), plan.canvas_width);
        assert_eq!(plan.x_offset(), 0);
    }

    #[test]
    fn empty_table_renders_a_no_data_row() {
        let rasterizer = rasterizer();
        let mut data = table(3, 0, "");
        data.metadata.title = Some("Rare Ports".to_owned());
        let plan = rasterizer.plan(&data, &PanelGeometry::default(), 40);
        assert_eq!(plan.row_heights(0).len(), 3);
        let page = rasterizer.render_page(&plan, &data).unwrap();
        assert_eq!(page.width, 1424);
        assert_eq!(page.height, plan.row_heights(0).iter().sum::<u32>());
        assert_eq!(&page.png[1..4], b"PNG");
    }

    #[test]
    fn pages_share_plan_and_shrink_height() {
        let rasterizer = rasterizer();
        let data = table(2, 50, "host");
        let plan = rasterizer.plan(&data, &PanelGeometry::default(), 40);
        let first = rasterizer.render_page(&plan, &data.page(0..40)).unwrap();
        let second = rasterizer.render_page(&plan, &data.page(40..50)).unwrap();
        assert_eq!(first.width, second.width);
        assert!(second.height < first.height);
        assert!(first.height <= plan.height_budget);
    }

    #[test]
    fn squeeze_hits_target_exactly() {
        let mut widths = vec![300, 500, 700];
        squeeze(&mut widths, 750);
        assert_eq!(widths, vec![150, 250, 350]);

        let mut uneven = vec![333, 333, 334];
        squeeze(&mut uneven, 700);
        assert_eq!(uneven.iter().sum::<u32>(), 700);
    }
}
