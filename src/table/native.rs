//! Native (editable) slide tables sized to a fixed box.
use crate::table::layout::allocate_column_widths;
use crate::table::layout::total_rows;
use crate::table::style;
use crate::table::style::Rgb;
use crate::table::TableData;
use crate::transform::points_to_emu;
use crate::transform::Rect;

/// Horizontal cell margin (points)
pub const CELL_MARGIN_X_PT: f64 = 2.0;

/// Vertical cell margin (points)
pub const CELL_MARGIN_Y_PT: f64 = 1.0;

/// One table row with its styling.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeRow {
    pub cells: Vec<String>,
    pub fill: Rgb,
    pub bold: bool,
    pub font_pt: f64,
}

/// A fully laid out table ready to be inserted into a slide.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeTable {
    pub bounds: Rect,
    pub column_widths: Vec<i64>,
    pub row_height: i64,
    pub rows: Vec<NativeRow>,
}

/// Header and body font sizes for a table with `rows` rows including the header.
pub fn font_sizes(rows: usize) -> (f64, f64) {
    match rows {
        rows if rows > 8 => (7.0, 6.0),
        rows if rows > 5 => (8.0, 7.0),
        _ => (9.0, 8.0),
    }
}

/// Builds one page of a native table.
///
/// # Arguments
/// * `page` - Rows for this page
/// * `column_widths` - Widths allocated over the whole dataset
/// * `area` - Box the table must stay inside
pub fn build_page(page: &TableData, column_widths: &[i64], area: Rect) -> NativeTable {
    let rows = total_rows(false, page.row_count());
    let (header_pt, body_pt) = font_sizes(rows);
    let row_height = (area.height / rows as i64).min(points_to_emu(body_pt * 2.5)).max(1);

    let mut table_rows = Vec::with_capacity(rows);
    table_rows.push(NativeRow {
        cells: page.headers.clone(),
        fill: style::HEADER_BACKGROUND,
        bold: true,
        font_pt: header_pt,
    });
    if page.rows.is_empty() {
        let mut cells = vec![String::new(); page.column_count()];
        if let Some(first) = cells.first_mut() {
            *first = style::NO_DATA_ROW.to_owned();
        }
        table_rows.push(NativeRow { cells, fill: style::row_background(0), bold: false, font_pt: body_pt });
    }
    for (index, row) in page.rows.iter().enumerate() {
        table_rows.push(NativeRow {
            cells: row.clone(),
            fill: style::row_background(index),
            bold: false,
            font_pt: body_pt,
        });
    }

    NativeTable {
        bounds: Rect {
            x: area.x,
            y: area.y,
            width: column_widths.iter().sum(),
            height: row_height * rows as i64,
        },
        column_widths: column_widths.to_vec(),
        row_height,
        rows: table_rows,
    }
}

/// Column widths for a native table spanning `area`, computed over every row.
pub fn column_widths(table: &TableData, area: Rect, min_width: i64) -> Vec<i64> {
    allocate_column_widths(table, area.width, min_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::layout::paginate;

    fn data(rows: usize) -> TableData {
        TableData {
            headers: vec!["Host".to_owned(), "Port".to_owned()],
            rows: (0..rows).map(|index| vec![format!("10.0.0.{}", index), "443".to_owned()]).collect(),
            metadata: Default::default(),
        }
    }

    fn area() -> Rect {
        Rect::from_inches(1.56, 1.20, 6.88, 2.80)
    }

    #[test]
    fn empty_page_gets_a_no_data_row() {
        let table = data(0);
        let widths = column_widths(&table, area(), 502_920);
        let native = build_page(&table, &widths, area());
        assert_eq!(native.rows.len(), 2);
        assert_eq!(native.rows[1].cells, vec!["No data".to_owned(), String::new()]);
        assert_eq!(native.bounds.width, area().width);
    }

    #[test]
    fn rows_are_compact_and_striped() {
        let table = data(7);
        let widths = column_widths(&table, area(), 502_920);
        let native = build_page(&table, &widths, area());
        assert_eq!(native.rows.len(), 8);
        assert_eq!((native.rows[0].font_pt, native.rows[1].font_pt), (8.0, 7.0));
        // 2.5 x 7pt is shorter than 2.8in / 8
        assert_eq!(native.row_height, points_to_emu(17.5));
        assert!(native.bounds.height <= area().height);
        assert!(native.rows[0].bold);
        assert_eq!(native.rows[1].fill, style::DARK_ROW);
        assert_eq!(native.rows[2].fill, style::LIGHT_ROW);
    }

    #[test]
    fn pages_share_widths() {
        let table = data(20);
        let widths = column_widths(&table, area(), 502_920);
        let pages: Vec<NativeTable> = paginate(table.row_count(), 7)
            .into_iter()
            .map(|range| build_page(&table.page(range), &widths, area()))
            .collect();
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|page| page.column_widths == widths));
        assert_eq!(pages[2].rows.len(), 7);
    }

    #[test]
    fn font_steps() {
        assert_eq!(font_sizes(9), (7.0, 6.0));
        assert_eq!(font_sizes(6), (8.0, 7.0));
        assert_eq!(font_sizes(3), (9.0, 8.0));
    }
}
