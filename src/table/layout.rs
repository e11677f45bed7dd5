//! Column allocation, pagination and row-height arithmetic shared by both renderers.
use crate::table::TableData;
use std::ops::Range;

/// Smallest weight any column receives
const MIN_WEIGHT: f64 = 3.0;

/// Share of a column's weight taken from its longest cell
const MAX_LEN_SHARE: f64 = 0.7;

/// Share of a column's weight taken from its mean cell length
const AVG_LEN_SHARE: f64 = 0.3;

/// Content weight of each column over the header and every data row.
pub fn column_weights(table: &TableData) -> Vec<f64> {
    let samples = (table.rows.len() + 1) as f64;
    (0..table.headers.len())
        .map(|column| {
            let header = table.headers[column].chars().count();
            let (max_len, total_len) = table
                .rows
                .iter()
                .map(|row| row.get(column).map(|cell| cell.chars().count()).unwrap_or(0))
                .fold((header, header), |(max, total), len| (max.max(len), total + len));
            let avg_len = total_len as f64 / samples;
            (max_len as f64 * MAX_LEN_SHARE + avg_len * AVG_LEN_SHARE).max(MIN_WEIGHT)
        })
        .collect()
}

/// Splits `total` across the columns in proportion to their weights.
///
/// Every column starts at no less than `min_width`; if the floors push the sum off
/// `total`, all widths are rescaled and the last column absorbs the remainder, so
/// the result always sums to `total` exactly.
///
/// # Arguments
/// * `table` - Whole dataset, not a single page, so pages share widths
/// * `total` - Width to fill
/// * `min_width` - Floor applied before rescaling
pub fn allocate_column_widths(table: &TableData, total: i64, min_width: i64) -> Vec<i64> {
    let total = total.max(0);
    let weights = column_weights(table);
    match weights.len() {
        0 => return Vec::new(),
        1 => return vec![total],
        _ => (),
    }

    let weight_sum: f64 = weights.iter().sum();
    let mut widths: Vec<i64> = weights
        .iter()
        .map(|weight| ((total as f64 * weight / weight_sum) as i64).max(min_width))
        .collect();

    let current: i64 = widths.iter().sum();
    if current != total {
        let factor = total as f64 / current as f64;
        for width in widths.iter_mut() {
            *width = (*width as f64 * factor) as i64;
        }
        let residual = total - widths.iter().sum::<i64>();
        if let Some(last) = widths.last_mut() {
            *last += residual;
        }
    }
    widths
}

/// Row ranges for each page. An empty dataset still yields one (empty) page.
pub fn paginate(total: usize, page_size: usize) -> Vec<Range<usize>> {
    let page_size = page_size.max(1);
    if total == 0 {
        return vec![0..0];
    }
    (0..total)
        .step_by(page_size)
        .map(|start| start..(start + page_size).min(total))
        .collect()
}

/// Splits `total` into `parts` near-equal pieces; the first pieces take the remainder.
pub fn distribute(total: u32, parts: usize) -> Vec<u32> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts as u32;
    let extra = (total % parts as u32) as usize;
    (0..parts).map(|index| base + u32::from(index < extra)).collect()
}

/// Rows a rendered page shows: optional title bar, header, and at least one body row.
pub fn total_rows(has_title: bool, data_rows: usize) -> usize {
    usize::from(has_title) + 1 + data_rows.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> TableData {
        TableData {
            headers: headers.iter().map(|cell| cell.to_string()).collect(),
            rows: rows.iter().map(|row| row.iter().map(|cell| cell.to_string()).collect()).collect(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn weights_use_max_and_mean_with_floor() {
        let data = table(&["Hostname", "N"], &[&["workstation-01", "1"], &["db", "22"]]);
        let weights = column_weights(&data);
        // max 14, mean (8 + 14 + 2) / 3 = 8
        assert!((weights[0] - (14.0 * 0.7 + 8.0 * 0.3)).abs() < 1e-9);
        assert_eq!(weights[1], 3.0);
    }

    #[test]
    fn widths_are_proportional_and_exact() {
        let data = table(&["Hostname", "N"], &[&["workstation-01", "1"], &["db", "22"]]);
        let widths = allocate_column_widths(&data, 6_291_072, 502_920);
        assert_eq!(widths.iter().sum::<i64>(), 6_291_072);
        assert!(widths[0] > widths[1]);
        assert!(widths[1] >= 502_920 - 1);
    }

    #[test]
    fn single_and_empty_tables() {
        assert_eq!(allocate_column_widths(&table(&["Only"], &[]), 1000, 200), vec![1000]);
        assert!(allocate_column_widths(&table(&[], &[]), 1000, 200).is_empty());
    }

    #[test]
    fn floors_that_overflow_are_rescaled() {
        let data = table(&["a", "b", "c", "d"], &[]);
        let widths = allocate_column_widths(&data, 1000, 400);
        assert_eq!(widths, vec![250, 250, 250, 250]);
    }

    #[test]
    fn ninety_five_rows_make_three_pages() {
        let pages = paginate(95, 40);
        assert_eq!(pages, vec![0..40, 40..80, 80..95]);
        assert_eq!(paginate(0, 40), vec![0..0]);
        assert_eq!(paginate(40, 40).len(), 1);
    }

    #[test]
    fn distribution_front_loads_remainder() {
        assert_eq!(distribute(10, 3), vec![4, 3, 3]);
        assert_eq!(distribute(9, 3), vec![3, 3, 3]);
        assert_eq!(total_rows(true, 0), 3);
        assert_eq!(total_rows(false, 40), 41);
    }

    fn arbitrary_table() -> impl Strategy<Value = TableData> {
        (1usize..8).prop_flat_map(|columns| {
            (
                prop::collection::vec("[a-zA-Z0-9 ]{0,12}", columns),
                prop::collection::vec(prop::collection::vec("[a-z0-9.\\-]{0,40}", columns), 0..30),
            )
                .prop_map(|(headers, rows)| TableData { headers, rows, metadata: Default::default() })
        })
    }

    proptest! {
        #[test]
        fn widths_always_sum_to_total(data in arbitrary_table(), total in 0i64..20_000_000, min_width in 0i64..2_000_000) {
            let widths = allocate_column_widths(&data, total, min_width);
            prop_assert_eq!(widths.len(), data.headers.len());
            prop_assert_eq!(widths.iter().sum::<i64>(), total);
        }

        #[test]
        fn pages_reconstruct_rows(total in 1usize..2_000, page_size in 1usize..100) {
            let pages = paginate(total, page_size);
            prop_assert_eq!(pages.len(), total.div_ceil(page_size));
            let rebuilt: Vec<usize> = pages.iter().flat_map(|page| page.clone()).collect();
            prop_assert_eq!(rebuilt, (0..total).collect::<Vec<_>>());
            prop_assert!(pages.iter().all(|page| page.len() <= page_size && !page.is_empty()));
        }
    }
}
