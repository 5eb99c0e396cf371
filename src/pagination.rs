//! Backend for the admin panel data tables.
//!
//! List endpoints accept an optional `TableQuery` and return a `PageDto`
//! that carries the visible rows together with the page-button strip the
//! table renders. The strip is a sliding window of at most
//! `PAGE_WINDOW` page numbers centered on the current page; a `null`
//! entry marks a truncation gap towards the first or last page.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of page buttons in the sliding window.
pub const PAGE_WINDOW: u32 = 5;

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query parameters shared by all list endpoints.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TableQuery {
    /// 1-based page number, clamped to the available range.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Column to sort by. Accepted names are listed per endpoint.
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    /// Case-insensitive substring filter on the endpoint's filter column.
    pub filter: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct PageDto<T> {
    pub rows: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_rows: u32,
    pub total_pages: u32,
    /// Page buttons, `null` marks a truncation gap.
    pub strip: Vec<Option<u32>>,
}

/// Slice the already filtered and sorted rows into the requested page.
pub fn paginate<T>(rows: Vec<T>, query: &TableQuery) -> PageDto<T> {
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let total_rows = rows.len() as u32;
    let total_pages = (total_rows + per_page - 1) / per_page;
    let page = query.page.unwrap_or(1).clamp(1, total_pages.max(1));

    let offset = ((page - 1) * per_page) as usize;
    let rows = rows
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .collect();

    PageDto {
        rows,
        page,
        per_page,
        total_rows,
        total_pages,
        strip: page_strip(page, total_pages),
    }
}

/// Compute the page-button strip for the given current page.
///
/// At most `PAGE_WINDOW` consecutive page numbers are shown, centered on
/// the current page and shifted at the edges. When the window does not
/// reach an edge the first/last page number is kept visible, separated by
/// a `None` gap marker if pages are skipped in between.
pub fn page_strip(page: u32, total_pages: u32) -> Vec<Option<u32>> {
    if total_pages == 0 {
        return Vec::new();
    }
    if total_pages <= PAGE_WINDOW {
        return (1..=total_pages).map(Some).collect();
    }

    let half = PAGE_WINDOW / 2;
    let start = page
        .saturating_sub(half)
        .clamp(1, total_pages - PAGE_WINDOW + 1);
    let end = start + PAGE_WINDOW - 1;

    let mut strip = Vec::new();
    if start > 1 {
        strip.push(Some(1));
        if start > 2 {
            strip.push(None);
        }
    }
    strip.extend((start..=end).map(Some));
    if end < total_pages {
        if end + 1 < total_pages {
            strip.push(None);
        }
        strip.push(Some(total_pages));
    }
    strip
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: u32, per_page: u32) -> TableQuery {
        TableQuery {
            page: Some(page),
            per_page: Some(per_page),
            ..TableQuery::default()
        }
    }

    #[test]
    fn strip_of_short_list_has_no_gaps() {
        assert_eq!(page_strip(1, 0), vec![]);
        assert_eq!(page_strip(1, 1), vec![Some(1)]);
        assert_eq!(
            page_strip(3, 5),
            vec![Some(1), Some(2), Some(3), Some(4), Some(5)]
        );
    }

    #[test]
    fn strip_at_left_edge() {
        assert_eq!(
            page_strip(1, 9),
            vec![Some(1), Some(2), Some(3), Some(4), Some(5), None, Some(9)]
        );
        assert_eq!(
            page_strip(3, 9),
            vec![Some(1), Some(2), Some(3), Some(4), Some(5), None, Some(9)]
        );
    }

    #[test]
    fn strip_in_the_middle_is_centered() {
        assert_eq!(
            page_strip(5, 9),
            vec![
                Some(1),
                None,
                Some(3),
                Some(4),
                Some(5),
                Some(6),
                Some(7),
                None,
                Some(9)
            ]
        );
    }

    #[test]
    fn strip_at_right_edge() {
        assert_eq!(
            page_strip(9, 9),
            vec![Some(1), None, Some(5), Some(6), Some(7), Some(8), Some(9)]
        );
        assert_eq!(
            page_strip(7, 9),
            vec![Some(1), None, Some(5), Some(6), Some(7), Some(8), Some(9)]
        );
    }

    #[test]
    fn strip_without_gap_next_to_edge() {
        // window starts at page 2, page 1 is attached without a marker
        assert_eq!(
            page_strip(4, 7),
            vec![Some(1), Some(2), Some(3), Some(4), Some(5), Some(6), Some(7)]
        );
    }

    #[test]
    fn paginate_slices_and_clamps() {
        let rows: Vec<u32> = (1..=23).collect();

        let page = paginate(rows.clone(), &query(1, 10));
        assert_eq!(page.rows, (1..=10).collect::<Vec<_>>());
        assert_eq!(page.total_rows, 23);
        assert_eq!(page.total_pages, 3);

        let page = paginate(rows.clone(), &query(3, 10));
        assert_eq!(page.rows, vec![21, 22, 23]);

        // out-of-range page is clamped to the last page
        let page = paginate(rows, &query(99, 10));
        assert_eq!(page.page, 3);
        assert_eq!(page.rows, vec![21, 22, 23]);
    }

    #[test]
    fn paginate_empty_dataset() {
        let page = paginate(Vec::<u32>::new(), &TableQuery::default());
        assert!(page.rows.is_empty());
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.strip.is_empty());
    }
}
