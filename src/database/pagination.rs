use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    #[serde(rename = "results")]
    pub rows: Vec<T>,
    #[serde(rename = "count")]
    pub total_rows: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows);
        }
        let page_size = page_size.max(1);

        let next_offset = Some(current_offset + page_size).filter(|next| *next < total_rows);
        let prev_offset = match current_offset {
            0 => None,
            offset => Some((offset - page_size).max(0)),
        };

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
        }
    }

    pub fn no_rows(total_rows: i64) -> Self {
        Self {
            rows: vec![],
            total_rows,
            next_offset: None,
            prev_offset: None,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            next_offset: self.next_offset,
            prev_offset: self.prev_offset,
        }
    }
}

/// Clamps a caller-supplied limit/offset pair.
pub fn page_window(limit: Option<i64>, offset: Option<i64>, default_size: i64) -> (i64, i64) {
    let limit = limit
        .filter(|limit| *limit > 0)
        .unwrap_or(default_size)
        .min(MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_only_next() {
        let page = PageContext::from_rows(vec![1, 2, 3], 7, 3, 0);
        assert_eq!(page.next_offset, Some(3));
        assert_eq!(page.prev_offset, None);
        assert_eq!(page.total_rows, 7);
    }

    #[test]
    fn last_page_has_only_previous() {
        let page = PageContext::from_rows(vec![7], 7, 3, 6);
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(3));
    }

    #[test]
    fn short_offsets_clamp_to_zero() {
        let page = PageContext::from_rows(vec![2, 3, 4], 7, 3, 1);
        assert_eq!(page.prev_offset, Some(0));
        assert_eq!(page.next_offset, Some(4));
    }

    #[test]
    fn empty_page_serializes_like_a_list_response() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 6, 0);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["count"], 0);
        assert_eq!(value["results"], serde_json::json!([]));
        assert!(value["next_offset"].is_null());
    }

    #[test]
    fn window_falls_back_and_clamps() {
        assert_eq!(page_window(None, None, 6), (6, 0));
        assert_eq!(page_window(Some(0), Some(-4), 6), (6, 0));
        assert_eq!(page_window(Some(1000), Some(12), 6), (MAX_PAGE_SIZE, 12));
    }
}
