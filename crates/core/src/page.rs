//! Offset paging for read-only listings.

use serde::{Deserialize, Serialize};

/// Zero-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn first(size: usize) -> Self {
        Self { page: 0, size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    /// Cut the requested window out of an already ordered result set.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total_items = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();

        Self {
            items,
            page: request.page,
            size: request.size,
            total_items,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.size == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.size)
    }

    pub fn has_next(&self) -> bool {
        self.page.saturating_add(1) < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_returns_requested_window_and_totals() {
        let page = Page::slice((0..45).collect::<Vec<_>>(), PageRequest::new(2, 20));
        assert_eq!(page.items, (40..45).collect::<Vec<_>>());
        assert_eq!(page.total_items, 45);
        assert_eq!(page.total_pages(), 3);
        assert!(!page.has_next());
    }

    #[test]
    fn has_next_at_last_possible_page() {
        let page = Page::slice(vec![1, 2, 3], PageRequest::new(usize::MAX, 2));
        assert!(page.items.is_empty());
        assert!(!page.has_next());

        let first = Page::slice(vec![1, 2, 3], PageRequest::first(2));
        assert!(first.has_next());
    }

    #[test]
    fn slice_past_the_end_is_empty() {
        let page = Page::slice(vec![1, 2, 3], PageRequest::new(5, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 3);
    }
}
