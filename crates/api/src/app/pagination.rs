//! Pagination and sorting conventions shared by every list endpoint.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Parses `sort=field:direction` into `(field, descending)`. Missing or
    /// malformed values sort ascending on the given field name verbatim.
    pub fn sort_spec(&self) -> Option<(String, bool)> {
        let raw = self.sort.as_ref()?;
        match raw.split_once(':') {
            Some((field, dir)) => Some((field.to_string(), dir.eq_ignore_ascii_case("desc"))),
            None => Some((raw.clone(), false)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// Applies in-memory pagination over an already-filtered (and, if the
/// caller sorted it, already-sorted) slice of items.
pub fn paginate<T>(mut items: Vec<T>, query: &PageQuery) -> Paginated<T> {
    let total = items.len();
    let page = query.page();
    let limit = query.limit();
    let start = ((page - 1) as usize) * (limit as usize);
    let end = (start + limit as usize).min(items.len());
    let page_items = if start >= items.len() { Vec::new() } else { items.drain(start..end).collect() };
    Paginated { items: page_items, total, page, limit }
}
