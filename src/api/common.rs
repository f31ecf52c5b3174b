//! Common API utilities and shared types
//!
//! Pagination query/response shapes and raw query-string parsing for
//! parameters that may repeat (`?tags=a&tags=b`).

use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{ListParams, PagedResult};

// ============================================================================
// Pagination
// ============================================================================

/// `?page=&limit=` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationQuery {
    pub fn to_params(&self, default_page_size: u32) -> ListParams {
        ListParams::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(default_page_size),
        )
    }
}

/// Paginated response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub results: Vec<T>,
}

impl<T> From<PagedResult<T>> for Paginated<T> {
    fn from(paged: PagedResult<T>) -> Self {
        Self {
            count: paged.total,
            page: paged.page,
            limit: paged.per_page,
            total_pages: paged.total_pages(),
            results: paged.items,
        }
    }
}

// ============================================================================
// Raw query parsing
// ============================================================================

/// Decode `a=1&b=x+y` into ordered pairs, keeping repeated keys.
pub fn parse_query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Parse an optional numeric query value, naming the parameter on failure.
pub fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::field_error(name, format!("'{}' must be a number", name)))
}

/// Interpret `1`/`true` as set; anything else as unset.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True")
}
