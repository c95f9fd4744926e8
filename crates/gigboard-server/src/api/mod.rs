pub mod artists;
pub mod shows;
pub mod stats;
pub mod venues;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// One row of a name search: `{count, data}` responses share this shape
/// for venues and artists.
#[derive(Debug, Serialize)]
pub struct SearchItem {
    pub id: Uuid,
    pub name: String,
    pub num_upcoming_shows: u64,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub count: usize,
    pub data: Vec<SearchItem>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Build an ILIKE pattern for a substring search. The empty term becomes
/// `%%`, which matches every row.
// SECURITY: escape SQL LIKE wildcards to prevent wildcard-abuse DoS
pub fn search_pattern(term: &str) -> String {
    let escaped = term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}
