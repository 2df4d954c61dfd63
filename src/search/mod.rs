//! Video search providers.

pub mod youtube;

use std::future::Future;

pub use youtube::YouTubeSearch;

/// Outcome of one provider query, tagged so "nothing found" never gets
/// confused with "provider unreachable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Found(Vec<String>),
    Empty,
    TransportError(String),
}

impl SearchResult {
    pub fn from_ids(ids: Vec<String>) -> Self {
        if ids.is_empty() {
            SearchResult::Empty
        } else {
            SearchResult::Found(ids)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchResult::Found(ids) if !ids.is_empty())
    }
}

pub trait SearchProvider: Send + Sync {
    /// False when the provider lacks credentials; nothing should be queried.
    fn is_configured(&self) -> bool {
        true
    }

    /// Ordered video ids for a free-text query.
    fn search(&self, query: &str) -> impl Future<Output = SearchResult> + Send;
}
