//! Cross-category search with fuzzy ranking and duplicate suppression

use crate::apps::TitleIndex;
use crate::catalog::{CatalogHandle, TitleEntry};
use crate::igdb::MetadataProvider;
use anyhow::{bail, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Which origin buckets a search touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCategory {
    All,
    Library,
    Bay,
    Apps,
    Peers,
}

impl SearchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchCategory::All => "all",
            SearchCategory::Library => "library",
            SearchCategory::Bay => "bay",
            SearchCategory::Apps => "apps",
            SearchCategory::Peers => "peers",
        }
    }

    pub fn from_cli(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "all" => Ok(SearchCategory::All),
            "library" => Ok(SearchCategory::Library),
            "bay" => Ok(SearchCategory::Bay),
            "apps" => Ok(SearchCategory::Apps),
            "peers" => Ok(SearchCategory::Peers),
            other => bail!(
                "Invalid category '{}'. Valid values: all, library, bay, apps, peers",
                other
            ),
        }
    }
}

/// Normalized dedup key: case-folded, trimmed display name.
pub fn dedup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            matrix[i][j] = if a[i - 1] == b[j - 1] {
                matrix[i - 1][j - 1] + 1
            } else {
                matrix[i - 1][j].max(matrix[i][j - 1])
            };
        }
    }
    matrix[a.len()][b.len()]
}

/// Similarity ratio between two strings (0.0 to 1.0), case-insensitive:
/// `2 * lcs / (len_a + len_b)`.
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    (2 * lcs_len(&a, &b)) as f32 / (a.len() + b.len()) as f32
}

/// Keep the first occurrence of each normalized name, preserving order.
pub fn dedup_entries(entries: Vec<TitleEntry>) -> Vec<TitleEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(dedup_key(e.display_name())))
        .collect()
}

/// Order entries by descending similarity to the query. Stable: ties keep
/// their incoming order.
fn rank_by_similarity(entries: Vec<TitleEntry>, query: &str) -> Vec<TitleEntry> {
    let mut scored: Vec<(f32, TitleEntry)> = entries
        .into_iter()
        .map(|e| (similarity_ratio(e.display_name(), query), e))
        .collect();
    scored.sort_by(|x, y| y.0.partial_cmp(&x.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, e)| e).collect()
}

/// Per-category result sets plus the deduplicated merge.
#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    pub library: Vec<TitleEntry>,
    pub bay: Vec<TitleEntry>,
    pub apps: Vec<TitleEntry>,
    pub peers: Vec<TitleEntry>,
    /// Merge of all categories in order library, bay, apps, peers, with
    /// duplicate names suppressed.
    pub combined: Vec<TitleEntry>,
}

/// Ad hoc querying across one or all categories.
pub struct SearchEngine {
    catalog: Arc<CatalogHandle>,
    provider: Option<Arc<dyn MetadataProvider>>,
    apps: Arc<dyn TitleIndex>,
    peers: Arc<dyn TitleIndex>,
}

impl SearchEngine {
    pub fn new(
        catalog: Arc<CatalogHandle>,
        provider: Option<Arc<dyn MetadataProvider>>,
        apps: Arc<dyn TitleIndex>,
        peers: Arc<dyn TitleIndex>,
    ) -> Self {
        Self {
            catalog,
            provider,
            apps,
            peers,
        }
    }

    /// Search the requested category (or all of them). An empty query
    /// returns the full current catalog.
    pub async fn search(
        &self,
        query: &str,
        category: SearchCategory,
        limit: usize,
    ) -> Result<SearchResults> {
        let limit = if limit == 0 {
            DEFAULT_SEARCH_LIMIT
        } else {
            limit.min(MAX_SEARCH_LIMIT)
        };
        let query = query.trim();
        let mut results = SearchResults::default();

        if query.is_empty() {
            let snapshot = self.catalog.current().await;
            results.library = dedup_entries(snapshot.entries.clone());
            results.combined = results.library.clone();
            return Ok(results);
        }

        if matches!(category, SearchCategory::All | SearchCategory::Library) {
            results.library = dedup_entries(self.search_library(query, limit).await);
        }
        if matches!(category, SearchCategory::All | SearchCategory::Bay) {
            results.bay = dedup_entries(self.search_bay(query, limit).await?);
        }
        if matches!(category, SearchCategory::All | SearchCategory::Apps) {
            results.apps = dedup_entries(self.apps.search(query, limit).await?);
        }
        if matches!(category, SearchCategory::All | SearchCategory::Peers) {
            results.peers = dedup_entries(self.peers.search(query, limit).await?);
        }

        let merged = results
            .library
            .iter()
            .chain(results.bay.iter())
            .chain(results.apps.iter())
            .chain(results.peers.iter())
            .cloned()
            .collect();
        results.combined = dedup_entries(merged);

        Ok(results)
    }

    /// Substring match over entry names and cached metadata names, ranked
    /// by similarity to the query.
    async fn search_library(&self, query: &str, limit: usize) -> Vec<TitleEntry> {
        let snapshot = self.catalog.current().await;
        let needle = query.to_lowercase();

        let matches: Vec<TitleEntry> = snapshot
            .entries
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.metadata
                        .as_ref()
                        .is_some_and(|m| m.name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        let mut ranked = rank_by_similarity(matches, query);
        ranked.truncate(limit);
        ranked
    }

    async fn search_bay(&self, query: &str, limit: usize) -> Result<Vec<TitleEntry>> {
        let Some(provider) = &self.provider else {
            tracing::warn!("IGDB credentials not configured; bay search returns no results");
            return Ok(Vec::new());
        };
        let candidates = provider.search(query, limit).await?;
        Ok(candidates.iter().map(|c| c.to_entry()).collect())
    }
}
