//! IGDB metadata provider integration

pub mod client;
pub mod images;

pub use client::IgdbClient;

use crate::catalog::{Category, TitleEntry};
use crate::metadata::Metadata;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A candidate returned by the remote metadata service. Image URLs are
/// already scheme-repaired and resolution-upgraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleCandidate {
    pub igdb_id: u64,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    pub first_release_date: Option<i64>,
    pub summary: Option<String>,
    /// Aggregate user rating; candidates without one are dropped from
    /// ad hoc search results.
    pub rating: Option<f64>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub screenshot_urls: Vec<String>,
    #[serde(default)]
    pub artwork_urls: Vec<String>,
    #[serde(default)]
    pub logo_urls: Vec<String>,
    pub steam_id: Option<String>,
}

impl TitleCandidate {
    /// Candidate as a Metadata record. Asset fields carry the provider's
    /// remote URLs; the resolver replaces them with local paths when it
    /// persists a record.
    pub fn to_metadata(&self) -> Metadata {
        Metadata {
            igdb_id: self.igdb_id,
            name: self.name.clone(),
            genres: self.genres.clone(),
            platforms: self.platforms.clone(),
            first_release_date: self.first_release_date,
            summary: self.summary.clone(),
            cover: self.cover_url.clone(),
            big: self.cover_url.clone(),
            screenshots: self.screenshot_urls.clone(),
            artworks: self.artwork_urls.clone(),
            logos: self.logo_urls.clone(),
            steam_id: self.steam_id.clone(),
        }
    }

    /// Candidate as a `bay` catalog entry for merged search results.
    pub fn to_entry(&self) -> TitleEntry {
        TitleEntry {
            id: format!("igdb-{}", self.igdb_id),
            name: self.name.clone(),
            appid: self.steam_id.clone(),
            exes: Vec::new(),
            path: PathBuf::new(),
            size_bytes: 0,
            category: Category::Bay,
            metadata: Some(self.to_metadata()),
        }
    }
}

/// Client abstraction over the remote search/lookup API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Best single match for a title name, or None when the service has
    /// no acceptable match.
    async fn lookup(&self, name: &str) -> Result<Option<TitleCandidate>>;

    /// Ad hoc search, ranked by name similarity to the query, rating-less
    /// candidates dropped, capped at `limit` (max 50).
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TitleCandidate>>;

    /// Direct lookup by the provider's own identifier.
    async fn by_external_id(&self, igdb_id: u64) -> Result<Option<TitleCandidate>>;
}
