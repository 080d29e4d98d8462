//! Per-title metadata records and the on-disk metadata store
//!
//! On-disk layout (stable contract), one directory per title under the
//! metadata root:
//!
//! ```text
//! metadata/<Title>/metadata.json
//! metadata/<Title>/cover.jpg
//! metadata/<Title>/big.jpg
//! metadata/<Title>/screenshots/1.jpg ...
//! metadata/<Title>/artworks/1.jpg ...
//! metadata/<Title>/logos/1.png ...
//! ```

pub mod resolver;

pub use resolver::MetadataResolver;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Enrichment record for a title. Asset paths are relative to the title's
/// metadata directory for library entries; remote search results carry
/// provider URLs in the same fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    /// Provider's identifier for the matched game
    pub igdb_id: u64,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Unix timestamp of the first release
    pub first_release_date: Option<i64>,
    pub summary: Option<String>,
    pub cover: Option<String>,
    pub big: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub artworks: Vec<String>,
    #[serde(default)]
    pub logos: Vec<String>,
    /// Steam app id extracted from the provider's linked sites
    pub steam_id: Option<String>,
}

/// What the store knows about a title.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreLookup {
    /// A positive record exists; treated as immutable.
    Hit(Metadata),
    /// A "no match" record exists and is still within its TTL.
    NegativeFresh,
    /// Nothing usable on disk; the provider should be consulted.
    Miss,
}

/// The persisted record wrapper. `matched: false` records cache a provider
/// miss so every scan does not re-query the network for unknown titles.
#[derive(Debug, Serialize, Deserialize)]
struct MetadataRecord {
    matched: bool,
    fetched_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

/// On-disk metadata cache, one directory per title name.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
    negative_ttl: Duration,
}

impl MetadataStore {
    pub fn new(root: PathBuf, negative_cache_days: i64) -> Self {
        Self {
            root,
            negative_ttl: Duration::days(negative_cache_days.max(0)),
        }
    }

    /// Directory holding a title's record and assets.
    pub fn title_dir(&self, title: &str) -> PathBuf {
        self.root.join(title)
    }

    /// Path of a title's JSON record.
    pub fn record_path(&self, title: &str) -> PathBuf {
        self.title_dir(title).join("metadata.json")
    }

    /// Load a title's record, classifying negative records by TTL.
    pub fn load(&self, title: &str) -> Result<StoreLookup> {
        let path = self.record_path(title);
        if !path.exists() {
            return Ok(StoreLookup::Miss);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read metadata record for '{title}'"))?;
        let record: MetadataRecord = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metadata record for '{title}'"))?;

        if record.matched {
            let metadata = record
                .metadata
                .with_context(|| format!("Matched record for '{title}' has no metadata body"))?;
            return Ok(StoreLookup::Hit(metadata));
        }

        // Stale negatives fall through to a fresh provider query.
        if self.negative_is_fresh(&record.fetched_at) {
            Ok(StoreLookup::NegativeFresh)
        } else {
            Ok(StoreLookup::Miss)
        }
    }

    fn negative_is_fresh(&self, fetched_at: &str) -> bool {
        match DateTime::parse_from_rfc3339(fetched_at) {
            Ok(ts) => Utc::now().signed_duration_since(ts) < self.negative_ttl,
            Err(_) => false,
        }
    }

    /// Persist a positive record. First writer wins: an existing record is
    /// never overwritten, and the temp-file + rename keeps readers from
    /// ever seeing a torn record.
    pub fn persist(&self, title: &str, metadata: &Metadata) -> Result<()> {
        self.write_record(
            title,
            &MetadataRecord {
                matched: true,
                fetched_at: Utc::now().to_rfc3339(),
                metadata: Some(metadata.clone()),
            },
        )
    }

    /// Persist a "no match" sentinel honored for the negative-cache TTL.
    pub fn persist_negative(&self, title: &str) -> Result<()> {
        self.write_record(
            title,
            &MetadataRecord {
                matched: false,
                fetched_at: Utc::now().to_rfc3339(),
                metadata: None,
            },
        )
    }

    fn write_record(&self, title: &str, record: &MetadataRecord) -> Result<()> {
        let dir = self.title_dir(title);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create metadata directory for '{title}'"))?;

        let final_path = self.record_path(title);
        if record.matched && final_path.exists() {
            // Positive records are immutable once written.
            if matches!(self.load(title)?, StoreLookup::Hit(_)) {
                return Ok(());
            }
        }

        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize metadata record")?;
        let tmp_path = dir.join(".metadata.json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write metadata record for '{title}'"))?;
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to commit metadata record for '{title}'"))?;
        Ok(())
    }

    /// Ensure the per-title asset subdirectories exist.
    pub fn ensure_asset_dirs(&self, title: &str) -> Result<PathBuf> {
        let dir = self.title_dir(title);
        for sub in ["screenshots", "artworks", "logos"] {
            std::fs::create_dir_all(dir.join(sub)).with_context(|| {
                format!("Failed to create {sub} directory for '{title}'")
            })?;
        }
        Ok(dir)
    }
}

/// Relative asset path shared by the resolver and record assembly.
pub fn asset_rel_path(kind: &str, index: usize, ext: &str) -> String {
    format!("{kind}/{index}.{ext}")
}
