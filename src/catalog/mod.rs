//! In-memory title catalog: entries, snapshots and the shared handle

pub mod search;

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Origin bucket of a catalog or search entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Locally installed library title
    Library,
    /// Remote provider catalog result
    Bay,
    /// Installed desktop application
    Apps,
    /// Peer-shared title (stub collaborator)
    Peers,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Library => "library",
            Category::Bay => "bay",
            Category::Apps => "apps",
            Category::Peers => "peers",
        }
    }
}

/// One discovered installation (or provider/app search hit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleEntry {
    /// Stable identifier: FNV-1a over the normalized install path
    pub id: String,

    /// Display name, derived from the install directory name
    pub name: String,

    /// Optional storefront identifier (steam_appid.txt)
    pub appid: Option<String>,

    /// Candidate launch targets; empty entries are not catalog-eligible
    pub exes: Vec<String>,

    /// Absolute install path
    pub path: PathBuf,

    /// Installed size in bytes
    pub size_bytes: u64,

    /// Origin bucket
    pub category: Category,

    /// Cached metadata, if resolution succeeded
    pub metadata: Option<Metadata>,
}

impl TitleEntry {
    /// Best display name: cached metadata name when present, else the
    /// install directory name.
    pub fn display_name(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or(self.name.as_str())
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Content-stable title identifier: FNV-1a over the normalized install
/// path, hex-encoded. Survives rescans and is independent of directory
/// listing order.
pub fn title_id(install_path: &Path) -> String {
    let normalized = install_path.to_string_lossy();
    let normalized = normalized.trim_end_matches('/');

    let mut hash = FNV_OFFSET;
    for byte in normalized.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

/// An immutable view of the catalog at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    /// Monotonic snapshot counter, bumped on every rescan
    pub generation: u64,

    /// RFC3339 timestamp of the scan that produced this snapshot
    pub scanned_at: String,

    /// Cataloged titles, sorted by name
    pub entries: Vec<TitleEntry>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            scanned_at: chrono::Utc::now().to_rfc3339(),
            entries: Vec::new(),
        }
    }

    /// Find an entry by its stable id.
    pub fn find(&self, id: &str) -> Option<&TitleEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Find an entry by exact (case-insensitive) name.
    pub fn find_by_name(&self, name: &str) -> Option<&TitleEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared catalog handle. Readers clone the current `Arc` and keep a
/// consistent snapshot for as long as they hold it; rescans swap the Arc
/// wholesale, never mutating a published snapshot.
pub struct CatalogHandle {
    inner: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogHandle {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(CatalogSnapshot::empty())),
        }
    }

    /// Current snapshot reference. Never blocks on an in-progress rescan
    /// longer than the swap itself.
    pub async fn current(&self) -> Arc<CatalogSnapshot> {
        self.inner.read().await.clone()
    }

    /// Replace the catalog with a freshly scanned entry set.
    pub async fn replace(&self, entries: Vec<TitleEntry>) -> Arc<CatalogSnapshot> {
        let mut guard = self.inner.write().await;
        let snapshot = Arc::new(CatalogSnapshot {
            generation: guard.generation + 1,
            scanned_at: chrono::Utc::now().to_rfc3339(),
            entries,
        });
        *guard = snapshot.clone();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> TitleEntry {
        let path = PathBuf::from(format!("/games/data/{name}"));
        TitleEntry {
            id: title_id(&path),
            name: name.to_string(),
            appid: None,
            exes: vec![format!("{name}.exe")],
            path,
            size_bytes: 0,
            category: Category::Library,
            metadata: None,
        }
    }

    #[test]
    fn title_id_is_stable_and_trailing_slash_insensitive() {
        let a = title_id(Path::new("/games/data/Portal 2"));
        let b = title_id(Path::new("/games/data/Portal 2/"));
        let c = title_id(Path::new("/games/data/Portal 2"));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn title_id_differs_per_path() {
        assert_ne!(
            title_id(Path::new("/games/data/Portal 2")),
            title_id(Path::new("/games/data/Portal"))
        );
    }

    #[tokio::test]
    async fn replace_swaps_snapshot_without_touching_old_readers() {
        let handle = CatalogHandle::new();
        let before = handle.current().await;
        assert_eq!(before.generation, 0);
        assert!(before.is_empty());

        let after = handle.replace(vec![entry("Portal 2")]).await;
        assert_eq!(after.generation, 1);
        assert_eq!(after.len(), 1);

        // The snapshot taken before the swap is untouched.
        assert!(before.is_empty());
        assert_eq!(handle.current().await.len(), 1);
    }

    #[tokio::test]
    async fn find_matches_by_id_and_name() {
        let handle = CatalogHandle::new();
        let snapshot = handle.replace(vec![entry("Portal 2")]).await;

        let by_name = snapshot.find_by_name("portal 2").unwrap();
        assert_eq!(by_name.name, "Portal 2");
        assert!(snapshot.find(&by_name.id).is_some());
        assert!(snapshot.find("ffffffffffffffff").is_none());
    }
}
