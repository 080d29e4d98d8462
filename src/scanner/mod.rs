//! Library scanner: install-directory discovery, sizing and enrichment

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

use crate::catalog::{title_id, Category, TitleEntry};
use crate::metadata::MetadataResolver;

/// Launch targets are Windows executables.
const LAUNCH_TARGET_EXT: &str = "exe";

/// Name of the optional storefront identifier file inside an install.
const APPID_FILE: &str = "steam_appid.txt";

/// Walks the install root and produces catalog entries. A subdirectory
/// qualifies only when it contains at least one launch target.
pub struct LibraryScanner {
    data_root: PathBuf,
    resolver: Arc<MetadataResolver>,
    max_concurrent: usize,
}

impl LibraryScanner {
    pub fn new(data_root: PathBuf, resolver: Arc<MetadataResolver>, max_concurrent: usize) -> Self {
        Self {
            data_root,
            resolver,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Scan the install root. Metadata resolution runs concurrently per
    /// title, bounded by the configured fetch limit; a single title's
    /// failure never aborts the rest of the scan.
    pub async fn scan(&self) -> Result<Vec<TitleEntry>> {
        let candidates = self.discover()?;
        tracing::info!(
            "Scanning {} install directories under {}",
            candidates.len(),
            self.data_root.display()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for dir in candidates {
            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(&self.resolver);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("scan semaphore closed");
                build_entry(&dir, &resolver).await
            }));
        }

        let mut entries = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => tracing::error!("Scan task failed: {e}"),
            }
        }

        // Deterministic snapshot order regardless of directory listing.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        let read_dir = std::fs::read_dir(&self.data_root).with_context(|| {
            format!("Failed to read install root {}", self.data_root.display())
        })?;

        let mut dirs = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if path.is_dir() && !hidden {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }
}

/// Build the catalog entry for one install directory, or None when it
/// does not qualify.
async fn build_entry(dir: &Path, resolver: &MetadataResolver) -> Option<TitleEntry> {
    let name = dir.file_name()?.to_string_lossy().to_string();

    let exes = list_launch_targets(dir);
    if exes.is_empty() {
        tracing::debug!("Skipping '{name}': no launch targets");
        return None;
    }

    let metadata = match resolver.resolve(&name).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!("Metadata resolution failed for '{name}': {e:#}");
            None
        }
    };

    Some(TitleEntry {
        id: title_id(dir),
        name,
        appid: read_appid(dir),
        exes,
        path: dir.to_path_buf(),
        size_bytes: install_size(dir),
        category: Category::Library,
        metadata,
    })
}

/// Executable files directly inside the install directory, sorted.
fn list_launch_targets(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut exes: Vec<String> = read_dir
        .flatten()
        .filter(|e| e.path().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(LAUNCH_TARGET_EXT))
        })
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    exes.sort();
    exes
}

fn read_appid(dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(dir.join(APPID_FILE)).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Total size of all files under the install directory, symlinks not
/// followed.
fn install_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::igdb::{MetadataProvider, MockMetadataProvider};
    use crate::metadata::MetadataStore;
    use tempfile::TempDir;

    fn resolver_without_provider(root: &Path) -> Arc<MetadataResolver> {
        Arc::new(
            MetadataResolver::new(MetadataStore::new(root.join("metadata"), 7), None).unwrap(),
        )
    }

    fn make_install(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join("data").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            std::fs::write(dir.join(file), content).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn scan_catalogs_qualifying_directories_only() {
        let root = TempDir::new().unwrap();
        make_install(
            root.path(),
            "MyGame",
            &[("MyGame.exe", "MZ"), ("steam_appid.txt", "12345\n")],
        );
        make_install(root.path(), "JustDocs", &[("readme.txt", "hello")]);
        std::fs::create_dir_all(root.path().join("data/.hidden")).unwrap();

        let scanner = LibraryScanner::new(
            root.path().join("data"),
            resolver_without_provider(root.path()),
            3,
        );
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "MyGame");
        assert_eq!(entry.appid.as_deref(), Some("12345"));
        assert_eq!(entry.exes, vec!["MyGame.exe"]);
        assert_eq!(entry.category, Category::Library);
        assert!(entry.size_bytes > 0);
        assert!(entry.metadata.is_none());
    }

    #[tokio::test]
    async fn rescan_of_unchanged_root_is_stable() {
        let root = TempDir::new().unwrap();
        make_install(root.path(), "Alpha", &[("alpha.exe", "MZ")]);
        make_install(root.path(), "Beta", &[("beta.exe", "MZ"), ("tool.exe", "MZ")]);

        let scanner = LibraryScanner::new(
            root.path().join("data"),
            resolver_without_provider(root.path()),
            3,
        );

        let first = scanner.scan().await.unwrap();
        let second = scanner.scan().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        // Entries are name-sorted and ids are content-stable across scans.
        assert_eq!(first[0].name, "Alpha");
        assert_eq!(first[1].name, "Beta");
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[1].id, second[1].id);
        assert!(first.iter().all(|e| e.category == Category::Library));
        // Multiple launch targets are listed sorted.
        assert_eq!(first[1].exes, vec!["beta.exe", "tool.exe"]);
    }

    #[tokio::test]
    async fn metadata_failure_does_not_abort_the_scan() {
        let root = TempDir::new().unwrap();
        make_install(root.path(), "MyGame", &[("MyGame.exe", "MZ")]);

        let mut provider = MockMetadataProvider::new();
        provider
            .expect_lookup()
            .returning(|_| Err(anyhow::anyhow!("provider down")));
        let resolver = Arc::new(
            MetadataResolver::new(
                MetadataStore::new(root.path().join("metadata"), 7),
                Some(Arc::new(provider) as Arc<dyn MetadataProvider>),
            )
            .unwrap(),
        );

        let scanner = LibraryScanner::new(root.path().join("data"), resolver, 3);
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].metadata.is_none());
    }

    #[test]
    fn install_size_sums_nested_files() {
        let root = TempDir::new().unwrap();
        let dir = make_install(root.path(), "Sized", &[("a.exe", "12345")]);
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("assets/data.pak"), "1234567890").unwrap();

        assert_eq!(install_size(&dir), 15);
    }
}
