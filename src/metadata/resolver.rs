//! Metadata resolution: cached record, or provider lookup-and-persist

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{asset_rel_path, Metadata, MetadataStore, StoreLookup};
use crate::igdb::images::with_size;
use crate::igdb::{MetadataProvider, TitleCandidate};

/// Download timeout per image asset.
const ASSET_TIMEOUT_SECS: u64 = 10;

/// Resolves a title name to metadata exactly once: a persisted record is
/// authoritative and never re-fetched; a miss queries the provider,
/// downloads assets and persists the record before returning.
pub struct MetadataResolver {
    store: MetadataStore,
    provider: Option<Arc<dyn MetadataProvider>>,
    http: reqwest::Client,
    /// Per-title locks guaranteeing at-most-once concurrent fetch.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MetadataResolver {
    pub fn new(store: MetadataStore, provider: Option<Arc<dyn MetadataProvider>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamedock/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(ASSET_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            store,
            provider,
            http,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Cached metadata for a title, fetching and persisting on first
    /// resolution. Returns `None` when the provider has no match (and
    /// caches that outcome) or when no provider is configured.
    pub async fn resolve(&self, title: &str) -> Result<Option<Metadata>> {
        match self.store.load(title)? {
            StoreLookup::Hit(metadata) => return Ok(Some(metadata)),
            StoreLookup::NegativeFresh => {
                tracing::debug!("Cached no-match for '{title}' is still fresh");
                return Ok(None);
            }
            StoreLookup::Miss => {}
        }

        let Some(provider) = self.provider.clone() else {
            tracing::debug!("No metadata provider configured, skipping fetch for '{title}'");
            return Ok(None);
        };

        let lock = self.lock_for(title).await;
        let _guard = lock.lock().await;

        // Another resolution may have won the race while we waited.
        match self.store.load(title)? {
            StoreLookup::Hit(metadata) => return Ok(Some(metadata)),
            StoreLookup::NegativeFresh => return Ok(None),
            StoreLookup::Miss => {}
        }

        let Some(candidate) = provider
            .lookup(title)
            .await
            .with_context(|| format!("Metadata lookup failed for '{title}'"))?
        else {
            tracing::info!("No metadata match for '{title}'");
            self.store.persist_negative(title)?;
            return Ok(None);
        };

        let metadata = self.fetch_assets(title, &candidate).await?;
        self.store.persist(title, &metadata)?;
        tracing::info!(
            "Saved metadata for '{title}' ({} screenshots, {} artworks, {} logos)",
            metadata.screenshots.len(),
            metadata.artworks.len(),
            metadata.logos.len()
        );
        Ok(Some(metadata))
    }

    async fn lock_for(&self, title: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(title.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Download the candidate's image assets into the title's metadata
    /// directory and assemble the record with local asset paths. Each
    /// asset failure is logged and skipped; partial sets are fine.
    async fn fetch_assets(&self, title: &str, candidate: &TitleCandidate) -> Result<Metadata> {
        let dir = self.store.ensure_asset_dirs(title)?;
        let mut metadata = candidate.to_metadata();

        metadata.cover = None;
        metadata.big = None;
        metadata.screenshots = Vec::new();
        metadata.artworks = Vec::new();
        metadata.logos = Vec::new();

        if let Some(cover_url) = &candidate.cover_url {
            metadata.cover = self
                .fetch_asset(title, &with_size(cover_url, "t_cover_big"), &dir, "cover.jpg")
                .await;
            metadata.big = self
                .fetch_asset(title, &with_size(cover_url, "t_720p"), &dir, "big.jpg")
                .await;
        }

        for (index, url) in candidate.screenshot_urls.iter().enumerate() {
            let rel = asset_rel_path("screenshots", index + 1, "jpg");
            if let Some(rel) = self
                .fetch_asset(title, &with_size(url, "t_screenshot_huge"), &dir, &rel)
                .await
            {
                metadata.screenshots.push(rel);
            }
        }

        for (index, url) in candidate.artwork_urls.iter().enumerate() {
            let rel = asset_rel_path("artworks", index + 1, "jpg");
            if let Some(rel) = self
                .fetch_asset(title, &with_size(url, "t_1080p"), &dir, &rel)
                .await
            {
                metadata.artworks.push(rel);
            }
        }

        for (index, url) in candidate.logo_urls.iter().enumerate() {
            let rel = asset_rel_path("logos", index + 1, "png");
            if let Some(rel) = self
                .fetch_asset(title, &with_size(url, "t_720p"), &dir, &rel)
                .await
            {
                metadata.logos.push(rel);
            }
        }

        Ok(metadata)
    }

    /// Download one asset; on success returns the relative path recorded
    /// in the metadata record, on failure logs and returns None.
    async fn fetch_asset(
        &self,
        title: &str,
        url: &str,
        dir: &Path,
        rel_path: &str,
    ) -> Option<String> {
        match self.download_file(url, &dir.join(rel_path)).await {
            Ok(()) => Some(rel_path.to_string()),
            Err(e) => {
                tracing::warn!("Failed to download {rel_path} for '{title}': {e:#}");
                None
            }
        }
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to start download")?;

        if !response.status().is_success() {
            bail!("Download failed with status: {}", response.status());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .context("Failed to create asset file")?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            file.write_all(&chunk)
                .await
                .context("Error writing asset file")?;
        }

        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::igdb::MockMetadataProvider;
    use tempfile::TempDir;

    fn candidate(name: &str) -> TitleCandidate {
        TitleCandidate {
            igdb_id: 620,
            name: name.to_string(),
            genres: vec!["Puzzle".to_string()],
            platforms: vec!["PC (Microsoft Windows)".to_string()],
            first_release_date: Some(1_303_171_200),
            summary: Some("Sequel.".to_string()),
            rating: Some(91.0),
            cover_url: None,
            screenshot_urls: vec![],
            artwork_urls: vec![],
            logo_urls: vec![],
            steam_id: Some("620".to_string()),
        }
    }

    fn resolver(dir: &TempDir, provider: MockMetadataProvider) -> MetadataResolver {
        MetadataResolver::new(
            MetadataStore::new(dir.path().to_path_buf(), 7),
            Some(Arc::new(provider)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn resolve_fetches_once_then_serves_from_disk() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        // The provider must be consulted exactly once for this title.
        provider
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(candidate("Portal 2"))));

        let resolver = resolver(&dir, provider);

        let first = resolver.resolve("Portal 2").await.unwrap().unwrap();
        let second = resolver.resolve("Portal 2").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Portal 2");
        assert_eq!(first.steam_id.as_deref(), Some("620"));
    }

    #[tokio::test]
    async fn provider_miss_is_cached_as_negative() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        provider.expect_lookup().times(1).returning(|_| Ok(None));

        let resolver = resolver(&dir, provider);

        assert!(resolver.resolve("Unknown Game").await.unwrap().is_none());
        // Second resolution hits the cached negative, not the mock (which
        // would panic on a second call).
        assert!(resolver.resolve("Unknown Game").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_resolutions_fetch_at_most_once() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(candidate("Portal 2"))));

        let resolver = Arc::new(resolver(&dir, provider));

        let a = {
            let r = resolver.clone();
            tokio::spawn(async move { r.resolve("Portal 2").await })
        };
        let b = {
            let r = resolver.clone();
            tokio::spawn(async move { r.resolve("Portal 2").await })
        };

        assert!(a.await.unwrap().unwrap().is_some());
        assert!(b.await.unwrap().unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_provider_resolves_to_none_without_persisting() {
        let dir = TempDir::new().unwrap();
        let resolver = MetadataResolver::new(
            MetadataStore::new(dir.path().to_path_buf(), 7),
            None,
        )
        .unwrap();

        assert!(resolver.resolve("Portal 2").await.unwrap().is_none());
        assert!(!resolver.store().record_path("Portal 2").exists());
    }

    #[tokio::test]
    async fn provider_error_propagates_without_persisting() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_lookup()
            .returning(|_| Err(anyhow::anyhow!("service down")));

        let resolver = resolver(&dir, provider);

        assert!(resolver.resolve("Portal 2").await.is_err());
        assert!(!resolver.store().record_path("Portal 2").exists());
    }
}
