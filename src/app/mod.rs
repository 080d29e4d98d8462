//! Application composition and public operations

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::apps::{DesktopAppIndex, PeerIndex};
use crate::catalog::search::{SearchCategory, SearchEngine, SearchResults};
use crate::catalog::{CatalogHandle, CatalogSnapshot, TitleEntry};
use crate::config::Config;
use crate::error::LaunchError;
use crate::igdb::{IgdbClient, MetadataProvider};
use crate::launch::{LaunchOrchestrator, LaunchReceipt};
use crate::metadata::{Metadata, MetadataResolver, MetadataStore};
use crate::scanner::LibraryScanner;

/// Main application struct that wires all components together.
pub struct App {
    /// Application configuration
    pub config: Config,

    catalog: Arc<CatalogHandle>,
    provider: Option<Arc<dyn MetadataProvider>>,
    scanner: LibraryScanner,
    search_engine: SearchEngine,
    orchestrator: LaunchOrchestrator,
}

impl App {
    /// Create a new App instance
    pub fn new(config: Config) -> Result<Self> {
        config.ensure_dirs().context("Failed to create directories")?;

        // Metadata enrichment is optional: without IGDB credentials the
        // library still scans and launches, just without metadata.
        let provider: Option<Arc<dyn MetadataProvider>> = match (
            config.igdb_client_id.as_deref(),
            config.igdb_client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                match IgdbClient::new(
                    id.to_string(),
                    secret.to_string(),
                    config.platform_id,
                    config.release_types.clone(),
                ) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        tracing::warn!("Failed to initialize IGDB client: {e:#}");
                        None
                    }
                }
            }
            _ => {
                tracing::info!("IGDB credentials not configured; metadata enrichment disabled");
                None
            }
        };

        let store = MetadataStore::new(config.paths.metadata_dir(), config.negative_cache_days);
        let resolver = Arc::new(MetadataResolver::new(store, provider.clone())?);

        let scanner = LibraryScanner::new(
            config.paths.data_dir(),
            resolver,
            config.max_concurrent_fetches,
        );

        let catalog = Arc::new(CatalogHandle::new());
        let search_engine = SearchEngine::new(
            catalog.clone(),
            provider.clone(),
            Arc::new(DesktopAppIndex::new()),
            Arc::new(PeerIndex),
        );

        let orchestrator = LaunchOrchestrator::new(
            config.paths.prefixes_dir(),
            config.paths.saves_dir(),
            config.runner_command.clone(),
            config.initializer_command.clone(),
        );

        Ok(Self {
            config,
            catalog,
            provider,
            scanner,
            search_engine,
            orchestrator,
        })
    }

    // ========== Operations ==========

    /// Full rescan: rebuild the catalog and swap it in atomically.
    pub async fn scan(&self) -> Result<Arc<CatalogSnapshot>> {
        let entries = self.scanner.scan().await?;
        let snapshot = self.catalog.replace(entries).await;
        tracing::info!(
            "Catalog generation {} holds {} titles",
            snapshot.generation,
            snapshot.len()
        );
        Ok(snapshot)
    }

    /// Current catalog snapshot, no side effects.
    pub async fn list_catalog(&self) -> Arc<CatalogSnapshot> {
        self.catalog.current().await
    }

    /// Search one or all categories; empty query returns the catalog.
    pub async fn search(
        &self,
        query: &str,
        category: SearchCategory,
        limit: usize,
    ) -> Result<SearchResults> {
        self.search_engine.search(query, category, limit).await
    }

    /// Metadata by the provider's external id: cached catalog entries are
    /// checked first, then the provider.
    pub async fn lookup_by_external_id(&self, igdb_id: u64) -> Result<Metadata> {
        let snapshot = self.catalog.current().await;
        if let Some(metadata) = snapshot
            .entries
            .iter()
            .filter_map(|e| e.metadata.as_ref())
            .find(|m| m.igdb_id == igdb_id)
        {
            return Ok(metadata.clone());
        }

        let Some(provider) = &self.provider else {
            return Err(LaunchError::ProviderUnavailable(
                "IGDB credentials not configured".to_string(),
            )
            .into());
        };

        match provider.by_external_id(igdb_id).await {
            Ok(Some(candidate)) => Ok(candidate.to_metadata()),
            Ok(None) => Err(LaunchError::MetadataNotFound(igdb_id).into()),
            Err(e) => Err(LaunchError::ProviderUnavailable(format!("{e:#}")).into()),
        }
    }

    /// Launch a title by id or exact name, optionally with an explicit
    /// launch target.
    pub async fn launch(&self, title: &str, exe: Option<&str>) -> Result<LaunchReceipt> {
        let snapshot = self.catalog.current().await;
        let entry = snapshot
            .find(title)
            .or_else(|| snapshot.find_by_name(title))
            .ok_or_else(|| LaunchError::TitleNotFound(title.to_string()))?;

        Ok(self.orchestrator.launch(entry, exe).await?)
    }

    /// Scan once per process unless a snapshot already exists.
    async fn ensure_scanned(&self) -> Result<Arc<CatalogSnapshot>> {
        let snapshot = self.catalog.current().await;
        if snapshot.generation > 0 {
            return Ok(snapshot);
        }
        self.scan().await
    }

    // ========== CLI commands ==========

    pub async fn cmd_scan(&self) -> Result<()> {
        let spinner = scan_spinner();
        let snapshot = self.scan().await?;
        spinner.finish_and_clear();

        println!("Cataloged {} titles:", snapshot.len());
        for entry in &snapshot.entries {
            print_entry_line(entry);
        }
        Ok(())
    }

    pub async fn cmd_list(&self) -> Result<()> {
        let snapshot = self.ensure_scanned().await?;
        if snapshot.is_empty() {
            println!("No titles cataloged under {}", self.config.paths.data_dir().display());
            return Ok(());
        }

        println!(
            "{} titles (generation {}, scanned {}):",
            snapshot.len(),
            snapshot.generation,
            snapshot.scanned_at
        );
        for entry in &snapshot.entries {
            print_entry_line(entry);
        }
        Ok(())
    }

    pub async fn cmd_search(&self, query: &str, category: &str, limit: usize) -> Result<()> {
        let category = SearchCategory::from_cli(category)?;
        self.ensure_scanned().await?;
        let results = self.search(query, category, limit).await?;

        for (label, entries) in [
            ("library", &results.library),
            ("bay", &results.bay),
            ("apps", &results.apps),
            ("peers", &results.peers),
        ] {
            if !entries.is_empty() {
                println!("[{label}] {} results", entries.len());
                for entry in entries {
                    println!("  {}", entry.display_name());
                }
            }
        }

        if results.combined.is_empty() {
            println!("No results for '{query}'");
        } else {
            println!("[combined] {} results", results.combined.len());
            for entry in &results.combined {
                println!("  {} ({})", entry.display_name(), entry.category.as_str());
            }
        }
        Ok(())
    }

    pub async fn cmd_info(&self, igdb_id: u64) -> Result<()> {
        self.ensure_scanned().await?;
        let metadata = self.lookup_by_external_id(igdb_id).await?;

        println!("{} (IGDB {})", metadata.name, metadata.igdb_id);
        if let Some(date) = metadata.first_release_date {
            if let Some(ts) = chrono::DateTime::from_timestamp(date, 0) {
                println!("  Released: {}", ts.format("%Y-%m-%d"));
            }
        }
        if !metadata.genres.is_empty() {
            println!("  Genres: {}", metadata.genres.join(", "));
        }
        if !metadata.platforms.is_empty() {
            println!("  Platforms: {}", metadata.platforms.join(", "));
        }
        if let Some(steam_id) = &metadata.steam_id {
            println!("  Steam app id: {steam_id}");
        }
        if let Some(summary) = &metadata.summary {
            println!("  {summary}");
        }
        Ok(())
    }

    pub async fn cmd_launch(&self, title: &str, exe: Option<&str>) -> Result<()> {
        self.ensure_scanned().await?;
        let receipt = self.launch(title, exe).await?;

        println!("Launched {} -> {}", receipt.title, receipt.exe);
        println!("  Prefix: {}", receipt.prefix_path.display());
        println!("  Saves:  {}", receipt.save_path.display());
        Ok(())
    }

    pub async fn cmd_status(&self) -> Result<()> {
        let paths = &self.config.paths;
        println!("Config file:  {}", paths.config_file().display());
        println!("Games root:   {}", paths.games_root().display());
        for (label, dir) in [
            ("data", paths.data_dir()),
            ("prefixes", paths.prefixes_dir()),
            ("saves", paths.saves_dir()),
            ("metadata", paths.metadata_dir()),
        ] {
            let state = if dir.exists() { "ok" } else { "missing" };
            println!("  {label:<9} {} [{state}]", dir.display());
        }

        println!(
            "IGDB credentials: {}",
            if self.config.has_credentials() {
                "configured"
            } else {
                "not configured"
            }
        );
        for (label, command) in [
            ("runner", &self.config.runner_command),
            ("initializer", &self.config.initializer_command),
        ] {
            match which::which(command) {
                Ok(path) => println!("{label}: {} ({})", command, path.display()),
                Err(_) => println!("{label}: {} (not found in PATH)", command),
            }
        }
        Ok(())
    }

    pub fn cmd_config_show(&self) -> Result<()> {
        let rendered =
            toml::to_string_pretty(&self.config).context("Failed to render configuration")?;
        print!("{rendered}");
        Ok(())
    }
}

fn scan_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid spinner template"),
    );
    spinner.set_message("Scanning library...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_entry_line(entry: &TitleEntry) {
    let enriched = if entry.metadata.is_some() { "*" } else { " " };
    println!(
        "  {enriched} {:<40} {:>10}  [{}]  {}",
        entry.name,
        format_size(entry.size_bytes),
        entry.exes.join(", "),
        entry.id
    );
}

fn format_size(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes / GIB)
    } else {
        format!("{:.1} MiB", bytes / MIB)
    }
}
