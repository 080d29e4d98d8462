//! Configuration management for gamedock
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/gamedock/config.toml
//! - Games root: ~/Games (overridable)

mod paths;

pub use paths::Paths;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// IGDB platform id for PC (Microsoft Windows).
pub const PLATFORM_PC: u64 = 6;

/// IGDB game_type id for main games.
pub const RELEASE_TYPE_MAIN: u64 = 0;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Override for the games root directory (default ~/Games)
    pub games_root_override: Option<String>,

    /// IGDB (Twitch) OAuth client id
    pub igdb_client_id: Option<String>,

    /// IGDB (Twitch) OAuth client secret
    pub igdb_client_secret: Option<String>,

    /// Command used to launch game executables inside a prefix
    pub runner_command: String,

    /// Command used to initialize a fresh Wine prefix
    pub initializer_command: String,

    /// IGDB platform filter for provider queries
    pub platform_id: u64,

    /// IGDB release-type whitelist for provider queries
    pub release_types: Vec<u64>,

    /// Maximum concurrent metadata fetches during a scan
    pub max_concurrent_fetches: usize,

    /// Days a persisted "no metadata found" result stays authoritative
    pub negative_cache_days: i64,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            games_root_override: None,
            igdb_client_id: None,
            igdb_client_secret: None,
            runner_command: "umu-run".to_string(),
            initializer_command: "wineboot".to_string(),
            platform_id: PLATFORM_PC,
            release_types: vec![RELEASE_TYPE_MAIN],
            max_concurrent_fetches: 3,
            negative_cache_days: 7,
            paths: Paths::new(),
        }
    }
}

impl Config {
    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        let default_paths = Paths::new();
        let config_path = default_paths.config_file();

        let mut config: Config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            config.save().await?;
            config
        };

        config.paths = match config.games_root_override.as_deref().map(str::trim) {
            Some(root) if !root.is_empty() => Paths::with_games_root(PathBuf::from(root)),
            _ => default_paths,
        };
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Ensure the games root directory tree exists.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create application directories")?;
        Ok(())
    }

    /// Set and persist a new games root override.
    pub async fn set_games_root(&mut self, root: &str) -> Result<()> {
        let trimmed = root.trim();
        if trimmed.is_empty() {
            bail!("Games root path cannot be empty");
        }
        self.games_root_override = Some(trimmed.to_string());
        self.paths = Paths::with_games_root(PathBuf::from(trimmed));
        self.save().await?;
        Ok(())
    }

    /// Set and persist IGDB credentials.
    pub async fn set_credentials(&mut self, client_id: &str, client_secret: &str) -> Result<()> {
        let id = client_id.trim();
        let secret = client_secret.trim();
        if id.is_empty() || secret.is_empty() {
            bail!("IGDB client id and secret cannot be empty");
        }
        self.igdb_client_id = Some(id.to_string());
        self.igdb_client_secret = Some(secret.to_string());
        self.save().await?;
        Ok(())
    }

    /// Both IGDB credentials are present.
    pub fn has_credentials(&self) -> bool {
        self.igdb_client_id.as_deref().is_some_and(|s| !s.is_empty())
            && self
                .igdb_client_secret
                .as_deref()
                .is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_pc_main_games() {
        let config = Config::default();
        assert_eq!(config.platform_id, PLATFORM_PC);
        assert_eq!(config.release_types, vec![RELEASE_TYPE_MAIN]);
        assert_eq!(config.runner_command, "umu-run");
        assert!(!config.has_credentials());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.igdb_client_id = Some("abc".to_string());
        config.igdb_client_secret = Some("def".to_string());
        config.games_root_override = Some("/srv/games".to_string());

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert!(parsed.has_credentials());
        assert_eq!(parsed.games_root_override.as_deref(), Some("/srv/games"));
        assert_eq!(parsed.max_concurrent_fetches, 3);
    }
}
