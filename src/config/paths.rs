//! XDG-compliant path management plus the games root layout

use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};

/// Manages application paths (XDG) and the games root directory tree.
///
/// The games root defaults to `~/Games` and contains:
/// - `data/` — one subdirectory per installed title
/// - `prefixes/` — one Wine prefix per launched title
/// - `saves/` — one save-data directory per launched title
/// - `metadata/` — one cached metadata record per resolved title
#[derive(Debug, Clone)]
pub struct Paths {
    dirs: ProjectDirs,
    games_root: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a Paths instance with the default games root.
    pub fn new() -> Self {
        let home = BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::with_games_root(home.join("Games"))
    }

    /// Create a Paths instance rooted at an explicit games directory.
    pub fn with_games_root(games_root: PathBuf) -> Self {
        let dirs = ProjectDirs::from("", "", "gamedock")
            .expect("Failed to determine project directories");
        Self { dirs, games_root }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/gamedock/
    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    /// Main config file: ~/.config/gamedock/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Games Root Paths ==========

    /// Games root directory (default ~/Games).
    pub fn games_root(&self) -> &Path {
        &self.games_root
    }

    /// Install root: one subdirectory per installed title.
    pub fn data_dir(&self) -> PathBuf {
        self.games_root.join("data")
    }

    /// Wine prefixes root.
    pub fn prefixes_dir(&self) -> PathBuf {
        self.games_root.join("prefixes")
    }

    /// Save-data root.
    pub fn saves_dir(&self) -> PathBuf {
        self.games_root.join("saves")
    }

    /// Metadata cache root.
    pub fn metadata_dir(&self) -> PathBuf {
        self.games_root.join("metadata")
    }

    /// Prefix directory for a specific title.
    pub fn title_prefix_dir(&self, title: &str) -> PathBuf {
        self.prefixes_dir().join(title)
    }

    /// Save directory for a specific title.
    pub fn title_save_dir(&self, title: &str) -> PathBuf {
        self.saves_dir().join(title)
    }

    /// Metadata directory for a specific title.
    pub fn title_metadata_dir(&self, title: &str) -> PathBuf {
        self.metadata_dir().join(title)
    }

    // ========== Utility Methods ==========

    /// Ensure the games root directory tree exists. The config directory
    /// is created lazily when the config file is first saved.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.prefixes_dir())?;
        std::fs::create_dir_all(self.saves_dir())?;
        std::fs::create_dir_all(self.metadata_dir())?;
        Ok(())
    }
}
