//! Wine prefix path helper

use std::path::{Path, PathBuf};

/// Marker file written after the one-time prefix initialization succeeds.
pub const INIT_MARKER: &str = ".prefix-ready";

/// Helper for per-title prefix path layout.
pub struct PrefixHelper {
    root: PathBuf,
}

impl PrefixHelper {
    /// Create a new PrefixHelper for the given prefix root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The prefix root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the initialization marker.
    pub fn marker_path(&self) -> PathBuf {
        self.root.join(INIT_MARKER)
    }

    /// The prefix has completed its one-time initialization.
    pub fn is_initialized(&self) -> bool {
        self.marker_path().exists()
    }

    /// Get the drive_c path.
    pub fn drive_c(&self) -> PathBuf {
        self.root.join("drive_c")
    }

    /// Get the users directory.
    pub fn users_dir(&self) -> PathBuf {
        self.drive_c().join("users")
    }

    /// Home directory of a prefix user.
    pub fn user_home(&self, user: &str) -> PathBuf {
        self.users_dir().join(user)
    }

    /// My Documents path for a prefix user.
    pub fn my_documents(&self, user: &str) -> PathBuf {
        self.user_home(user).join("My Documents")
    }

    /// Conventional save location many titles write under.
    pub fn my_games(&self, user: &str) -> PathBuf {
        self.my_documents(user).join("My Games")
    }

    /// Check if the prefix looks like an initialized Wine tree.
    pub fn is_valid(&self) -> bool {
        self.drive_c().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_wine_layout() {
        let helper = PrefixHelper::new(PathBuf::from("/games/prefixes/MyGame"));
        assert_eq!(
            helper.my_games("alice"),
            PathBuf::from("/games/prefixes/MyGame/drive_c/users/alice/My Documents/My Games")
        );
        assert_eq!(
            helper.marker_path(),
            PathBuf::from("/games/prefixes/MyGame/.prefix-ready")
        );
    }

    #[test]
    fn fresh_prefix_is_uninitialized() {
        let dir = tempfile::TempDir::new().unwrap();
        let helper = PrefixHelper::new(dir.path().join("MyGame"));
        assert!(!helper.is_initialized());
        assert!(!helper.is_valid());
    }
}
