//! Launch orchestration: prefix provisioning, save linking, process spawn
//!
//! Per-title state machine: NotProvisioned -> Provisioning -> Ready. The
//! Ready state is signaled by the prefix marker file; initialization runs
//! at most once per prefix root.

pub mod prefix;

pub use prefix::PrefixHelper;

use serde::Serialize;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::catalog::TitleEntry;
use crate::error::LaunchError;

/// Confirmation payload returned after a successful spawn. The child is
/// not supervised afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReceipt {
    pub title: String,
    pub exe: String,
    pub prefix_path: PathBuf,
    pub save_path: PathBuf,
}

/// Provisions per-title runtime environments and spawns launch targets.
pub struct LaunchOrchestrator {
    prefixes_root: PathBuf,
    saves_root: PathBuf,
    runner_command: String,
    initializer_command: String,
    prefix_user: String,
}

impl LaunchOrchestrator {
    pub fn new(
        prefixes_root: PathBuf,
        saves_root: PathBuf,
        runner_command: String,
        initializer_command: String,
    ) -> Self {
        let prefix_user = std::env::var("USER").unwrap_or_else(|_| "wine".to_string());
        Self {
            prefixes_root,
            saves_root,
            runner_command,
            initializer_command,
            prefix_user,
        }
    }

    /// Override the prefix user looked up for save-directory linking.
    pub fn with_prefix_user(mut self, user: &str) -> Self {
        self.prefix_user = user.to_string();
        self
    }

    /// Launch a catalog entry: validate the target, provision the prefix
    /// and save directory, then spawn the runner detached.
    pub async fn launch(
        &self,
        entry: &TitleEntry,
        requested_exe: Option<&str>,
    ) -> Result<LaunchReceipt, LaunchError> {
        let exe = self.select_exe(entry, requested_exe)?;
        let helper = PrefixHelper::new(self.prefixes_root.join(&entry.name));

        if !helper.is_initialized() {
            self.initialize_prefix(entry, &helper).await?;
        }

        let save_dir = self.saves_root.join(&entry.name);
        std::fs::create_dir_all(&save_dir).map_err(|e| LaunchError::EnvironmentInitFailed {
            title: entry.name.clone(),
            reason: format!("failed to create save directory: {e}"),
        })?;

        self.link_save_dir(&helper, &save_dir);
        self.spawn(entry, &exe, &helper, &save_dir)?;

        Ok(LaunchReceipt {
            title: entry.name.clone(),
            exe,
            prefix_path: helper.root().to_path_buf(),
            save_path: save_dir,
        })
    }

    fn select_exe(
        &self,
        entry: &TitleEntry,
        requested: Option<&str>,
    ) -> Result<String, LaunchError> {
        if entry.exes.is_empty() {
            return Err(LaunchError::NoLaunchTargets(entry.name.clone()));
        }
        match requested {
            Some(exe) if entry.exes.iter().any(|e| e == exe) => Ok(exe.to_string()),
            Some(exe) => Err(LaunchError::InvalidLaunchTarget {
                title: entry.name.clone(),
                exe: exe.to_string(),
            }),
            None => Ok(entry.exes[0].clone()),
        }
    }

    /// One-time prefix initialization. On failure the prefix directory is
    /// left in place for inspection; the marker is only written after the
    /// initializer succeeds, so the next launch retries.
    async fn initialize_prefix(
        &self,
        entry: &TitleEntry,
        helper: &PrefixHelper,
    ) -> Result<(), LaunchError> {
        let env_init_failed = |reason: String| LaunchError::EnvironmentInitFailed {
            title: entry.name.clone(),
            reason,
        };

        std::fs::create_dir_all(helper.root())
            .map_err(|e| env_init_failed(format!("failed to create prefix root: {e}")))?;

        tracing::info!(
            "Initializing prefix for '{}' at {}",
            entry.name,
            helper.root().display()
        );

        let status = tokio::process::Command::new(&self.initializer_command)
            .arg("-i")
            .current_dir(&entry.path)
            .env("WINEPREFIX", helper.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                env_init_failed(format!("failed to run '{}': {e}", self.initializer_command))
            })?;

        if !status.success() {
            return Err(env_init_failed(format!(
                "'{}' exited with {status}",
                self.initializer_command
            )));
        }

        std::fs::write(helper.marker_path(), b"")
            .map_err(|e| env_init_failed(format!("failed to write prefix marker: {e}")))?;
        Ok(())
    }

    /// Best-effort: alias the prefix's conventional save location into
    /// the title's save directory. Never affects the launch result.
    fn link_save_dir(&self, helper: &PrefixHelper, save_dir: &Path) {
        let source = helper.my_games(&self.prefix_user);
        let link = save_dir.join("My Games");

        if !source.exists() {
            return;
        }
        // symlink_metadata also catches existing broken links.
        if std::fs::symlink_metadata(&link).is_ok() {
            return;
        }
        if let Err(e) = symlink(&source, &link) {
            tracing::warn!("Failed to link save directory {}: {e}", link.display());
        }
    }

    fn spawn(
        &self,
        entry: &TitleEntry,
        exe: &str,
        helper: &PrefixHelper,
        save_dir: &Path,
    ) -> Result<(), LaunchError> {
        let mut command = tokio::process::Command::new(&self.runner_command);
        command
            .arg(exe)
            .current_dir(&entry.path)
            .env("WINEPREFIX", helper.root())
            .env("GAME_SAVE_DIR", save_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => {
                // Fire and forget: the handle is dropped, the child keeps
                // running and is never supervised.
                drop(child);
                tracing::info!("Launched '{}' -> {exe}", entry.name);
                Ok(())
            }
            Err(e) => Err(LaunchError::SpawnFailed {
                exe: exe.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{title_id, Category};
    use tempfile::TempDir;

    fn entry(root: &Path, name: &str, exes: &[&str]) -> TitleEntry {
        let path = root.join("data").join(name);
        std::fs::create_dir_all(&path).unwrap();
        for exe in exes {
            std::fs::write(path.join(exe), "MZ").unwrap();
        }
        TitleEntry {
            id: title_id(&path),
            name: name.to_string(),
            appid: None,
            exes: exes.iter().map(|s| s.to_string()).collect(),
            path,
            size_bytes: 0,
            category: Category::Library,
            metadata: None,
        }
    }

    fn orchestrator(root: &Path, runner: &str, initializer: &str) -> LaunchOrchestrator {
        LaunchOrchestrator::new(
            root.join("prefixes"),
            root.join("saves"),
            runner.to_string(),
            initializer.to_string(),
        )
        .with_prefix_user("tester")
    }

    #[tokio::test]
    async fn launch_provisions_prefix_and_save_dir() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);
        let orch = orchestrator(root.path(), "true", "true");

        let receipt = orch.launch(&entry, Some("MyGame.exe")).await.unwrap();

        assert_eq!(receipt.exe, "MyGame.exe");
        assert!(receipt.prefix_path.ends_with("MyGame"));
        assert!(receipt.save_path.ends_with("MyGame"));
        assert!(receipt.save_path.exists());
        assert!(root.path().join("prefixes/MyGame/.prefix-ready").exists());
    }

    #[tokio::test]
    async fn unknown_target_is_rejected_before_any_provisioning() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);
        let orch = orchestrator(root.path(), "true", "true");

        let err = orch.launch(&entry, Some("Other.exe")).await.unwrap_err();

        assert!(matches!(err, LaunchError::InvalidLaunchTarget { .. }));
        assert!(!root.path().join("prefixes/MyGame").exists());
    }

    #[tokio::test]
    async fn empty_candidate_set_is_rejected() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "Broken", &[]);
        let orch = orchestrator(root.path(), "true", "true");

        let err = orch.launch(&entry, None).await.unwrap_err();
        assert!(matches!(err, LaunchError::NoLaunchTargets(_)));
    }

    #[tokio::test]
    async fn initialization_runs_at_most_once() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);

        orchestrator(root.path(), "true", "true")
            .launch(&entry, None)
            .await
            .unwrap();

        // A failing initializer proves the second launch skips the init
        // step entirely: the marker short-circuits it.
        orchestrator(root.path(), "true", "false")
            .launch(&entry, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_initialization_leaves_prefix_for_retry() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);

        let err = orchestrator(root.path(), "true", "false")
            .launch(&entry, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::EnvironmentInitFailed { .. }));

        let prefix = root.path().join("prefixes/MyGame");
        assert!(prefix.exists());
        assert!(!prefix.join(".prefix-ready").exists());

        // Retry with a working initializer succeeds.
        orchestrator(root.path(), "true", "true")
            .launch(&entry, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_is_surfaced() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);
        let orch = orchestrator(root.path(), "/nonexistent/runner", "true");

        let err = orch.launch(&entry, None).await.unwrap_err();
        assert!(matches!(err, LaunchError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn save_link_is_created_when_source_exists() {
        let root = TempDir::new().unwrap();
        let entry = entry(root.path(), "MyGame", &["MyGame.exe"]);
        let orch = orchestrator(root.path(), "true", "true");

        // Simulate a prefix whose user already has a My Games folder.
        let my_games = root
            .path()
            .join("prefixes/MyGame/drive_c/users/tester/My Documents/My Games");
        std::fs::create_dir_all(&my_games).unwrap();
        // Marker present: init step skipped, link step still runs.
        std::fs::write(root.path().join("prefixes/MyGame/.prefix-ready"), b"").unwrap();

        let receipt = orch.launch(&entry, None).await.unwrap();

        let link = receipt.save_path.join("My Games");
        let link_meta = std::fs::symlink_metadata(&link).unwrap();
        assert!(link_meta.file_type().is_symlink());

        // Second launch is idempotent: the existing link is left alone.
        orch.launch(&entry, None).await.unwrap();
    }
}
