//! Installed-application index (desktop entries) and the peers stub

use crate::catalog::{title_id, Category, TitleEntry};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// A searchable index of titles outside the installed library. The
/// `apps` and `peers` search categories are served through this seam.
#[async_trait]
pub trait TitleIndex: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TitleEntry>>;
}

/// Installed-application index backed by freedesktop `.desktop` entries.
pub struct DesktopAppIndex {
    app_dirs: Vec<PathBuf>,
}

impl DesktopAppIndex {
    /// Index over the conventional XDG application directories.
    pub fn new() -> Self {
        let mut app_dirs = vec![
            PathBuf::from("/usr/share/applications"),
            PathBuf::from("/usr/local/share/applications"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            app_dirs.push(PathBuf::from(home).join(".local/share/applications"));
        }
        Self { app_dirs }
    }

    /// Index over explicit directories (tests, non-standard setups).
    pub fn with_dirs(app_dirs: Vec<PathBuf>) -> Self {
        Self { app_dirs }
    }

    fn collect_entries(&self) -> Vec<TitleEntry> {
        let mut entries = Vec::new();
        for dir in &self.app_dirs {
            let Ok(read_dir) = std::fs::read_dir(dir) else {
                continue;
            };
            for file in read_dir.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                match parse_desktop_entry(&path) {
                    Some(entry) => entries.push(entry),
                    None => tracing::trace!("Skipping desktop entry {}", path.display()),
                }
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

impl Default for DesktopAppIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TitleIndex for DesktopAppIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TitleEntry>> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<TitleEntry> = self
            .collect_entries()
            .into_iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect();
        matches.truncate(limit);
        Ok(matches)
    }
}

/// Minimal `[Desktop Entry]` reader: display name and executable, hidden
/// entries skipped.
fn parse_desktop_entry(path: &std::path::Path) -> Option<TitleEntry> {
    let content = std::fs::read_to_string(path).ok()?;

    let mut in_entry_group = false;
    let mut name = None;
    let mut exec = None;
    let mut no_display = false;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_entry_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry_group {
            continue;
        }
        if let Some(value) = line.strip_prefix("Name=") {
            name.get_or_insert_with(|| value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Exec=") {
            // First token only; field codes like %U are launcher noise.
            exec.get_or_insert_with(|| {
                value.split_whitespace().next().unwrap_or("").to_string()
            });
        } else if line == "NoDisplay=true" {
            no_display = true;
        }
    }

    if no_display {
        return None;
    }
    let name = name.filter(|n| !n.is_empty())?;

    Some(TitleEntry {
        id: title_id(path),
        name,
        appid: None,
        exes: exec.filter(|e| !e.is_empty()).into_iter().collect(),
        path: path.parent().map(PathBuf::from).unwrap_or_default(),
        size_bytes: 0,
        category: Category::Apps,
        metadata: None,
    })
}

/// Peer-shared titles are a planned collaborator; the index is a stub
/// that never returns results.
pub struct PeerIndex;

#[async_trait]
impl TitleIndex for PeerIndex {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<TitleEntry>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_desktop(dir: &std::path::Path, file: &str, body: &str) {
        std::fs::write(dir.join(file), body).unwrap();
    }

    #[tokio::test]
    async fn desktop_entries_are_indexed_and_matched() {
        let dir = TempDir::new().unwrap();
        write_desktop(
            dir.path(),
            "firefox.desktop",
            "[Desktop Entry]\nName=Firefox\nExec=firefox %u\n",
        );
        write_desktop(
            dir.path(),
            "hidden.desktop",
            "[Desktop Entry]\nName=Hidden Tool\nNoDisplay=true\n",
        );
        write_desktop(dir.path(), "notes.txt", "Name=Not a desktop file\n");

        let index = DesktopAppIndex::with_dirs(vec![dir.path().to_path_buf()]);
        let hits = index.search("fire", 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Firefox");
        assert_eq!(hits[0].exes, vec!["firefox"]);
        assert_eq!(hits[0].category, Category::Apps);

        assert!(index.search("hidden", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directories_yield_no_results() {
        let index = DesktopAppIndex::with_dirs(vec![PathBuf::from("/nonexistent/apps")]);
        assert!(index.search("anything", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn peer_index_is_empty() {
        assert!(PeerIndex.search("portal", 10).await.unwrap().is_empty());
    }
}
