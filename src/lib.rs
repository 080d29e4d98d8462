//! gamedock - A CLI game library manager and launcher for Windows games on Linux
//!
//! This crate catalogs locally installed titles, enriches them with IGDB
//! metadata cached on disk, and launches them inside per-title Wine
//! prefixes with dedicated save-data directories:
//! - Library scanner with content-stable title identifiers
//! - Metadata cache/fetch pipeline with at-most-once provider lookups
//! - Cross-category search with fuzzy ranking and duplicate suppression
//! - Launch orchestration with one-time prefix initialization

pub const APP_VERSION: &str = "0.2.1";

pub mod app;
pub mod apps;
pub mod catalog;
pub mod config;
pub mod error;
pub mod igdb;
pub mod launch;
pub mod metadata;
pub mod scanner;

pub use app::App;
pub use config::Config;
pub use error::LaunchError;
