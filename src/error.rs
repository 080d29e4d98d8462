//! Error taxonomy for catalog and launch operations
//!
//! Per-asset download failures during metadata resolution are deliberately
//! absent: they are logged and skipped at the resolver, never surfaced.

use thiserror::Error;

/// Failures surfaced by catalog lookups, provider calls and the launch
/// state machine. Callers match on these; everything else travels as
/// `anyhow::Error` context.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no title '{0}' in the catalog (run 'gamedock scan' first?)")]
    TitleNotFound(String),

    #[error("no metadata found for external id {0}")]
    MetadataNotFound(u64),

    #[error("'{exe}' is not a launch target of '{title}'")]
    InvalidLaunchTarget { title: String, exe: String },

    #[error("title '{0}' has no launch targets")]
    NoLaunchTargets(String),

    #[error("metadata provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("prefix initialization failed for '{title}': {reason}")]
    EnvironmentInitFailed { title: String, reason: String },

    #[error("failed to spawn '{exe}': {reason}")]
    SpawnFailed { exe: String, reason: String },
}
