// src/app/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single poster lookup. `Clone` so every waiter on a shared
/// in-flight lookup gets the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no poster found: {0}")]
    NotFound(String),
    #[error("poster download failed: {0}")]
    Download(String),
    #[error("file system error at {}: {message}", path.display())]
    FileSystem { path: PathBuf, message: String },
    #[error("poster lookup was interrupted")]
    Interrupted,
}

impl ResolveError {
    pub(crate) fn fs(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Short label for inline error badges.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not found",
            Self::Download(_) => "download failed",
            Self::FileSystem { .. } => "write failed",
            Self::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("poster cache database: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("poster cache io: {0}")]
    Io(#[from] io::Error),
    #[error("poster cache title info: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),
    #[error("player command is empty")]
    EmptyCommand,
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}
