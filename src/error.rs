// src/error.rs

//! Crate-wide error type
//!
//! Archive-level failures surface through this type. Item-level problems
//! (a missing backing file, an unresolvable record) never do: they are
//! collected as warnings by the operation that hit them.

use std::path::PathBuf;
use thiserror::Error;

use crate::package::ManifestError;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Package has no manifest: {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("Package manifest is invalid: {0}")]
    InvalidManifest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to upgrade legacy package {}: {reason}", path.display())]
    UpgradeFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
