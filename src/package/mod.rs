// src/package/mod.rs
//! Package model
//!
//! In-memory representation of a mission package:
//! - `ParameterSet`: ordered unique-by-name string pairs
//! - `ContentEntry` / `ContentList`: the content listing
//! - `Manifest`: configuration plus contents, with the text codec

pub mod codec;
pub mod content;
pub mod manifest;
pub mod parameters;

pub use content::{ContentEntry, ContentKind, ContentList};
pub use manifest::{ImportInstructions, MANIFEST_VERSION, Manifest};
pub use parameters::{Parameter, ParameterSet};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to parse manifest XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to write manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest is missing required element: {0}")]
    MissingElement(String),

    #[error("Manifest text is not valid UTF-8: {0}")]
    Encoding(String),
}
