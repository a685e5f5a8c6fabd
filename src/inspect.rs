// src/inspect.rs
//! Package inspection
//!
//! Read-only summary of a package: configuration, receive instructions and
//! the content listing with archive sizes.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive::{has_recognized_manifest, load_manifest};
use crate::error::{Error, Result};
use crate::filesystem::FileSystem;
use crate::hash;
use crate::package::{ContentKind, ImportInstructions, Manifest};

/// One content entry as shown by inspection
#[derive(Debug, Clone, Serialize)]
pub struct InspectedEntry {
    pub entry_key: String,
    pub kind: ContentKind,
    pub ignore: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `None` when the entry is listed but not present in the archive
    pub size: Option<u64>,
    pub compressed_size: Option<u64>,
}

/// Inspected package data
#[derive(Debug, Clone, Serialize)]
pub struct InspectedPackage {
    pub path: PathBuf,
    pub name: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub version: u32,
    /// SHA-256 of the whole archive file, when inspected from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub instructions: ImportInstructions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_receive_action: Option<String>,
    pub entries: Vec<InspectedEntry>,
}

impl InspectedPackage {
    /// Load a package from an archive
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        if !fs.is_file(path) {
            return Err(Error::NotFound(path.display().to_string()));
        }
        if !has_recognized_manifest(fs, path) {
            return Err(Error::MissingManifest(path.to_path_buf()));
        }
        let manifest = load_manifest(fs, path, true)?;
        let mut pkg = Self::from_manifest(&manifest);
        pkg.sha256 = Some(hash::sha256_reader(&mut fs.open_read(path)?)?);
        Ok(pkg)
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        let entries = manifest
            .contents
            .iter()
            .map(|e| InspectedEntry {
                entry_key: e.entry_key.clone(),
                kind: e.kind(),
                ignore: e.ignore,
                uid: e.uid().map(str::to_string),
                name: e.parameter(crate::package::content::PARAM_NAME).map(str::to_string),
                size: e.size,
                compressed_size: e.compressed_size,
            })
            .collect();

        Self {
            path: manifest.path.clone(),
            name: manifest.name().unwrap_or_default().to_string(),
            uid: manifest.uid().unwrap_or_default().to_string(),
            remarks: manifest.remarks().map(str::to_string),
            version: manifest.version,
            sha256: None,
            instructions: manifest.import_instructions(),
            on_receive_action: manifest.on_receive_action().map(str::to_string),
            entries,
        }
    }

    pub fn count(&self, kind: ContentKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Total uncompressed size of the entries present in the archive
    pub fn total_size(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size).sum()
    }

    pub fn total_compressed_size(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.compressed_size).sum()
    }

    /// Entries listed in the manifest but absent from the archive
    pub fn missing(&self) -> impl Iterator<Item = &InspectedEntry> {
        self.entries.iter().filter(|e| e.size.is_none())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidManifest(format!("cannot render as JSON: {}", e)))
    }

    /// Multi-line summary, optionally listing every entry
    pub fn render(&self, show_entries: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Package: {} ({})", self.name, self.uid);
        let _ = writeln!(out, "Archive: {}", self.path.display());
        if let Some(digest) = &self.sha256 {
            let _ = writeln!(out, "SHA-256: {}", digest);
        }
        if let Some(remarks) = &self.remarks {
            let _ = writeln!(out, "Remarks: {}", remarks);
        }
        let _ = writeln!(out, "On receive: {}", self.instructions);
        if let Some(action) = &self.on_receive_action {
            let _ = writeln!(out, "Receive action: {}", action);
        }
        let _ = writeln!(
            out,
            "Contents: {} files, {} records",
            self.count(ContentKind::File),
            self.count(ContentKind::Record)
        );
        let _ = writeln!(
            out,
            "Size: {} bytes ({} compressed)",
            self.total_size(),
            self.total_compressed_size()
        );

        if show_entries {
            let _ = writeln!(out);
            for entry in &self.entries {
                let size = entry
                    .size
                    .map_or_else(|| "missing".to_string(), |s| format!("{} bytes", s));
                let marker = if entry.ignore { " [ignored]" } else { "" };
                let _ = writeln!(
                    out,
                    "  {:<6} {} ({}){}",
                    entry.kind.to_string(),
                    entry.entry_key,
                    size,
                    marker
                );
            }
        }
        out
    }
}

impl fmt::Display for InspectedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
