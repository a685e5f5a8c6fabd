// src/package/manifest.rs

//! Package manifest
//!
//! The manifest describes a package's configuration (name, uid, remarks,
//! receive-side instructions) and its content listing. It is a plain value:
//! the builder works from a [`Manifest::snapshot`] so the caller can keep
//! editing its own copy while a build runs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec;
use super::content::{ContentEntry, ContentKind, ContentList, FILE_SIZE_ESTIMATE};
use super::parameters::{Parameter, ParameterSet};
use super::ManifestError;
use crate::filesystem::FileSystem;
use crate::record;
use crate::resolver::ContentResolver;

/// The only manifest version this engine writes and natively reads
pub const MANIFEST_VERSION: u32 = 2;

pub const PARAM_NAME: &str = "name";
pub const PARAM_UID: &str = "uid";
pub const PARAM_REMARKS: &str = "remarks";
pub const PARAM_ON_RECEIVE_DELETE: &str = "onReceiveDelete";
pub const PARAM_ON_RECEIVE_IMPORT: &str = "onReceiveImport";
/// Free-form action identifier announced after receive-side processing
pub const PARAM_ON_RECEIVE_ACTION: &str = "onReceiveAction";

/// What a receiving device should do with a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportInstructions {
    ImportDelete,
    ImportNoDelete,
    NoImportDelete,
    NoImportNoDelete,
}

impl ImportInstructions {
    pub fn from_flags(import: bool, delete: bool) -> Self {
        match (import, delete) {
            (true, true) => Self::ImportDelete,
            (true, false) => Self::ImportNoDelete,
            (false, true) => Self::NoImportDelete,
            (false, false) => Self::NoImportNoDelete,
        }
    }

    pub fn should_import(self) -> bool {
        matches!(self, Self::ImportDelete | Self::ImportNoDelete)
    }

    pub fn should_delete(self) -> bool {
        matches!(self, Self::ImportDelete | Self::NoImportDelete)
    }
}

impl fmt::Display for ImportInstructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ImportDelete => "import-delete",
            Self::ImportNoDelete => "import-no-delete",
            Self::NoImportDelete => "no-import-delete",
            Self::NoImportNoDelete => "no-import-no-delete",
        };
        write!(f, "{}", s)
    }
}

/// A package manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub configuration: ParameterSet,
    pub contents: ContentList,
    /// Local archive location; never serialized
    pub path: PathBuf,
}

impl Manifest {
    /// Create an empty manifest for a new package
    pub fn new(name: &str, uid: &str) -> Self {
        let mut configuration = ParameterSet::new();
        configuration.set(PARAM_UID, uid);
        configuration.set(PARAM_NAME, name);
        Self {
            version: MANIFEST_VERSION,
            configuration,
            contents: ContentList::new(),
            path: PathBuf::new(),
        }
    }

    /// Create a manifest with a freshly generated uid
    pub fn with_random_uid(name: &str) -> Self {
        Self::new(name, &uuid::Uuid::new_v4().to_string())
    }

    /// Set the local archive path
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Deep copy decoupled from the caller's manifest
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// A manifest needs a name and a uid
    pub fn is_valid(&self) -> bool {
        self.name().is_some_and(|n| !n.is_empty())
            && self.uid().is_some_and(|u| !u.is_empty())
            && self.configuration.is_valid()
    }

    pub fn name(&self) -> Option<&str> {
        self.configuration.get(PARAM_NAME)
    }

    pub fn uid(&self) -> Option<&str> {
        self.configuration.get(PARAM_UID)
    }

    pub fn remarks(&self) -> Option<&str> {
        self.configuration.get(PARAM_REMARKS)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.configuration.get(name)
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<String>) -> bool {
        self.configuration.set(name, value)
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Parameter> {
        self.configuration.remove(name)
    }

    /// Receive-side instructions; import defaults to true, delete to false
    pub fn import_instructions(&self) -> ImportInstructions {
        ImportInstructions::from_flags(
            self.configuration
                .get_bool(PARAM_ON_RECEIVE_IMPORT)
                .unwrap_or(true),
            self.configuration
                .get_bool(PARAM_ON_RECEIVE_DELETE)
                .unwrap_or(false),
        )
    }

    pub fn set_import_instructions(&mut self, instructions: ImportInstructions) {
        self.configuration
            .set_bool(PARAM_ON_RECEIVE_IMPORT, instructions.should_import());
        self.configuration
            .set_bool(PARAM_ON_RECEIVE_DELETE, instructions.should_delete());
    }

    pub fn on_receive_action(&self) -> Option<&str> {
        self.configuration.get(PARAM_ON_RECEIVE_ACTION)
    }

    /// Add (or replace by key) a content entry
    pub fn add_content(&mut self, entry: ContentEntry) -> bool {
        self.contents.add(entry)
    }

    pub fn remove_content(&mut self, entry_key: &str) -> Option<ContentEntry> {
        self.contents.remove(entry_key)
    }

    pub fn has_content(&self, entry_key: &str) -> bool {
        self.contents.contains(entry_key)
    }

    pub fn content(&self, entry_key: &str) -> Option<&ContentEntry> {
        self.contents.get(entry_key)
    }

    /// Non-ignored entries of one kind
    pub fn contents_of(&self, kind: ContentKind) -> Vec<&ContentEntry> {
        self.contents.of_kind(kind).collect()
    }

    /// Add a local file; returns its entry key
    pub fn add_file(&mut self, local_path: &Path) -> Option<String> {
        let entry = ContentEntry::for_file(local_path);
        let key = entry.entry_key.clone();
        self.add_content(entry).then_some(key)
    }

    /// Add a record reference; returns its entry key
    pub fn add_record(&mut self, uid: &str, name: Option<&str>) -> Option<String> {
        let entry = ContentEntry::for_record(uid, name);
        let key = entry.entry_key.clone();
        self.add_content(entry).then_some(key)
    }

    /// Whether the manifest lists no content
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Estimated size of one entry.
    ///
    /// Files use their on-disk size when the local file exists, then the
    /// archive size, then a fixed estimate. Records use the archive size when
    /// known, else a baseline plus a per-point charge from the resolver.
    pub fn estimated_entry_size(
        entry: &ContentEntry,
        fs: &dyn FileSystem,
        resolver: Option<&dyn ContentResolver>,
    ) -> u64 {
        match entry.kind() {
            ContentKind::File => entry
                .local_path()
                .filter(|p| fs.is_file(p))
                .and_then(|p| fs.len(&p).ok())
                .or(entry.size)
                .unwrap_or(FILE_SIZE_ESTIMATE),
            ContentKind::Record => {
                if let Some(size) = entry.size {
                    return size;
                }
                let points = entry
                    .uid()
                    .zip(resolver)
                    .and_then(|(uid, r)| r.point_count(uid))
                    .unwrap_or(0);
                record::estimated_size(points)
            }
        }
    }

    /// Estimated total size of all content (ignored entries included, since
    /// they are still packaged)
    pub fn total_estimated_size(
        &self,
        fs: &dyn FileSystem,
        resolver: Option<&dyn ContentResolver>,
    ) -> u64 {
        self.contents
            .iter()
            .map(|e| Self::estimated_entry_size(e, fs, resolver))
            .sum()
    }

    /// Serialize the manifest.
    ///
    /// With `shareable` set, a clone is stripped of local-only parameters
    /// first; `self` is never modified.
    pub fn to_text(&self, shareable: bool) -> Result<String, ManifestError> {
        if shareable {
            let mut copy = self.snapshot();
            for entry in copy.contents.iter_mut() {
                entry.strip_local();
            }
            codec::encode(&copy)
        } else {
            codec::encode(self)
        }
    }

    /// Parse a manifest document
    pub fn from_text(text: &str) -> Result<Self, ManifestError> {
        codec::decode(text)
    }

    /// Load the manifest of a package archive; see
    /// [`crate::archive::load_manifest`]
    pub fn from_archive(
        path: &Path,
        fs: &dyn FileSystem,
        compute_sizes: bool,
    ) -> crate::error::Result<Self> {
        crate::archive::load_manifest(fs, path, compute_sizes)
    }

    /// Record archive sizes for entries present in the archive
    pub fn apply_sizes<'a>(&mut self, sizes: impl IntoIterator<Item = (&'a str, u64, u64)>) {
        for (name, size, compressed) in sizes {
            if let Some(entry) = self.contents.get_mut(name) {
                entry.size = Some(size);
                entry.compressed_size = Some(compressed);
            }
        }
        debug!("Applied archive sizes to manifest {:?}", self.name());
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}), {} entries",
            self.name().unwrap_or("<unnamed>"),
            self.uid().unwrap_or("<no uid>"),
            self.contents.len()
        )
    }
}
