// src/package/content.rs

//! Package content entries
//!
//! A content entry is one addressable unit inside the archive. Its entry key
//! doubles as the archive path. Whether an entry is a file or a structured
//! record is derived from its parameters and key, never stored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::parameters::{Parameter, ParameterSet};
use crate::hash;
use crate::record;

/// Authoring-device file location (stripped from the shareable view)
pub const PARAM_LOCAL_PATH: &str = "localpath";
/// Explicit record marker (stripped from the shareable view)
pub const PARAM_IS_RECORD: &str = "isRecord";
/// Identifier of the live object a record refers to
pub const PARAM_UID: &str = "uid";
/// Display name of the content
pub const PARAM_NAME: &str = "name";
/// Hint for import resolvers
pub const PARAM_CONTENT_TYPE: &str = "contentType";
pub const PARAM_VISIBLE: &str = "visible";
/// Entry key of another content entry this one refers to
pub const PARAM_REF_CONTENT: &str = "refContent";
/// Delete the local content along with the package
pub const PARAM_DELETE_WITH_PACKAGE: &str = "deleteWithPackage";

/// Parameters that only make sense on the authoring device
pub const LOCAL_ONLY_PARAMS: [&str; 2] = [PARAM_LOCAL_PATH, PARAM_IS_RECORD];

/// Size estimate for a file whose size cannot be determined
pub const FILE_SIZE_ESTIMATE: u64 = 4096;

/// Derived kind of a content entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Record,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// One entry of the content listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Archive path, unique within a manifest
    pub entry_key: String,
    pub parameters: ParameterSet,
    /// Skipped during extraction (still packaged during builds)
    pub ignore: bool,
    /// Uncompressed size as found in the archive
    pub size: Option<u64>,
    /// Compressed size as found in the archive
    pub compressed_size: Option<u64>,
}

impl ContentEntry {
    pub fn new(entry_key: impl Into<String>) -> Self {
        Self {
            entry_key: entry_key.into(),
            parameters: ParameterSet::new(),
            ignore: false,
            size: None,
            compressed_size: None,
        }
    }

    /// Content entry for a local file.
    ///
    /// The key is `<sha256(local path)>/<file name>`, so adding the same
    /// local file again produces the same key.
    pub fn for_file(local_path: &Path) -> Self {
        let path_str = local_path.to_string_lossy();
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content".to_string());

        let mut entry = Self::new(format!("{}/{}", hash::path_digest(&path_str), file_name));
        entry.parameters.set(PARAM_LOCAL_PATH, path_str.as_ref());
        entry.parameters.set(PARAM_NAME, file_name);
        entry
    }

    /// Content entry for a record referring to the live object `uid`
    pub fn for_record(uid: &str, name: Option<&str>) -> Self {
        let mut entry = Self::new(record::entry_key(uid));
        entry.parameters.set(PARAM_UID, uid);
        entry.parameters.set_bool(PARAM_IS_RECORD, true);
        if let Some(name) = name {
            entry.parameters.set(PARAM_NAME, name);
        }
        entry
    }

    pub fn kind(&self) -> ContentKind {
        if self.parameters.contains(PARAM_IS_RECORD)
            || record::has_record_extension(&self.entry_key)
        {
            ContentKind::Record
        } else {
            ContentKind::File
        }
    }

    pub fn is_record(&self) -> bool {
        self.kind() == ContentKind::Record
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name)
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<String>) -> bool {
        self.parameters.set(name, value)
    }

    pub fn add_parameter(&mut self, param: Parameter) -> bool {
        self.parameters.insert(param)
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Parameter> {
        self.parameters.remove(name)
    }

    pub fn local_path(&self) -> Option<PathBuf> {
        self.parameters.get(PARAM_LOCAL_PATH).map(PathBuf::from)
    }

    /// Uid of the referenced object; records without one fall back to the
    /// directory component of a `<uid>/<uid>.cot` key
    pub fn uid(&self) -> Option<&str> {
        self.parameters.get(PARAM_UID).or_else(|| {
            let (dir, _) = self.entry_key.split_once('/')?;
            (self.is_record() && self.entry_key == record::entry_key(dir)).then_some(dir)
        })
    }

    /// File name portion of the entry key
    pub fn file_name(&self) -> &str {
        self.entry_key
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.entry_key)
    }

    /// Visible unless explicitly set to false
    pub fn is_visible(&self) -> bool {
        self.parameters.get_bool(PARAM_VISIBLE).unwrap_or(true)
    }

    pub fn delete_with_package(&self) -> bool {
        self.parameters
            .get_bool(PARAM_DELETE_WITH_PACKAGE)
            .unwrap_or(false)
    }

    pub fn ref_content(&self) -> Option<&str> {
        self.parameters.get(PARAM_REF_CONTENT)
    }

    /// Remove the parameters that only apply on the authoring device
    pub fn strip_local(&mut self) {
        for name in LOCAL_ONLY_PARAMS {
            self.parameters.remove(name);
        }
    }

    /// An entry needs a key that is usable as a relative archive path
    pub fn is_valid(&self) -> bool {
        let key = self.entry_key.as_str();
        !key.is_empty()
            && !key.starts_with('/')
            && !key.ends_with('/')
            && !key.split('/').any(|part| part == "..")
            && self.parameters.is_valid()
    }
}

/// Content listing of a manifest, unique by entry key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentList {
    entries: Vec<ContentEntry>,
}

impl ContentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; an existing entry with the same key is replaced in
    /// place. Invalid entries are rejected.
    pub fn add(&mut self, entry: ContentEntry) -> bool {
        if !entry.is_valid() {
            tracing::warn!("Ignoring invalid content entry: {:?}", entry.entry_key);
            return false;
        }

        match self
            .entries
            .iter_mut()
            .find(|e| e.entry_key == entry.entry_key)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        true
    }

    pub fn remove(&mut self, entry_key: &str) -> Option<ContentEntry> {
        let index = self.entries.iter().position(|e| e.entry_key == entry_key)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, entry_key: &str) -> bool {
        self.entries.iter().any(|e| e.entry_key == entry_key)
    }

    pub fn get(&self, entry_key: &str) -> Option<&ContentEntry> {
        self.entries.iter().find(|e| e.entry_key == entry_key)
    }

    pub fn get_mut(&mut self, entry_key: &str) -> Option<&mut ContentEntry> {
        self.entries.iter_mut().find(|e| e.entry_key == entry_key)
    }

    /// All entries, ignored ones included
    pub fn iter(&self) -> impl Iterator<Item = &ContentEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ContentEntry> {
        self.entries.iter_mut()
    }

    /// Non-ignored entries of one kind
    pub fn of_kind(&self, kind: ContentKind) -> impl Iterator<Item = &ContentEntry> {
        self.entries
            .iter()
            .filter(move |e| !e.ignore && e.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_file_key_is_stable() {
        let a = ContentEntry::for_file(Path::new("/sdcard/maps/area.kml"));
        let b = ContentEntry::for_file(Path::new("/sdcard/maps/area.kml"));
        let c = ContentEntry::for_file(Path::new("/sdcard/other/area.kml"));

        assert_eq!(a.entry_key, b.entry_key);
        assert_ne!(a.entry_key, c.entry_key);
        assert!(a.entry_key.ends_with("/area.kml"));
        assert_eq!(a.kind(), ContentKind::File);
        assert_eq!(a.local_path(), Some(PathBuf::from("/sdcard/maps/area.kml")));
    }

    #[test]
    fn test_record_kind_derivation() {
        let record = ContentEntry::for_record("u-1", Some("Alpha"));
        assert_eq!(record.entry_key, "u-1/u-1.cot");
        assert!(record.is_record());
        assert_eq!(record.uid(), Some("u-1"));

        let mut stripped = record.clone();
        stripped.strip_local();
        assert!(!stripped.parameters.contains(PARAM_IS_RECORD));
        assert!(stripped.is_record());

        let mut explicit = ContentEntry::new("blob/data.bin");
        explicit.set_parameter(PARAM_IS_RECORD, "true");
        assert!(explicit.is_record());
        assert_eq!(explicit.uid(), None);

        assert_eq!(ContentEntry::new("u-2/u-2.cot").uid(), Some("u-2"));
        assert_eq!(ContentEntry::new("points/p1.cot").uid(), None);
    }

    #[test]
    fn test_add_replaces_same_key() {
        let mut list = ContentList::new();
        let mut first = ContentEntry::new("k/file.txt");
        first.set_parameter(PARAM_NAME, "first");
        let mut second = ContentEntry::new("k/file.txt");
        second.set_parameter(PARAM_NAME, "second");

        list.add(first);
        list.add(second);

        assert_eq!(list.len(), 1);
        assert_eq!(
            list.get("k/file.txt").and_then(|e| e.parameter(PARAM_NAME)),
            Some("second")
        );
    }

    #[test]
    fn test_of_kind_skips_ignored() {
        let mut list = ContentList::new();
        list.add(ContentEntry::new("a/a.txt"));
        let mut ignored = ContentEntry::new("b/b.txt");
        ignored.ignore = true;
        list.add(ignored);
        list.add(ContentEntry::for_record("r", None));

        assert_eq!(list.of_kind(ContentKind::File).count(), 1);
        assert_eq!(list.of_kind(ContentKind::Record).count(), 1);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let mut list = ContentList::new();
        assert!(!list.add(ContentEntry::new("")));
        assert!(!list.add(ContentEntry::new("/abs/path")));
        assert!(!list.add(ContentEntry::new("../escape.txt")));
        assert!(!list.add(ContentEntry::new("dir/")));
        assert!(list.is_empty());
    }

    #[test]
    fn test_flags() {
        let mut entry = ContentEntry::new("a/a.txt");
        assert!(entry.is_visible());
        assert!(!entry.delete_with_package());

        entry.set_parameter(PARAM_VISIBLE, "false");
        entry.set_parameter(PARAM_DELETE_WITH_PACKAGE, "true");
        entry.set_parameter(PARAM_REF_CONTENT, "r/r.cot");
        assert!(!entry.is_visible());
        assert!(entry.delete_with_package());
        assert_eq!(entry.ref_content(), Some("r/r.cot"));
        assert_eq!(entry.file_name(), "a.txt");
    }
}
