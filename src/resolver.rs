// src/resolver.rs

//! Collaborators supplied by the caller
//!
//! The engine does not know where records live or how extracted files are
//! placed. Callers plug those in through three traits:
//! - [`ContentResolver`]: turns a record uid into record text at build time
//! - [`RecordImporter`]: imports a decoded record at extraction time
//! - [`ImportResolver`]: classifies and places an extracted file
//!
//! Import resolvers are applied in order through a [`ResolverChain`]; the
//! first resolver that reports a match handles the file.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::filesystem::FileSystem;
use crate::package::{ContentEntry, Manifest};
use crate::record;

/// Resolves record uids against the live object store
pub trait ContentResolver {
    /// Serialized record text for `uid`, or `None` if the object is gone
    fn resolve(&self, uid: &str) -> Option<String>;

    /// Geometry point count of the object, used for size estimates
    fn point_count(&self, _uid: &str) -> Option<usize> {
        None
    }
}

/// Outcome of importing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    /// Something the record refers to is not present yet
    Deferred,
    Failed(String),
}

/// Imports decoded records into the live object store
pub trait RecordImporter {
    fn import(&mut self, uid: &str, record: &str, manifest: &Manifest) -> ImportOutcome;
}

/// Classifies an extracted file and places it
pub trait ImportResolver {
    /// Resolver name for logging
    fn name(&self) -> &str;

    /// Handle `file` if it is recognized; returns whether it was handled
    fn classify(&mut self, file: &Path, entry: &ContentEntry, fs: &dyn FileSystem) -> bool;

    /// Called once after extraction if this resolver handled any file
    fn finalize(&mut self) {}
}

/// Ordered chain of import resolvers
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ImportResolver>>,
    matched: Vec<bool>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resolver: Box<dyn ImportResolver>) {
        self.resolvers.push(resolver);
        self.matched.push(false);
    }

    pub fn with(mut self, resolver: Box<dyn ImportResolver>) -> Self {
        self.add(resolver);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Offer a file to each resolver in order; returns the name of the one
    /// that handled it
    pub fn dispatch(
        &mut self,
        file: &Path,
        entry: &ContentEntry,
        fs: &dyn FileSystem,
    ) -> Option<String> {
        for (resolver, matched) in self.resolvers.iter_mut().zip(self.matched.iter_mut()) {
            if resolver.classify(file, entry, fs) {
                *matched = true;
                debug!("{} handled {}", resolver.name(), file.display());
                return Some(resolver.name().to_string());
            }
        }
        None
    }

    /// Finalize every resolver that handled at least one file; returns their
    /// names. Match state is reset afterwards.
    pub fn finalize_matched(&mut self) -> Vec<String> {
        let mut finalized = Vec::new();
        for (resolver, matched) in self.resolvers.iter_mut().zip(self.matched.iter_mut()) {
            if *matched {
                resolver.finalize();
                finalized.push(resolver.name().to_string());
                *matched = false;
            }
        }
        finalized
    }
}

/// Content resolver backed by a directory of `<uid>.cot` files
pub struct DirectoryResolver<'a> {
    dir: PathBuf,
    fs: &'a dyn FileSystem,
}

impl<'a> DirectoryResolver<'a> {
    pub fn new(dir: impl Into<PathBuf>, fs: &'a dyn FileSystem) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    fn record_path(&self, uid: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", uid, record::RECORD_EXTENSION))
    }

    /// Uids of every record file in the directory
    pub fn uids(&self) -> Vec<String> {
        let Ok(children) = self.fs.list(&self.dir) else {
            return Vec::new();
        };
        children
            .iter()
            .filter(|p| {
                p.extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(record::RECORD_EXTENSION))
            })
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect()
    }
}

impl ContentResolver for DirectoryResolver<'_> {
    fn resolve(&self, uid: &str) -> Option<String> {
        if !record::is_file_safe_uid(uid) {
            return None;
        }
        let bytes = self.fs.read(&self.record_path(uid)).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn point_count(&self, uid: &str) -> Option<usize> {
        self.resolve(uid).map(|text| record::point_count(&text))
    }
}

/// Record importer that writes each record to `<dir>/<uid>.cot`
pub struct DirectoryImporter<'a> {
    dir: PathBuf,
    fs: &'a dyn FileSystem,
    imported: Vec<String>,
}

impl<'a> DirectoryImporter<'a> {
    pub fn new(dir: impl Into<PathBuf>, fs: &'a dyn FileSystem) -> Self {
        Self {
            dir: dir.into(),
            fs,
            imported: Vec::new(),
        }
    }

    pub fn imported(&self) -> &[String] {
        &self.imported
    }
}

impl RecordImporter for DirectoryImporter<'_> {
    fn import(&mut self, uid: &str, record_text: &str, _manifest: &Manifest) -> ImportOutcome {
        if uid.is_empty() {
            return ImportOutcome::Failed("record has no uid".to_string());
        }
        if !record::is_file_safe_uid(uid) {
            warn!("Refusing record with unsafe uid {:?}", uid);
            return ImportOutcome::Failed(format!("unsafe record uid: {uid}"));
        }
        let path = self
            .dir
            .join(format!("{}.{}", uid, record::RECORD_EXTENSION));
        match self.fs.write(&path, record_text.as_bytes()) {
            Ok(()) => {
                self.imported.push(uid.to_string());
                ImportOutcome::Imported
            }
            Err(e) => {
                warn!("Failed to write record {}: {}", path.display(), e);
                ImportOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFs;

    struct ExtensionResolver {
        name: String,
        extension: &'static str,
        handled: Vec<PathBuf>,
        finalized: bool,
    }

    impl ExtensionResolver {
        fn new(extension: &'static str) -> Self {
            Self {
                name: format!("{extension}-resolver"),
                extension,
                handled: Vec::new(),
                finalized: false,
            }
        }
    }

    impl ImportResolver for ExtensionResolver {
        fn name(&self) -> &str {
            &self.name
        }

        fn classify(&mut self, file: &Path, _entry: &ContentEntry, _fs: &dyn FileSystem) -> bool {
            if file.extension().is_some_and(|e| e == self.extension) {
                self.handled.push(file.to_path_buf());
                true
            } else {
                false
            }
        }

        fn finalize(&mut self) {
            self.finalized = true;
        }
    }

    #[test]
    fn test_chain_first_match_wins() {
        let fs = MemoryFs::new();
        let mut chain = ResolverChain::new()
            .with(Box::new(ExtensionResolver::new("kml")))
            .with(Box::new(ExtensionResolver::new("png")));
        let entry = ContentEntry::new("a/map.kml");

        assert_eq!(
            chain.dispatch(Path::new("/x/map.kml"), &entry, &fs).as_deref(),
            Some("kml-resolver")
        );
        assert_eq!(chain.dispatch(Path::new("/x/doc.pdf"), &entry, &fs), None);

        let finalized = chain.finalize_matched();
        assert_eq!(finalized, vec!["kml-resolver".to_string()]);
        assert!(chain.finalize_matched().is_empty());
    }

    #[test]
    fn test_directory_resolver_and_importer() {
        let fs = MemoryFs::new();
        fs.write(
            Path::new("/records/u1.cot"),
            b"<event uid='u1'><point lat='0' lon='0'/></event>",
        )
        .unwrap();
        fs.write(Path::new("/records/readme.txt"), b"not a record").unwrap();

        let resolver = DirectoryResolver::new("/records", &fs);
        assert_eq!(resolver.uids(), vec!["u1".to_string()]);
        assert!(resolver.resolve("u1").is_some());
        assert_eq!(resolver.point_count("u1"), Some(1));
        assert!(resolver.resolve("missing").is_none());

        let manifest = Manifest::new("n", "u");
        let mut importer = DirectoryImporter::new("/imported", &fs);
        assert_eq!(
            importer.import("u1", "<event uid='u1'/>", &manifest),
            ImportOutcome::Imported
        );
        assert!(matches!(
            importer.import("", "<event/>", &manifest),
            ImportOutcome::Failed(_)
        ));
        assert!(fs.is_file(Path::new("/imported/u1.cot")));
        assert_eq!(importer.imported(), ["u1".to_string()]);
    }

    #[test]
    fn test_importer_rejects_path_uids() {
        let fs = MemoryFs::new();
        let manifest = Manifest::new("n", "u");
        let mut importer = DirectoryImporter::new("/root/records", &fs);

        for uid in ["../../escaped", "..", "a/b", "a\\b"] {
            let text = format!("<event uid=\"{uid}\"/>");
            assert!(matches!(
                importer.import(uid, &text, &manifest),
                ImportOutcome::Failed(_)
            ));
        }
        assert!(!fs.exists(Path::new("/escaped.cot")));
        assert!(importer.imported().is_empty());

        let resolver = DirectoryResolver::new("/root/records", &fs);
        fs.write(Path::new("/root/secret.cot"), b"<event uid='s'/>").unwrap();
        assert!(resolver.resolve("../secret").is_none());
    }
}
