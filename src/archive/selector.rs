// src/archive/selector.rs
//! Extractor selection
//!
//! Decides between native extraction and a legacy upgrade by peeking at the
//! manifest entry text. The check is a substring match on the root element
//! and version attribute, not a parse.

use std::path::Path;

use tracing::debug;

use super::legacy::{EntryPolicy, KeepAll, LegacyArchiveAdapter};
use super::{Extractor, PackageExtractor, read_manifest_text};
use crate::config::EngineConfig;
use crate::filesystem::FileSystem;
use crate::package::codec::ROOT_ELEMENT;

const VERSION_TOKENS: [&str; 2] = ["version=\"2\"", "version='2'"];

/// Whether manifest text announces a version 2 manifest
pub fn is_recognized(text: &str) -> bool {
    text.contains(&format!("<{ROOT_ELEMENT}"))
        && VERSION_TOKENS.iter().any(|token| text.contains(token))
}

/// Whether the archive at `path` carries a recognized manifest
pub fn has_recognized_manifest(fs: &dyn FileSystem, path: &Path) -> bool {
    match read_manifest_text(fs, path) {
        Ok(Some(text)) => is_recognized(&text),
        Ok(None) => false,
        Err(e) => {
            debug!("Cannot read manifest of {}: {}", path.display(), e);
            false
        }
    }
}

/// Chooses an [`Extractor`] for an archive
pub struct ArchiveFormatSelector<'a> {
    config: &'a EngineConfig,
    fs: &'a dyn FileSystem,
    policy: Box<dyn Fn() -> Box<dyn EntryPolicy> + 'a>,
}

impl<'a> ArchiveFormatSelector<'a> {
    pub fn new(config: &'a EngineConfig, fs: &'a dyn FileSystem) -> Self {
        Self {
            config,
            fs,
            policy: Box::new(|| Box::new(KeepAll)),
        }
    }

    /// Entry policy handed to the legacy adapter
    pub fn with_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn() -> Box<dyn EntryPolicy> + 'a,
    {
        self.policy = Box::new(policy);
        self
    }

    pub fn select(&self, path: &Path) -> Box<dyn Extractor + 'a> {
        if has_recognized_manifest(self.fs, path) {
            debug!("{} has a recognized manifest", path.display());
            Box::new(PackageExtractor::new(self.config, self.fs))
        } else {
            debug!("{} needs a legacy upgrade", path.display());
            Box::new(LegacyArchiveAdapter::new(self.config, self.fs).with_policy((self.policy)()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_recognized() {
        assert!(is_recognized("<MissionPackageManifest version=\"2\">"));
        assert!(is_recognized("<?xml?>\n<MissionPackageManifest version='2'>"));
        assert!(!is_recognized("<MissionPackageManifest version=\"1\">"));
        assert!(!is_recognized("<MissionPackageManifest>"));
        assert!(!is_recognized("<Other version=\"2\"/>"));
    }
}
