// src/archive/legacy.rs
//! Legacy archive upgrade
//!
//! Archives without a recognized manifest are rewritten into the native
//! layout before extraction. A manifest is synthesized from the archive's
//! entries (records are recognized by extension and validated), written
//! first into `<path><upgrade_suffix>`, followed by raw copies of every kept
//! entry. The rewritten archive then replaces the original by rename and is
//! extracted natively.

use std::io::{Read, Write};
use std::path::Path;

use glob::Pattern;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{
    ExtractReport, Extractor, ImportContext, MANIFEST_DIR, MANIFEST_PATH, PackageExtractor,
    PackageReader, open_archive, read_entry_text,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::filesystem::FileSystem;
use crate::package::content::{PARAM_NAME, PARAM_UID};
use crate::package::{ContentEntry, MANIFEST_VERSION, Manifest};
use crate::record;

/// Decides per legacy entry whether it is flagged `ignore`
pub trait EntryPolicy: Send + Sync {
    /// Policy name for logging
    fn name(&self) -> &str;

    fn ignore(&self, entry_name: &str) -> bool;
}

/// Keeps every entry
pub struct KeepAll;

impl EntryPolicy for KeepAll {
    fn name(&self) -> &str {
        "KeepAll"
    }

    fn ignore(&self, _entry_name: &str) -> bool {
        false
    }
}

/// Ignores entries whose name matches any glob pattern
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::new();
        for pat in patterns {
            let pattern = Pattern::new(pat)
                .map_err(|e| Error::Config(format!("Invalid glob pattern '{}': {}", pat, e)))?;
            compiled.push(pattern);
        }
        Ok(Self { patterns: compiled })
    }
}

impl EntryPolicy for IgnorePatterns {
    fn name(&self) -> &str {
        "IgnorePatterns"
    }

    fn ignore(&self, entry_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(entry_name))
    }
}

/// Result of rewriting a legacy archive
#[derive(Debug, Clone)]
pub struct UpgradeReport {
    pub manifest: Manifest,
    pub warnings: Vec<String>,
}

/// Entry of the source archive that will be carried over
struct KeptEntry {
    index: usize,
    content: ContentEntry,
}

/// Upgrades archives without a recognized manifest, then extracts them
pub struct LegacyArchiveAdapter<'a> {
    config: &'a EngineConfig,
    fs: &'a dyn FileSystem,
    policy: Box<dyn EntryPolicy>,
}

impl<'a> LegacyArchiveAdapter<'a> {
    pub fn new(config: &'a EngineConfig, fs: &'a dyn FileSystem) -> Self {
        Self {
            config,
            fs,
            policy: Box::new(KeepAll),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn EntryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Rewrite the archive at `path` into the native layout, in place
    pub fn upgrade(&self, path: &Path) -> Result<UpgradeReport> {
        let failed = |reason: String| Error::UpgradeFailed {
            path: path.to_path_buf(),
            reason,
        };

        let mut archive = open_archive(self.fs, path).map_err(|e| failed(e.to_string()))?;
        let mut warnings = Vec::new();

        let mut manifest = salvage_manifest(&mut archive)
            .unwrap_or_else(|| Manifest::with_random_uid(&stem_name(path)));
        manifest.version = MANIFEST_VERSION;

        let kept = self
            .scan(&mut archive, &mut warnings)
            .map_err(|e| failed(e.to_string()))?;
        for entry in &kept {
            manifest.add_content(entry.content.clone());
        }

        let upgrade_path = self.config.upgrade_path(path);
        self.rewrite(&mut archive, &manifest, &kept, &upgrade_path)
            .map_err(|e| failed(e.to_string()))?;
        drop(archive);

        self.fs
            .rename(&upgrade_path, path)
            .map_err(|e| failed(format!("cannot replace original: {}", e)))?;

        manifest.path = path.to_path_buf();
        info!(
            "Upgraded legacy package {} ({} entries, policy {})",
            path.display(),
            kept.len(),
            self.policy.name()
        );

        Ok(UpgradeReport { manifest, warnings })
    }

    /// Decide which entries to carry over and describe them
    fn scan(&self, archive: &mut PackageReader, warnings: &mut Vec<String>) -> Result<Vec<KeptEntry>> {
        let mut kept = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            if file.is_dir() || name.starts_with(MANIFEST_DIR) {
                continue;
            }

            let mut content = ContentEntry::new(name.clone());
            if !content.is_valid() {
                push_warning(warnings, format!("Skipping entry with unusable name {:?}", name));
                continue;
            }

            if record::has_record_extension(&name) {
                let mut bytes = Vec::new();
                let text = file
                    .read_to_end(&mut bytes)
                    .ok()
                    .and_then(|_| String::from_utf8(bytes).ok())
                    .filter(|text| record::is_valid_record(text));
                let Some(text) = text else {
                    push_warning(warnings, format!("Dropping invalid record {}", name));
                    continue;
                };
                let uid = record::record_uid(&text);
                if uid.is_empty() {
                    push_warning(warnings, format!("Record {} has no uid", name));
                } else {
                    content.set_parameter(PARAM_UID, uid);
                }
            } else {
                let file_name = content.file_name().to_string();
                content.set_parameter(PARAM_NAME, file_name);
            }

            content.ignore = self.policy.ignore(&name);
            debug!("Keeping legacy entry {} (ignore: {})", name, content.ignore);
            kept.push(KeptEntry { index, content });
        }

        Ok(kept)
    }

    fn rewrite(
        &self,
        archive: &mut PackageReader,
        manifest: &Manifest,
        kept: &[KeptEntry],
        out: &Path,
    ) -> Result<()> {
        let mut zip = ZipWriter::new(self.fs.open_write(out)?);
        zip.set_comment(format!(
            "{} mission package (manifest version {})",
            self.config.producer, MANIFEST_VERSION
        ));

        let text = manifest.to_text(true)?;
        zip.start_file(
            MANIFEST_PATH,
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )?;
        zip.write_all(text.as_bytes())?;

        for entry in kept {
            zip.raw_copy_file(archive.by_index(entry.index)?)?;
        }
        zip.finish()?;
        Ok(())
    }
}

impl Extractor for LegacyArchiveAdapter<'_> {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn extract_with_report(&self, path: &Path, ctx: &mut ImportContext<'_>) -> Result<ExtractReport> {
        let upgrade = self.upgrade(path)?;
        let mut report = PackageExtractor::new(self.config, self.fs).extract_with_report(path, ctx)?;

        let mut warnings = upgrade.warnings;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }
}

/// Configuration of an older manifest, if one can be read
fn salvage_manifest(archive: &mut PackageReader) -> Option<Manifest> {
    let text = read_entry_text(archive, MANIFEST_PATH).ok().flatten()?;
    let old = Manifest::from_text(&text).ok()?;
    if old.name().is_none_or(str::is_empty) {
        return None;
    }

    let mut manifest = Manifest::with_random_uid(old.name().unwrap_or_default());
    for param in &old.configuration {
        manifest.configuration.insert(param.clone());
    }
    debug!("Salvaged configuration of version {} manifest", old.version);
    Some(manifest)
}

fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "package".to_string())
}

fn push_warning(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::load_manifest;
    use crate::filesystem::MemoryFs;
    use crate::package::ContentKind;

    fn write_plain_zip(fs: &MemoryFs, path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(fs.open_write(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_ignore_patterns() {
        let policy = IgnorePatterns::new(&["*.tmp".to_string(), "cache/*".to_string()]).unwrap();
        assert!(policy.ignore("scratch.tmp"));
        assert!(policy.ignore("cache/tile.png"));
        assert!(!policy.ignore("maps/area.kml"));
        assert!(IgnorePatterns::new(&["[".to_string()]).is_err());
    }

    #[test]
    fn test_upgrade_synthesizes_manifest() {
        let fs = MemoryFs::new();
        let path = Path::new("/inbox/Patrol Route.zip");
        write_plain_zip(
            &fs,
            path,
            &[
                ("maps/area.kml", "<kml/>"),
                ("points/p1.cot", "<event uid=\"p-1\"><point lat='1' lon='2'/></event>"),
                ("points/bad.cot", "not xml"),
                ("points/anon.cot", "<event type='a-f-G'/>"),
                ("scratch.tmp", "x"),
            ],
        );

        let config = EngineConfig::default();
        let policy = IgnorePatterns::new(&["*.tmp".to_string()]).unwrap();
        let report = LegacyArchiveAdapter::new(&config, &fs)
            .with_policy(Box::new(policy))
            .upgrade(path)
            .unwrap();

        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.manifest.name(), Some("Patrol Route"));
        assert!(!fs.exists(&config.upgrade_path(path)));

        let manifest = load_manifest(&fs, path, true).unwrap();
        assert_eq!(manifest.contents.len(), 4);
        let record = manifest.content("points/p1.cot").unwrap();
        assert_eq!(record.kind(), ContentKind::Record);
        assert_eq!(record.uid(), Some("p-1"));
        let anon = manifest.content("points/anon.cot").unwrap();
        assert_eq!(anon.kind(), ContentKind::Record);
        assert_eq!(anon.uid(), None);
        assert!(manifest.content("scratch.tmp").unwrap().ignore);
        assert!(!manifest.has_content("points/bad.cot"));
    }

    #[test]
    fn test_upgrade_salvages_old_manifest_name() {
        let fs = MemoryFs::new();
        let path = Path::new("/inbox/old.zip");
        write_plain_zip(
            &fs,
            path,
            &[
                (
                    MANIFEST_PATH,
                    "<MissionPackageManifest version=\"1\"><Configuration>\
                     <Parameter name=\"name\" value=\"Old Name\"/>\
                     <Parameter name=\"uid\" value=\"old-uid\"/>\
                     </Configuration></MissionPackageManifest>",
                ),
                ("doc.txt", "hello"),
            ],
        );

        let config = EngineConfig::default();
        let report = LegacyArchiveAdapter::new(&config, &fs).upgrade(path).unwrap();
        assert_eq!(report.manifest.name(), Some("Old Name"));
        assert_eq!(report.manifest.uid(), Some("old-uid"));
        assert_eq!(report.manifest.version, MANIFEST_VERSION);
    }

    #[test]
    fn test_upgrade_of_non_zip_fails() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/inbox/junk.zip"), b"not a zip").unwrap();
        let config = EngineConfig::default();
        assert!(matches!(
            LegacyArchiveAdapter::new(&config, &fs).upgrade(Path::new("/inbox/junk.zip")),
            Err(Error::UpgradeFailed { .. })
        ));
    }
}
