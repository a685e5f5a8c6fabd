// src/archive/extractor.rs
//! Native package extraction
//!
//! Files are written into a per-package staging directory and offered to the
//! import resolver chain as they are read. Records are buffered and imported
//! after every entry has been read, in two passes: the first pass imports
//! everything it can and collects the records the importer defers, the
//! second pass retries exactly that set once. Records still deferred after
//! the retry are dropped.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{Extractor, PackageReader, load_manifest, open_archive};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::filesystem::{self, FileSystem};
use crate::package::{ContentEntry, ContentKind, Manifest};
use crate::record;
use crate::resolver::{ImportOutcome, ImportResolver, RecordImporter, ResolverChain};

/// Where and how extracted content is imported
pub struct ImportContext<'a> {
    /// Root under which packages are staged
    pub root: PathBuf,
    pub importer: &'a mut dyn RecordImporter,
    pub resolvers: ResolverChain,
}

impl<'a> ImportContext<'a> {
    pub fn new(root: impl Into<PathBuf>, importer: &'a mut dyn RecordImporter) -> Self {
        Self {
            root: root.into(),
            importer,
            resolvers: ResolverChain::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ImportResolver>) -> Self {
        self.resolvers.add(resolver);
        self
    }
}

/// Outcome of an extraction
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub manifest: Manifest,
    /// Per-package staging directory
    pub staging_dir: PathBuf,
    /// Item-level problems, in the order they happened
    pub warnings: Vec<String>,
    /// Files written to the staging directory
    pub files_extracted: usize,
    /// Files handled by an import resolver
    pub files_dispatched: usize,
    pub records_imported: usize,
    /// Uids of records still deferred after the retry pass
    pub records_dropped: Vec<String>,
    /// Resolvers finalized after extraction
    pub finalized: Vec<String>,
}

impl ExtractReport {
    fn new(manifest: Manifest, staging_dir: PathBuf) -> Self {
        Self {
            manifest,
            staging_dir,
            warnings: Vec::new(),
            files_extracted: 0,
            files_dispatched: 0,
            records_imported: 0,
            records_dropped: Vec::new(),
            finalized: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// A decoded record waiting for import
struct PendingRecord {
    uid: String,
    text: String,
}

/// Extracts packages that carry a recognized manifest
pub struct PackageExtractor<'a> {
    config: &'a EngineConfig,
    fs: &'a dyn FileSystem,
}

impl<'a> PackageExtractor<'a> {
    pub fn new(config: &'a EngineConfig, fs: &'a dyn FileSystem) -> Self {
        Self { config, fs }
    }

    /// Staging directory for a package under `root`
    pub fn staging_dir(&self, root: &Path, manifest: &Manifest) -> PathBuf {
        root.join(&self.config.package_folder)
            .join(folder_name(manifest))
    }

    fn extract_file(
        &self,
        archive: &mut PackageReader,
        entry: &ContentEntry,
        dest: &Path,
    ) -> io::Result<u64> {
        let mut file = archive.by_name(&entry.entry_key).map_err(io::Error::other)?;
        let mut writer = self.fs.open_write(dest)?;
        let bytes = io::copy(&mut file, &mut writer)?;
        writer.flush()?;
        Ok(bytes)
    }

    fn decode_record(
        archive: &mut PackageReader,
        entry: &ContentEntry,
    ) -> std::result::Result<PendingRecord, String> {
        let mut file = archive
            .by_name(&entry.entry_key)
            .map_err(|e| e.to_string())?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
        let text = String::from_utf8(bytes).map_err(|_| "record is not valid UTF-8".to_string())?;

        if !record::is_valid_record(&text) {
            return Err("record is not a well-formed event document".to_string());
        }
        Ok(PendingRecord {
            uid: record::record_uid(&text),
            text,
        })
    }

    fn import_records(
        pending: Vec<PendingRecord>,
        ctx: &mut ImportContext<'_>,
        report: &mut ExtractReport,
    ) {
        let mut deferred = Vec::new();
        for record in pending {
            match ctx.importer.import(&record.uid, &record.text, &report.manifest) {
                ImportOutcome::Imported => report.records_imported += 1,
                ImportOutcome::Deferred => deferred.push(record),
                ImportOutcome::Failed(reason) => {
                    report.warn(format!("Failed to import record {}: {}", record.uid, reason))
                }
            }
        }

        if deferred.is_empty() {
            return;
        }
        debug!("Retrying {} deferred records", deferred.len());

        for record in deferred {
            match ctx.importer.import(&record.uid, &record.text, &report.manifest) {
                ImportOutcome::Imported => report.records_imported += 1,
                ImportOutcome::Deferred => {
                    report.warn(format!(
                        "Dropping record {}: still deferred after retry",
                        record.uid
                    ));
                    report.records_dropped.push(record.uid);
                }
                ImportOutcome::Failed(reason) => {
                    report.warn(format!("Failed to import record {}: {}", record.uid, reason))
                }
            }
        }
    }
}

impl Extractor for PackageExtractor<'_> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn extract_with_report(
        &self,
        path: &Path,
        ctx: &mut ImportContext<'_>,
    ) -> Result<ExtractReport> {
        let manifest = load_manifest(self.fs, path, true)?;
        let mut archive = open_archive(self.fs, path)?;
        let staging = self.staging_dir(&ctx.root, &manifest);
        let mut report = ExtractReport::new(manifest.snapshot(), staging.clone());

        info!("Extracting {} from {}", manifest, path.display());

        let mut pending = Vec::new();
        for entry in manifest.contents.iter().filter(|e| !e.ignore) {
            if archive.index_for_name(&entry.entry_key).is_none() {
                warn!("Archive {} has no entry {}", path.display(), entry.entry_key);
                continue;
            }

            match entry.kind() {
                ContentKind::Record => match Self::decode_record(&mut archive, entry) {
                    Ok(record) => pending.push(record),
                    Err(reason) => {
                        report.warn(format!("Skipping record {}: {}", entry.entry_key, reason))
                    }
                },
                ContentKind::File => {
                    let dest = staging.join(&entry.entry_key);
                    match self.extract_file(&mut archive, entry, &dest) {
                        Ok(bytes) => {
                            debug!("Extracted {} ({} bytes)", dest.display(), bytes);
                            report.files_extracted += 1;
                            if ctx.resolvers.dispatch(&dest, entry, self.fs).is_some() {
                                report.files_dispatched += 1;
                            }
                        }
                        Err(e) => report.warn(format!(
                            "Failed to extract {}: {}",
                            entry.entry_key, e
                        )),
                    }
                }
            }
        }

        Self::import_records(pending, ctx, &mut report);

        if filesystem::remove_if_empty(self.fs, &staging)
            && let Some(parent) = staging.parent()
        {
            filesystem::prune_empty_dirs(self.fs, parent, &ctx.root);
        }

        report.finalized = ctx.resolvers.finalize_matched();

        info!(
            "Extracted {}: {} files, {} records imported, {} dropped",
            report.manifest,
            report.files_extracted,
            report.records_imported,
            report.records_dropped.len()
        );
        Ok(report)
    }
}

/// Directory name for a package: its name with path separators and other
/// unsafe characters replaced, falling back to the uid
fn folder_name(manifest: &Manifest) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>()
            .trim()
            .to_string()
    };

    let name = clean(manifest.name().unwrap_or_default());
    if name.is_empty() || name.chars().all(|c| c == '.') {
        clean(manifest.uid().unwrap_or("package"))
    } else {
        name
    }
}
