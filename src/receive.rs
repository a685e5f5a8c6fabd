// src/receive.rs
//! Receive-side processing
//!
//! A package that arrives from another device carries instructions on
//! whether to import its content and whether to keep the archive afterwards.
//! Packages can also be deleted together with local content flagged
//! `deleteWithPackage`.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{
    ExtractReport, Extractor, ImportContext, LegacyArchiveAdapter, PackageExtractor,
    has_recognized_manifest, load_manifest,
};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::filesystem::FileSystem;
use crate::package::{ContentKind, ImportInstructions, Manifest};

/// What happened to a received package
#[derive(Debug, Clone)]
pub struct ReceiveOutcome {
    pub manifest: Manifest,
    pub instructions: ImportInstructions,
    /// Extraction report when the package was imported
    pub extraction: Option<ExtractReport>,
    /// Whether the archive was deleted afterwards
    pub deleted: bool,
    /// Action identifier to announce once processing is done
    pub action: Option<String>,
}

/// Process a received package according to its import instructions.
///
/// Packages without a recognized manifest are upgraded first and, having no
/// instructions of their own, are imported and kept.
pub fn process_received(
    config: &EngineConfig,
    fs: &dyn FileSystem,
    path: &Path,
    ctx: &mut ImportContext<'_>,
) -> Result<ReceiveOutcome> {
    if !has_recognized_manifest(fs, path) {
        LegacyArchiveAdapter::new(config, fs).upgrade(path)?;
    }

    let manifest = load_manifest(fs, path, false)?;
    let instructions = manifest.import_instructions();
    info!("Processing received package {} ({})", manifest, instructions);

    let extraction = if instructions.should_import() {
        Some(PackageExtractor::new(config, fs).extract_with_report(path, ctx)?)
    } else {
        debug!("Not importing {}", path.display());
        None
    };

    let deleted = instructions.should_delete()
        && match fs.delete(path) {
            Ok(()) => {
                info!("Deleted received package {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to delete received package {}: {}", path.display(), e);
                false
            }
        };

    let action = manifest.on_receive_action().map(str::to_string);
    let manifest = extraction
        .as_ref()
        .map(|report| report.manifest.clone())
        .unwrap_or(manifest);

    Ok(ReceiveOutcome {
        manifest,
        instructions,
        extraction,
        deleted,
        action,
    })
}

/// Result of deleting a package
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Local files removed along with the package
    pub removed_files: Vec<PathBuf>,
    /// Uids of records flagged for deletion; the caller owns the object store
    pub record_uids: Vec<String>,
    pub archive_deleted: bool,
    pub warnings: Vec<String>,
}

/// Delete a package archive and the local content flagged
/// `deleteWithPackage`
pub fn delete_package(manifest: &Manifest, fs: &dyn FileSystem) -> DeleteReport {
    let mut report = DeleteReport::default();

    for entry in manifest.contents.iter().filter(|e| e.delete_with_package()) {
        match entry.kind() {
            ContentKind::Record => {
                if let Some(uid) = entry.uid() {
                    report.record_uids.push(uid.to_string());
                }
            }
            ContentKind::File => {
                let Some(local) = entry.local_path() else {
                    continue;
                };
                if !fs.is_file(&local) {
                    continue;
                }
                match fs.delete(&local) {
                    Ok(()) => report.removed_files.push(local),
                    Err(e) => {
                        let message = format!("Failed to delete {}: {}", local.display(), e);
                        warn!("{}", message);
                        report.warnings.push(message);
                    }
                }
            }
        }
    }

    let archive = manifest.path();
    if fs.is_file(archive) {
        match fs.delete(archive) {
            Ok(()) => report.archive_deleted = true,
            Err(e) => {
                let message = format!("Failed to delete {}: {}", archive.display(), e);
                warn!("{}", message);
                report.warnings.push(message);
            }
        }
    }

    info!(
        "Deleted package {}: {} files, {} records to remove",
        manifest,
        report.removed_files.len(),
        report.record_uids.len()
    );
    report
}
