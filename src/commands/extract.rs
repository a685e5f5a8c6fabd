// src/commands/extract.rs
//! Package extraction command

use anyhow::{Context, Result};
use missionpack::archive::{EntryPolicy, IgnorePatterns, KeepAll};
use missionpack::{
    ArchiveFormatSelector, DirectoryImporter, EngineConfig, ImportContext, LocalFs,
};
use std::path::Path;
use tracing::info;

/// Folder under the extraction root that receives records
const RECORDS_FOLDER: &str = "records";

/// Extract a package under `root`; records land in `<root>/records`
pub fn cmd_extract(
    config: &EngineConfig,
    archive: &str,
    root: &str,
    ignore: &[String],
) -> Result<()> {
    let fs = LocalFs::new();
    let archive = Path::new(archive);
    let root = Path::new(root);

    if !archive.is_file() {
        anyhow::bail!("Archive not found: {}", archive.display());
    }
    // Fail early on bad patterns rather than when a legacy archive shows up
    IgnorePatterns::new(ignore).context("Invalid --ignore pattern")?;

    let selector = ArchiveFormatSelector::new(config, &fs).with_policy(|| {
        if ignore.is_empty() {
            return Box::new(KeepAll) as Box<dyn EntryPolicy>;
        }
        match IgnorePatterns::new(ignore) {
            Ok(policy) => Box::new(policy),
            Err(_) => Box::new(KeepAll),
        }
    });
    let extractor = selector.select(archive);
    info!("Extracting {} with the {} extractor", archive.display(), extractor.name());

    let mut importer = DirectoryImporter::new(root.join(RECORDS_FOLDER), &fs);
    let mut ctx = ImportContext::new(root, &mut importer);
    let report = extractor
        .extract_with_report(archive, &mut ctx)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;

    println!("Extracted {}", report.manifest);
    println!("  files: {}", report.files_extracted);
    if report.files_extracted > report.files_dispatched {
        println!("  staged in: {}", report.staging_dir.display());
    }
    println!(
        "  records: {} imported into {}",
        report.records_imported,
        root.join(RECORDS_FOLDER).display()
    );
    if !report.records_dropped.is_empty() {
        println!("  dropped records: {}", report.records_dropped.join(", "));
    }
    if !report.warnings.is_empty() {
        println!("  warnings:");
        for warning in &report.warnings {
            println!("    - {}", warning);
        }
    }

    Ok(())
}
