// src/commands/build.rs
//! Package build command

use anyhow::{Context, Result};
use missionpack::{
    BuildError, ContentResolver, DirectoryResolver, EngineConfig, FileSystem, ImportInstructions,
    LocalFs, Manifest, PackageBuilder,
};
use std::path::{Path, PathBuf};
use tracing::info;

use super::progress::BarProgress;

/// Resolver used when no records directory is given
struct NoRecords;

impl ContentResolver for NoRecords {
    fn resolve(&self, _uid: &str) -> Option<String> {
        None
    }
}

/// Build a package from local files and a directory of records
#[allow(clippy::too_many_arguments)]
pub fn cmd_build(
    config: &EngineConfig,
    name: &str,
    uid: Option<String>,
    remarks: Option<String>,
    output: &str,
    records: Option<String>,
    files: &[String],
    no_import: bool,
    delete_on_receive: bool,
) -> Result<()> {
    let fs = LocalFs::new();
    let output = absolute(Path::new(output))?;

    let mut manifest = match uid {
        Some(uid) => Manifest::new(name, &uid),
        None => Manifest::with_random_uid(name),
    }
    .with_path(&output);
    if let Some(remarks) = remarks {
        manifest.set_parameter(missionpack::package::manifest::PARAM_REMARKS, remarks);
    }
    manifest.set_import_instructions(ImportInstructions::from_flags(
        !no_import,
        delete_on_receive,
    ));

    for file in files {
        let path = absolute(Path::new(file))?;
        if !fs.is_file(&path) {
            anyhow::bail!("Not a file: {}", path.display());
        }
        manifest.add_file(&path);
    }

    let directory;
    let resolver: &dyn ContentResolver = match &records {
        Some(dir) => {
            directory = DirectoryResolver::new(dir, &fs);
            for uid in directory.uids() {
                manifest.add_record(&uid, None);
            }
            &directory
        }
        None => &NoRecords,
    };

    if manifest.is_empty() {
        anyhow::bail!("Nothing to package: give files and/or --records");
    }
    info!("Building {}", manifest);

    let progress = BarProgress::new(&format!("Building {}", name));
    let report = match PackageBuilder::new(config, &fs).build(&manifest, resolver, &progress) {
        Ok(report) => report,
        Err(e @ BuildError::Cancelled { .. }) => {
            progress.abandon();
            return Err(e).context("Build cancelled; partial archive left in place");
        }
        Err(e) => {
            progress.abandon();
            return Err(e).with_context(|| format!("Failed to build {}", output.display()));
        }
    };
    progress.finish("done");

    println!("Built {}", report.path.display());
    println!("  uid: {}", manifest.uid().unwrap_or_default());
    println!("  entries: {}", report.entries_written);
    if report.has_warnings() {
        println!("  warnings:");
        for warning in &report.warnings {
            println!("    - {}", warning);
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}
