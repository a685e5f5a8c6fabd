// src/commands/inspect.rs
//! Package inspection commands

use anyhow::{Context, Result};
use missionpack::{InspectedPackage, LocalFs, has_recognized_manifest};
use std::path::Path;

/// Print a package's manifest summary
pub fn cmd_inspect(archive: &str, entries: bool, json: bool) -> Result<()> {
    let fs = LocalFs::new();
    let path = Path::new(archive);

    let pkg = InspectedPackage::from_file(&fs, path)
        .with_context(|| format!("Failed to inspect {}", path.display()))?;

    if json {
        println!("{}", pkg.to_json()?);
    } else {
        print!("{}", pkg.render(entries));
    }
    Ok(())
}

/// Report whether an archive can be extracted natively
pub fn cmd_check(archive: &str) -> Result<()> {
    let fs = LocalFs::new();
    let path = Path::new(archive);

    if !path.is_file() {
        anyhow::bail!("Archive not found: {}", path.display());
    }

    if has_recognized_manifest(&fs, path) {
        println!("{}: mission package (manifest version 2)", path.display());
    } else {
        println!("{}: legacy archive (will be upgraded on extract)", path.display());
    }
    Ok(())
}
