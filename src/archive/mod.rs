// src/archive/mod.rs
//! Mission package archives
//!
//! A package is a zip container with the manifest stored first at
//! [`MANIFEST_PATH`], followed by one entry per content entry (named by its
//! entry key).
//!
//! - [`PackageBuilder`]: manifest + content -> archive, with merge-forward
//! - [`PackageExtractor`]: archive -> manifest, file dispatch, record import
//! - [`LegacyArchiveAdapter`]: rewrites archives without a usable manifest
//! - [`ArchiveFormatSelector`]: picks one of the two extractors

pub mod builder;
pub mod extractor;
pub mod legacy;
pub mod selector;

pub use builder::{BuildError, BuildReport, PackageBuilder};
pub use extractor::{ExtractReport, ImportContext, PackageExtractor};
pub use legacy::{EntryPolicy, IgnorePatterns, KeepAll, LegacyArchiveAdapter};
pub use selector::{ArchiveFormatSelector, has_recognized_manifest};

use std::io::Read;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::filesystem::{FileSystem, ReadSeek};
use crate::package::{MANIFEST_VERSION, Manifest};

/// Reserved folder for manifest data inside an archive
pub const MANIFEST_DIR: &str = "MANIFEST/";
/// Archive entry holding the manifest document
pub const MANIFEST_PATH: &str = "MANIFEST/manifest.xml";

/// Leading bytes of a zip local file header
pub(crate) const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

pub(crate) type PackageReader = ZipArchive<Box<dyn ReadSeek>>;

/// Extraction strategy chosen by [`ArchiveFormatSelector`]
pub trait Extractor {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Extract the package and report what happened
    fn extract_with_report(&self, path: &Path, ctx: &mut ImportContext<'_>)
    -> Result<ExtractReport>;

    /// Extract the package and return its manifest
    fn extract(&self, path: &Path, ctx: &mut ImportContext<'_>) -> Result<Manifest> {
        self.extract_with_report(path, ctx).map(|report| report.manifest)
    }
}

/// Open an archive for reading
pub(crate) fn open_archive(fs: &dyn FileSystem, path: &Path) -> Result<PackageReader> {
    let reader = fs.open_read(path)?;
    Ok(ZipArchive::new(reader)?)
}

/// Read one entry as UTF-8 text; `None` when the entry does not exist
pub(crate) fn read_entry_text(archive: &mut PackageReader, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(Some(text))
}

/// Raw manifest text of an archive, if it has a manifest entry
pub fn read_manifest_text(fs: &dyn FileSystem, path: &Path) -> Result<Option<String>> {
    let mut archive = open_archive(fs, path)?;
    read_entry_text(&mut archive, MANIFEST_PATH)
}

/// Whether a file starts with the zip local header signature
pub(crate) fn is_zip_file(fs: &dyn FileSystem, path: &Path) -> bool {
    let Ok(mut reader) = fs.open_read(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).is_ok() && magic == ZIP_MAGIC
}

/// Load and validate the manifest of a native package.
///
/// With `compute_sizes` set, entries present in the archive get their
/// `size`/`compressed_size` filled in.
pub fn load_manifest(fs: &dyn FileSystem, path: &Path, compute_sizes: bool) -> Result<Manifest> {
    let mut archive = open_archive(fs, path)?;
    let text = read_entry_text(&mut archive, MANIFEST_PATH)?
        .ok_or_else(|| Error::MissingManifest(path.to_path_buf()))?;

    let mut manifest = Manifest::from_text(&text)?;
    if manifest.version != MANIFEST_VERSION {
        return Err(Error::InvalidManifest(format!(
            "unsupported manifest version {} in {}",
            manifest.version,
            path.display()
        )));
    }
    if !manifest.is_valid() {
        return Err(Error::InvalidManifest(format!(
            "{} is missing a name or uid",
            path.display()
        )));
    }
    manifest.path = path.to_path_buf();

    if compute_sizes {
        let mut sizes = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            if !file.is_dir() {
                sizes.push((file.name().to_string(), file.size(), file.compressed_size()));
            }
        }
        manifest.apply_sizes(sizes.iter().map(|(n, s, c)| (n.as_str(), *s, *c)));
    }

    debug!("Loaded manifest {} from {}", manifest, path.display());
    Ok(manifest)
}

/// Manifest of a package with archive sizes filled in, or `None` if the
/// file is not a readable native package
pub fn get_manifest(fs: &dyn FileSystem, path: &Path) -> Option<Manifest> {
    match load_manifest(fs, path, true) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            debug!("No usable manifest in {}: {}", path.display(), e);
            None
        }
    }
}
