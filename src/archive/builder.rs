// src/archive/builder.rs
//! Package builder
//!
//! Streams a manifest and its resolved content into a zip archive at the
//! manifest's path. The manifest entry is written first. Content failures
//! are collected as warnings and the build carries on; only failures on the
//! output stream or the manifest entry abort it.
//!
//! When a package already exists at the target, it is copied aside and used
//! as a merge source: records whose live object can no longer be resolved
//! are copied forward from it byte for byte.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{MANIFEST_DIR, MANIFEST_PATH, PackageReader, is_zip_file, open_archive};
use crate::config::EngineConfig;
use crate::filesystem::{FileSystem, WriteSeek};
use crate::package::{ContentEntry, ContentKind, MANIFEST_VERSION, Manifest, ManifestError};
use crate::progress::{ProgressListener, ProgressMeter};
use crate::resolver::ContentResolver;

/// Files at least this large are written with zip64 extensions
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

type PackageWriter = ZipWriter<Box<dyn WriteSeek>>;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Manifest is invalid: {0}")]
    InvalidManifest(String),

    #[error("Manifest has no target path")]
    NoTarget,

    #[error("Failed to open output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write manifest entry: {0}")]
    ManifestWrite(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error while writing archive: {0}")]
    Io(#[from] io::Error),

    #[error("Build of {} cancelled after {entries_written} entries", path.display())]
    Cancelled { path: PathBuf, entries_written: usize },
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Path of the written archive
    pub path: PathBuf,
    /// Item-level problems, in the order they happened
    pub warnings: Vec<String>,
    /// Content entries written (the manifest entry is not counted)
    pub entries_written: usize,
}

impl BuildReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Deletes a temporary copy (and the directory made for it) when dropped
struct TempCopy<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
    dir: Option<PathBuf>,
}

impl Drop for TempCopy<'_> {
    fn drop(&mut self) {
        if self.fs.exists(&self.path)
            && let Err(e) = self.fs.delete(&self.path)
        {
            warn!("Failed to remove temporary copy {}: {}", self.path.display(), e);
        }
        if let Some(dir) = &self.dir {
            let _ = self.fs.remove_dir(dir);
        }
    }
}

/// Previous archive at the target, opened from its merge copy
struct MergeSource<'a> {
    archive: PackageReader,
    _copy: TempCopy<'a>,
}

enum Copied {
    Complete(u64),
    Cancelled(u64),
    ReadFailed(io::Error),
}

/// Builds mission package archives
pub struct PackageBuilder<'a> {
    config: &'a EngineConfig,
    fs: &'a dyn FileSystem,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(config: &'a EngineConfig, fs: &'a dyn FileSystem) -> Self {
        Self { config, fs }
    }

    /// Build the archive described by `manifest` at `manifest.path`.
    ///
    /// The builder works from a snapshot, so the caller's manifest is never
    /// touched. A cancelled build closes the output cleanly and leaves the
    /// partial archive in place.
    pub fn build(
        &self,
        manifest: &Manifest,
        resolver: &dyn ContentResolver,
        progress: &dyn ProgressListener,
    ) -> Result<BuildReport, BuildError> {
        let manifest = manifest.snapshot();
        if !manifest.is_valid() {
            return Err(BuildError::InvalidManifest(format!(
                "{} is missing a name or uid",
                manifest
            )));
        }
        if manifest.path.as_os_str().is_empty() {
            return Err(BuildError::NoTarget);
        }
        let target = manifest.path.clone();
        let mut warnings = Vec::new();

        info!("Building package {} at {}", manifest, target.display());

        let mut merge = self.open_merge_source(&target, &mut warnings);

        let output = self
            .fs
            .open_write(&target)
            .map_err(|source| BuildError::Output {
                path: target.clone(),
                source,
            })?;
        let mut zip = ZipWriter::new(output);
        zip.set_comment(format!(
            "{} mission package (manifest version {})",
            self.config.producer, MANIFEST_VERSION
        ));

        let total = manifest.total_estimated_size(self.fs, Some(resolver));
        let mut meter = ProgressMeter::new(progress, total);

        let text = manifest.to_text(true)?;
        zip.start_file(MANIFEST_PATH, Self::options(text.len() as u64))
            .map_err(|e| BuildError::ManifestWrite(e.to_string()))?;
        zip.write_all(text.as_bytes())
            .map_err(|e| BuildError::ManifestWrite(e.to_string()))?;
        meter.manifest_written();

        let mut entries_written = 0;
        for entry in manifest.contents.iter() {
            let written = if entry.entry_key.starts_with(MANIFEST_DIR) {
                push_warning(
                    &mut warnings,
                    format!("Skipping {}: reserved manifest path", entry.entry_key),
                );
                false
            } else {
                match entry.kind() {
                    ContentKind::File => {
                        self.write_file(&mut zip, entry, &target, &meter, &mut warnings)?
                    }
                    ContentKind::Record => self.write_record(
                        &mut zip,
                        entry,
                        resolver,
                        merge.as_mut(),
                        &meter,
                        &mut warnings,
                    )?,
                }
            };
            if written {
                entries_written += 1;
            }

            if meter.is_cancelled() {
                zip.finish()?;
                warn!(
                    "Build of {} cancelled after {} entries",
                    target.display(),
                    entries_written
                );
                return Err(BuildError::Cancelled {
                    path: target,
                    entries_written,
                });
            }
        }

        zip.finish()?;
        drop(merge);
        meter.finish();

        info!(
            "Built {} with {} entries ({} warnings)",
            target.display(),
            entries_written,
            warnings.len()
        );

        Ok(BuildReport {
            path: target,
            warnings,
            entries_written,
        })
    }

    fn options(size: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= LARGE_FILE_THRESHOLD)
    }

    /// Copy an existing target aside and open the copy for reading
    fn open_merge_source(
        &self,
        target: &Path,
        warnings: &mut Vec<String>,
    ) -> Option<MergeSource<'a>> {
        if !self.fs.is_file(target) {
            return None;
        }

        let merge_path = self.config.merge_path(target);
        if let Err(e) = self.fs.copy(target, &merge_path) {
            push_warning(
                warnings,
                format!("Failed to copy existing package {}: {}", target.display(), e),
            );
            return None;
        }
        let copy = TempCopy {
            fs: self.fs,
            path: merge_path,
            dir: None,
        };

        match open_archive(self.fs, &copy.path) {
            Ok(archive) => {
                debug!("Merging from previous package at {}", copy.path.display());
                Some(MergeSource {
                    archive,
                    _copy: copy,
                })
            }
            Err(e) => {
                push_warning(
                    warnings,
                    format!("Failed to open existing package {}: {}", target.display(), e),
                );
                None
            }
        }
    }

    fn write_file(
        &self,
        zip: &mut PackageWriter,
        entry: &ContentEntry,
        target: &Path,
        meter: &ProgressMeter<'_>,
        warnings: &mut Vec<String>,
    ) -> Result<bool, BuildError> {
        let Some(local_path) = entry.local_path() else {
            push_warning(
                warnings,
                format!("No local path for file entry {}", entry.entry_key),
            );
            return Ok(false);
        };
        if local_path == target {
            push_warning(
                warnings,
                format!("Skipping {}: package cannot contain itself", local_path.display()),
            );
            return Ok(false);
        }
        if !self.fs.is_file(&local_path) {
            push_warning(
                warnings,
                format!("File not found: {}", local_path.display()),
            );
            return Ok(false);
        }

        let staged = if self.is_container(&local_path) {
            match self.stage(&local_path) {
                Ok(copy) => Some(copy),
                Err(e) => {
                    push_warning(
                        warnings,
                        format!("Failed to stage {}: {}", local_path.display(), e),
                    );
                    return Ok(false);
                }
            }
        } else {
            None
        };
        let source = staged.as_ref().map_or(local_path.as_path(), |c| c.path.as_path());

        let mut reader = match self.fs.open_read(source) {
            Ok(reader) => reader,
            Err(e) => {
                push_warning(
                    warnings,
                    format!("Failed to open {}: {}", local_path.display(), e),
                );
                return Ok(false);
            }
        };
        let size = self.fs.len(source).unwrap_or(0);

        zip.start_file(entry.entry_key.as_str(), Self::options(size))?;
        match self.copy_chunks(&mut reader, zip, meter)? {
            Copied::Complete(bytes) => {
                debug!("Added {} ({} bytes)", entry.entry_key, bytes);
            }
            Copied::Cancelled(bytes) => {
                debug!("Cancelled while adding {} after {} bytes", entry.entry_key, bytes);
            }
            Copied::ReadFailed(e) => {
                zip.abort_file()?;
                push_warning(
                    warnings,
                    format!("Failed to read {}: {}", local_path.display(), e),
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn write_record(
        &self,
        zip: &mut PackageWriter,
        entry: &ContentEntry,
        resolver: &dyn ContentResolver,
        merge: Option<&mut MergeSource<'_>>,
        meter: &ProgressMeter<'_>,
        warnings: &mut Vec<String>,
    ) -> Result<bool, BuildError> {
        let estimate = Manifest::estimated_entry_size(entry, self.fs, Some(resolver));

        if let Some(text) = entry.uid().and_then(|uid| resolver.resolve(uid)) {
            zip.start_file(entry.entry_key.as_str(), Self::options(text.len() as u64))?;
            zip.write_all(text.as_bytes())?;
            meter.advance(estimate);
            debug!("Added record {}", entry.entry_key);
            return Ok(true);
        }

        if let Some(merge) = merge
            && let Ok(previous) = merge.archive.by_name(&entry.entry_key)
        {
            zip.raw_copy_file(previous)?;
            meter.advance(estimate);
            info!("Carried record {} forward from previous package", entry.entry_key);
            return Ok(true);
        }

        push_warning(
            warnings,
            format!(
                "Could not resolve record {} ({})",
                entry.entry_key,
                entry.uid().unwrap_or("no uid")
            ),
        );
        Ok(false)
    }

    /// Nested zip containers are copied to the temp dir before packaging
    fn is_container(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
            || is_zip_file(self.fs, path)
    }

    fn stage(&self, path: &Path) -> io::Result<TempCopy<'a>> {
        let dir = self
            .config
            .temp_dir()
            .join(format!("missionpack-{}", uuid::Uuid::new_v4()));
        self.fs.create_dir_all(&dir)?;
        let copy = TempCopy {
            fs: self.fs,
            path: dir.join(path.file_name().unwrap_or(path.as_os_str())),
            dir: Some(dir),
        };
        self.fs.copy(path, &copy.path)?;
        debug!("Staged {} at {}", path.display(), copy.path.display());
        Ok(copy)
    }

    fn copy_chunks(
        &self,
        reader: &mut dyn Read,
        zip: &mut PackageWriter,
        meter: &ProgressMeter<'_>,
    ) -> Result<Copied, BuildError> {
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];
        let mut copied = 0u64;

        loop {
            if meter.is_cancelled() {
                return Ok(Copied::Cancelled(copied));
            }
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(Copied::Complete(copied)),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Ok(Copied::ReadFailed(e)),
            };
            zip.write_all(&buf[..n])?;
            copied += n as u64;
            meter.advance(n as u64);
        }
    }
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
    use crate::progress::SilentProgress;
    use std::collections::HashMap;

    struct MapResolver(HashMap<String, String>);

    impl ContentResolver for MapResolver {
        fn resolve(&self, uid: &str) -> Option<String> {
            self.0.get(uid).cloned()
        }
    }

    fn record(uid: &str) -> String {
        format!("<event uid=\"{uid}\" type=\"a-f-G\"><point lat=\"1\" lon=\"2\"/></event>")
    }

    fn entry_names(fs: &MemoryFs, path: &Path) -> Vec<String> {
        let archive = open_archive(fs, path).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_manifest_is_first_entry() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/data/notes.txt"), b"hello").unwrap();

        let mut manifest = Manifest::new("Pkg", "pkg-1").with_path("/out/pkg.zip");
        manifest.add_file(Path::new("/data/notes.txt"));

        let config = EngineConfig::default();
        let report = PackageBuilder::new(&config, &fs)
            .build(&manifest, &MapResolver(HashMap::new()), &SilentProgress::new())
            .unwrap();

        assert_eq!(report.entries_written, 1);
        assert!(!report.has_warnings());
        let mut archive = open_archive(&fs, &report.path).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), MANIFEST_PATH);
        assert!(
            String::from_utf8_lossy(archive.comment()).contains("manifest version 2")
        );
    }

    #[test]
    fn test_missing_file_and_self_inclusion_warn() {
        let fs = MemoryFs::new();
        let mut manifest = Manifest::new("Pkg", "pkg-1").with_path("/out/pkg.zip");
        manifest.add_file(Path::new("/data/gone.txt"));
        manifest.add_file(Path::new("/out/pkg.zip"));

        let config = EngineConfig::default();
        let progress = SilentProgress::new();
        let report = PackageBuilder::new(&config, &fs)
            .build(&manifest, &MapResolver(HashMap::new()), &progress)
            .unwrap();

        assert_eq!(report.entries_written, 0);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(progress.percent(), 100);
        assert_eq!(entry_names(&fs, &report.path), vec![MANIFEST_PATH.to_string()]);
    }

    #[test]
    fn test_unresolved_record_is_carried_forward() {
        let fs = MemoryFs::new();
        let config = EngineConfig::default();
        let builder = PackageBuilder::new(&config, &fs);

        let mut manifest = Manifest::new("Pkg", "pkg-1").with_path("/out/pkg.zip");
        let key = manifest.add_record("r-1", Some("Alpha")).unwrap();

        let live = MapResolver(HashMap::from([("r-1".to_string(), record("r-1"))]));
        builder
            .build(&manifest, &live, &SilentProgress::new())
            .unwrap();

        let gone = MapResolver(HashMap::new());
        let report = builder
            .build(&manifest, &gone, &SilentProgress::new())
            .unwrap();

        assert!(report.warnings.is_empty());
        assert_eq!(report.entries_written, 1);
        assert!(!fs.exists(&config.merge_path(Path::new("/out/pkg.zip"))));

        let mut archive = open_archive(&fs, &report.path).unwrap();
        let mut text = String::new();
        archive.by_name(&key).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, record("r-1"));
    }

    #[test]
    fn test_nested_zip_is_staged() {
        let fs = MemoryFs::new();
        let config = EngineConfig {
            temp_dir: Some(PathBuf::from("/tmp")),
            ..EngineConfig::default()
        };
        let builder = PackageBuilder::new(&config, &fs);

        let inner = Manifest::new("Inner", "inner-1").with_path("/data/inner.zip");
        builder
            .build(&inner, &MapResolver(HashMap::new()), &SilentProgress::new())
            .unwrap();

        let mut outer = Manifest::new("Outer", "outer-1").with_path("/out/outer.zip");
        let key = outer.add_file(Path::new("/data/inner.zip")).unwrap();
        let report = builder
            .build(&outer, &MapResolver(HashMap::new()), &SilentProgress::new())
            .unwrap();

        assert!(entry_names(&fs, &report.path).contains(&key));
        assert!(fs.files().iter().all(|p| !p.starts_with("/tmp")));
        assert_eq!(load_manifest(&fs, &report.path, false).unwrap().uid(), Some("outer-1"));
    }

    /// Reader that fails once `limit` bytes have been served
    struct FailingReader {
        inner: Box<dyn crate::filesystem::ReadSeek>,
        served: usize,
        limit: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served >= self.limit {
                return Err(io::Error::other("disk error"));
            }
            let max = buf.len().min(self.limit - self.served);
            let n = self.inner.read(&mut buf[..max])?;
            self.served += n;
            Ok(n)
        }
    }

    impl io::Seek for FailingReader {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    /// MemoryFs whose reads of one path fail partway through
    struct FlakyFs {
        inner: MemoryFs,
        flaky: PathBuf,
        limit: usize,
    }

    impl FileSystem for FlakyFs {
        fn open_read(&self, path: &Path) -> io::Result<Box<dyn crate::filesystem::ReadSeek>> {
            let inner = self.inner.open_read(path)?;
            if path == self.flaky {
                Ok(Box::new(FailingReader {
                    inner,
                    served: 0,
                    limit: self.limit,
                }))
            } else {
                Ok(inner)
            }
        }

        fn open_write(&self, path: &Path) -> io::Result<Box<dyn crate::filesystem::WriteSeek>> {
            self.inner.open_write(path)
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.inner.is_file(path)
        }

        fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            self.inner.list(dir)
        }

        fn delete(&self, path: &Path) -> io::Result<()> {
            self.inner.delete(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            self.inner.remove_dir(path)
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.inner.rename(from, to)
        }

        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            self.inner.create_dir_all(path)
        }

        fn len(&self, path: &Path) -> io::Result<u64> {
            self.inner.len(path)
        }
    }

    #[test]
    fn test_read_failure_drops_partial_entry() {
        let fs = FlakyFs {
            inner: MemoryFs::new(),
            flaky: PathBuf::from("/data/big.bin"),
            limit: 2048,
        };
        fs.write(Path::new("/data/big.bin"), &[7u8; 10_000]).unwrap();
        fs.write(Path::new("/data/small.txt"), b"fine").unwrap();

        let mut manifest = Manifest::new("Pkg", "pkg-1").with_path("/out/pkg.zip");
        let big = manifest.add_file(Path::new("/data/big.bin")).unwrap();
        let small = manifest.add_file(Path::new("/data/small.txt")).unwrap();

        let config = EngineConfig {
            chunk_size: 1024,
            ..EngineConfig::default()
        };
        let report = PackageBuilder::new(&config, &fs)
            .build(&manifest, &MapResolver(HashMap::new()), &SilentProgress::new())
            .unwrap();

        assert_eq!(report.entries_written, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("big.bin"));

        let mut archive = open_archive(&fs, &report.path).unwrap();
        assert!(archive.index_for_name(&big).is_none());
        let mut text = String::new();
        archive.by_name(&small).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "fine");
    }

    #[test]
    fn test_invalid_manifest_and_missing_target() {
        let fs = MemoryFs::new();
        let config = EngineConfig::default();
        let builder = PackageBuilder::new(&config, &fs);
        let resolver = MapResolver(HashMap::new());

        let unnamed = Manifest::new("", "u").with_path("/out/a.zip");
        assert!(matches!(
            builder.build(&unnamed, &resolver, &SilentProgress::new()),
            Err(BuildError::InvalidManifest(_))
        ));

        let no_target = Manifest::new("n", "u");
        assert!(matches!(
            builder.build(&no_target, &resolver, &SilentProgress::new()),
            Err(BuildError::NoTarget)
        ));
    }
}
