// src/filesystem/mod.rs

//! Filesystem access for the archive engine
//!
//! The builder, extractor and legacy adapter never touch `std::fs` directly;
//! they go through the [`FileSystem`] trait so callers can substitute an
//! alternate storage layer. Two implementations ship with the crate:
//! - `LocalFs`: the host filesystem
//! - `MemoryFs`: an in-memory tree, used heavily by tests

mod local;
mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Readable, seekable handle (zip readers need random access)
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Writable, seekable handle (zip writers patch local headers)
pub trait WriteSeek: Write + Seek + Send {}
impl<T: Write + Seek + Send> WriteSeek for T {}

/// Storage operations used by the engine
pub trait FileSystem: Send + Sync {
    /// Open an existing file for reading
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>>;

    /// Create or truncate a file for writing, creating parent directories
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>>;

    /// Whether anything (file or directory) exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Whether a regular file exists at `path`
    fn is_file(&self, path: &Path) -> bool;

    /// Direct children of a directory
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Delete a file
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Move a file, replacing any existing destination
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Size of a file in bytes
    fn len(&self, path: &Path) -> io::Result<u64>;

    /// Copy a file, returning the number of bytes copied
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let mut reader = self.open_read(from)?;
        let mut writer = self.open_write(to)?;
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        Ok(copied)
    }

    /// Read a whole file into memory
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write a whole file
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut writer = self.open_write(path)?;
        writer.write_all(data)?;
        writer.flush()
    }
}

/// Remove `dir` and then each parent up to (not including) `stop`, as long
/// as each one is empty. Returns how many directories were removed.
pub fn prune_empty_dirs(fs: &dyn FileSystem, dir: &Path, stop: &Path) -> usize {
    let mut removed = 0;
    let mut current = Some(dir);

    while let Some(path) = current {
        if path == stop || !path.starts_with(stop) || !fs.exists(path) {
            break;
        }
        match fs.list(path) {
            Ok(children) if children.is_empty() => {
                if fs.remove_dir(path).is_err() {
                    break;
                }
                removed += 1;
            }
            _ => break,
        }
        current = path.parent();
    }

    removed
}

/// Remove empty directories below `dir` (depth first), then `dir` itself if
/// it ended up empty. Returns true if `dir` was removed.
pub fn remove_if_empty(fs: &dyn FileSystem, dir: &Path) -> bool {
    let Ok(children) = fs.list(dir) else {
        return false;
    };

    let mut remaining = children.len();
    for child in children {
        if !fs.is_file(&child) && remove_if_empty(fs, &child) {
            remaining -= 1;
        }
    }

    remaining == 0 && fs.remove_dir(dir).is_ok()
}
