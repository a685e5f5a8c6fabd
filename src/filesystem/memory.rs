// src/filesystem/memory.rs

//! In-memory filesystem
//!
//! Files live in a `BTreeMap` keyed by path; directories are tracked
//! explicitly and every ancestor of a written file is registered as one.
//! Writers buffer their content and publish it on `flush` and on drop, so a
//! reader opened mid-write sees the last flushed state.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{FileSystem, ReadSeek, WriteSeek};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_ancestors(&mut self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(dir))
            || self.dirs.iter().any(|p| p.parent() == Some(dir))
    }
}

/// [`FileSystem`] held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Tree>> {
        self.tree
            .lock()
            .map_err(|_| io::Error::other("memory filesystem lock poisoned"))
    }

    /// All file paths currently stored, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .map(|tree| tree.files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

/// Buffered writer that publishes into the tree on flush and drop
struct MemoryWriter {
    path: PathBuf,
    buffer: Cursor<Vec<u8>>,
    tree: Arc<Mutex<Tree>>,
}

impl MemoryWriter {
    fn commit(&self) -> io::Result<()> {
        let mut tree = self
            .tree
            .lock()
            .map_err(|_| io::Error::other("memory filesystem lock poisoned"))?;
        tree.files
            .insert(self.path.clone(), self.buffer.get_ref().clone());
        Ok(())
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}

impl FileSystem for MemoryFs {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        let tree = self.lock()?;
        let data = tree.files.get(path).cloned().ok_or_else(|| not_found(path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        let mut tree = self.lock()?;
        if tree.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("is a directory: {}", path.display()),
            ));
        }
        tree.add_ancestors(path);
        tree.files.insert(path.to_path_buf(), Vec::new());

        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            buffer: Cursor::new(Vec::new()),
            tree: Arc::clone(&self.tree),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock()
            .map(|tree| tree.files.contains_key(path) || tree.dirs.contains(path))
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock()
            .map(|tree| tree.files.contains_key(path))
            .unwrap_or(false)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.lock()?;
        if !tree.dirs.contains(dir) {
            return Err(not_found(dir));
        }
        let mut children: Vec<PathBuf> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        children.sort();
        Ok(children)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock()?;
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        if tree.has_children(path) {
            return Err(io::Error::other(format!(
                "directory not empty: {}",
                path.display()
            )));
        }
        tree.dirs.remove(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut tree = self.lock()?;
        let data = tree.files.remove(from).ok_or_else(|| not_found(from))?;
        tree.add_ancestors(to);
        tree.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock()?;
        if tree.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            ));
        }
        tree.add_ancestors(path);
        tree.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        let tree = self.lock()?;
        tree.files
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_write_then_read() {
        let fs = MemoryFs::new();
        let path = Path::new("/pkg/data.bin");

        fs.write(path, b"abc").unwrap();
        assert!(fs.is_file(path));
        assert!(fs.exists(Path::new("/pkg")));
        assert_eq!(fs.len(path).unwrap(), 3);

        let mut buf = String::new();
        fs.open_read(path).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "abc");
    }

    #[test]
    fn test_writer_commits_on_drop() {
        let fs = MemoryFs::new();
        let path = Path::new("/out.zip");
        {
            let mut writer = fs.open_write(path).unwrap();
            writer.write_all(b"partial").unwrap();
        }
        assert_eq!(fs.read(path).unwrap(), b"partial");
    }

    #[test]
    fn test_list_direct_children_only() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/a/one.txt"), b"1").unwrap();
        fs.write(Path::new("/a/b/two.txt"), b"2").unwrap();

        let children = fs.list(Path::new("/a")).unwrap();
        assert_eq!(
            children,
            vec![PathBuf::from("/a/b"), PathBuf::from("/a/one.txt")]
        );
    }

    #[test]
    fn test_remove_dir_requires_empty() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/a/one.txt"), b"1").unwrap();
        assert!(fs.remove_dir(Path::new("/a")).is_err());

        fs.delete(Path::new("/a/one.txt")).unwrap();
        fs.remove_dir(Path::new("/a")).unwrap();
        assert!(!fs.exists(Path::new("/a")));
    }

    #[test]
    fn test_rename_replaces_destination() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/x"), b"new").unwrap();
        fs.write(Path::new("/y"), b"old").unwrap();

        fs.rename(Path::new("/x"), Path::new("/y")).unwrap();
        assert!(!fs.exists(Path::new("/x")));
        assert_eq!(fs.read(Path::new("/y")).unwrap(), b"new");
    }
}
