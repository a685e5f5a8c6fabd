// src/filesystem/local.rs

//! Host filesystem implementation

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{FileSystem, ReadSeek, WriteSeek};

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(fs::File::create(path)?))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)? {
            children.push(entry?.path());
        }
        children.sort();
        Ok(children)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if let Some(parent) = to.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let path = temp_dir.path().join("a/b/c.txt");

        fs.write(&path, b"hello").unwrap();
        assert!(fs.is_file(&path));
        assert_eq!(fs.len(&path).unwrap(), 5);
        assert_eq!(fs.read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_list_and_rename() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");

        fs.write(&a, b"1").unwrap();
        fs.rename(&a, &b).unwrap();

        let children = fs.list(temp_dir.path()).unwrap();
        assert_eq!(children, vec![b.clone()]);
        fs.delete(&b).unwrap();
        assert!(!fs.exists(&b));
    }
}
