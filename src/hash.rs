// src/hash.rs

//! SHA-256 helpers for content addressing
//!
//! File content entries are keyed by a digest of their original local path,
//! so adding the same local file twice (or across rebuilds) lands on the
//! same entry key. Whole-archive digests are shown by package inspection.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Compute the SHA-256 of a byte slice as lowercase hex
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Digest used as the directory component of a file entry key
#[inline]
pub fn path_digest(path: &str) -> String {
    sha256(path.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let mut cursor = io::Cursor::new(&data);
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256(&data));
    }

    #[test]
    fn test_path_digest_is_stable() {
        assert_eq!(path_digest("/sdcard/a.kml"), path_digest("/sdcard/a.kml"));
        assert_ne!(path_digest("/sdcard/a.kml"), path_digest("/sdcard/b.kml"));
    }
}
