use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Streaming SHA-256 of a file, as a lowercase hex string. Used for the
/// backup integrity manifest; reads in 64KB chunks so large photos never
/// sit in memory whole.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sha256_known_vector() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.jpg");
        fs::write(&path, b"hello world").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_detects_divergence() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, b"original").unwrap();
        fs::write(&b, b"tampered").unwrap();

        assert_ne!(sha256_file(&a).unwrap(), sha256_file(&b).unwrap());
    }

    #[test]
    fn test_sha256_missing_file() {
        assert!(sha256_file(Path::new("/nonexistent/photo.jpg")).is_err());
    }
}
