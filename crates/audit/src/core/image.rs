//! Program images and their content fingerprints.
//!
//! An image is whatever byte payload was found at a leaf of the source tree.
//! Format recognition beyond basic sanity is left to the console at attach
//! time, so a payload that merely fails to run still produces an outcome.

use crate::core::error::{AuditError, Result};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Largest payload accepted as a program image.
pub const MAX_IMAGE_SIZE: usize = 1 << 20;

/// SHA-256 of an image payload. Images with equal fingerprints are the same
/// audit subject.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    name: String,
    path: PathBuf,
    data: Arc<[u8]>,
    fingerprint: Fingerprint,
}

impl Image {
    /// Builds an image from a payload found at `path` (which may be a path
    /// inside a container).
    pub fn from_bytes(path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let path = path.into();
        let data = data.into();

        if data.is_empty() {
            return Err(AuditError::Image {
                path,
                reason: "empty payload".to_string(),
            });
        }
        if data.len() > MAX_IMAGE_SIZE {
            return Err(AuditError::Image {
                path,
                reason: format!(
                    "payload of {} bytes exceeds the {} byte limit",
                    data.len(),
                    MAX_IMAGE_SIZE
                ),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self {
            name,
            fingerprint: Fingerprint::of(&data),
            path,
            data,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| AuditError::io(path, e))?;
        Self::from_bytes(path, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_payloads_share_fingerprint() {
        let a = Image::from_bytes("roms/a.bin", b"TRC1\x00".to_vec()).unwrap();
        let b = Image::from_bytes("other/b.bin", b"TRC1\x00".to_vec()).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.name(), "a.bin");
        assert_eq!(b.name(), "b.bin");
    }

    #[test]
    fn test_fingerprint_renders_as_hex() {
        let fp = Fingerprint::of(b"");
        assert_eq!(
            fp.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fp.short(), "e3b0c442");
    }

    #[test]
    fn test_empty_payload_is_structural_error() {
        let err = Image::from_bytes("roms/empty.bin", Vec::new()).unwrap_err();
        assert!(matches!(err, AuditError::Image { .. }));
        assert!(err.to_string().contains("empty payload"));
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let err = Image::from_bytes("big.bin", vec![0u8; MAX_IMAGE_SIZE + 1]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
