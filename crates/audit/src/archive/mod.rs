//! Container-aware view of the source tree.
//!
//! Directories and zip archives are both containers. An archive found inside
//! another archive is itself a container, and so is a directory inside an
//! archive. Archives are read into memory once and listed from there; entry
//! names are never used to touch the filesystem.
//!
//! Listing is cheap: [`SourceNode::list`] returns unresolved children that
//! carry only a path or an entry index. Nothing is opened, sniffed or parsed
//! until the caller decides to [`resolve`](SourceNode::resolve) a child.

use crate::core::{AuditError, Result, MAX_IMAGE_SIZE};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::ZipArchive;

pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Largest archive, top-level or nested, read into memory.
pub const MAX_ARCHIVE_SIZE: u64 = 64 << 20;

#[inline]
pub fn is_zip_magic(header: &[u8]) -> bool {
    header.len() >= ZIP_MAGIC.len() && header[..ZIP_MAGIC.len()] == ZIP_MAGIC
}

#[derive(Debug, Clone)]
pub enum SourceNode {
    /// A filesystem path not yet opened.
    Pending {
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
    },
    File {
        path: PathBuf,
    },
    /// A zip archive, or a directory inside one when `prefix` is non-empty.
    Archive {
        display: PathBuf,
        archive: Arc<[u8]>,
        prefix: String,
    },
    /// An archive entry not yet opened.
    Entry {
        display: PathBuf,
        archive: Arc<[u8]>,
        index: usize,
    },
    /// A regular archive entry. Its payload is read on demand.
    Member {
        display: PathBuf,
        archive: Arc<[u8]>,
        index: usize,
    },
}

impl SourceNode {
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        Self::Pending { path: path.into() }
    }

    /// Opens and classifies a filesystem path.
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| AuditError::io(path, e))?;
        if metadata.is_dir() {
            return Ok(Self::Directory {
                path: path.to_path_buf(),
            });
        }

        if !has_zip_header(path)? {
            return Ok(Self::File {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path).map_err(|e| AuditError::io(path, e))?;
        let data = read_bounded(file, MAX_ARCHIVE_SIZE, path)?;
        Self::archive(path.to_path_buf(), data.into())
    }

    fn archive(display: PathBuf, archive: Arc<[u8]>) -> Result<Self> {
        ZipArchive::new(Cursor::new(Arc::clone(&archive)))
            .map_err(|e| AuditError::container(&display, e))?;
        Ok(Self::Archive {
            display,
            archive,
            prefix: String::new(),
        })
    }

    /// Opens an unresolved node. Resolved nodes are returned unchanged.
    pub fn resolve(self) -> Result<Self> {
        match self {
            Self::Pending { path } => Self::open(&path),
            Self::Entry {
                display,
                archive,
                index,
            } => resolve_entry(display, archive, index),
            resolved => Ok(resolved),
        }
    }

    /// Where this node appears in the tree. Archive members are shown as
    /// paths beneath their archive.
    pub fn display_path(&self) -> &Path {
        match self {
            Self::Pending { path } | Self::Directory { path } | Self::File { path } => path,
            Self::Archive { display, .. }
            | Self::Entry { display, .. }
            | Self::Member { display, .. } => display,
        }
    }

    /// Unresolved nodes are never containers.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Directory { .. } | Self::Archive { .. })
    }

    /// Children sorted by name, unresolved. Leaves have none.
    pub fn list(&self) -> Result<Vec<SourceNode>> {
        match self {
            Self::Directory { path } => list_directory(path),
            Self::Archive {
                display,
                archive,
                prefix,
            } => list_archive(display, archive, prefix),
            _ => Ok(Vec::new()),
        }
    }

    /// Full payload of a leaf, refused past [`MAX_IMAGE_SIZE`].
    pub fn read(&self) -> Result<Arc<[u8]>> {
        let limit = MAX_IMAGE_SIZE as u64;
        match self {
            Self::File { path } => {
                let file = File::open(path).map_err(|e| AuditError::io(path, e))?;
                read_bounded(file, limit, path).map(Arc::from)
            }
            Self::Member {
                display,
                archive,
                index,
            } => {
                let mut zip = ZipArchive::new(Cursor::new(Arc::clone(archive)))
                    .map_err(|e| AuditError::container(display, e))?;
                let entry = zip
                    .by_index(*index)
                    .map_err(|e| AuditError::container(display, e))?;
                read_bounded(entry, limit, display).map(Arc::from)
            }
            other => Err(AuditError::io(
                other.display_path(),
                std::io::Error::new(std::io::ErrorKind::Other, "not a resolved leaf"),
            )),
        }
    }
}

/// Reads all of `reader`, failing once more than `limit` bytes arrive.
fn read_bounded<R: Read>(reader: R, limit: u64, path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut data)
        .map_err(|e| AuditError::io(path, e))?;
    if data.len() as u64 > limit {
        return Err(AuditError::Oversized {
            path: path.to_path_buf(),
            limit,
        });
    }
    Ok(data)
}

fn has_zip_header(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|e| AuditError::io(path, e))?;
    let mut header = Vec::with_capacity(ZIP_MAGIC.len());
    file.take(ZIP_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(|e| AuditError::io(path, e))?;
    Ok(is_zip_magic(&header))
}

fn resolve_entry(display: PathBuf, archive: Arc<[u8]>, index: usize) -> Result<SourceNode> {
    let mut zip = ZipArchive::new(Cursor::new(Arc::clone(&archive)))
        .map_err(|e| AuditError::container(&display, e))?;
    let mut entry = zip
        .by_index(index)
        .map_err(|e| AuditError::container(&display, e))?;

    let mut header = Vec::with_capacity(ZIP_MAGIC.len());
    entry
        .by_ref()
        .take(ZIP_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(|e| AuditError::io(&display, e))?;

    if !is_zip_magic(&header) {
        return Ok(SourceNode::Member {
            display,
            archive,
            index,
        });
    }

    let nested = read_bounded(header.as_slice().chain(entry), MAX_ARCHIVE_SIZE, &display)?;
    SourceNode::archive(display, nested.into())
}

fn list_directory(path: &Path) -> Result<Vec<SourceNode>> {
    let mut children = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        children.push(SourceNode::pending(entry.path()));
    }
    Ok(children)
}

enum Child {
    Directory,
    Entry(usize),
}

fn list_archive(display: &Path, archive: &Arc<[u8]>, prefix: &str) -> Result<Vec<SourceNode>> {
    let mut zip = ZipArchive::new(Cursor::new(Arc::clone(archive)))
        .map_err(|e| AuditError::container(display, e))?;

    let mut children: BTreeMap<String, Child> = BTreeMap::new();
    for index in 0..zip.len() {
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| AuditError::container(display, e))?;
        let Some(rest) = entry.name().strip_prefix(prefix) else {
            continue;
        };

        match rest.split_once('/') {
            Some((dir, _)) if !dir.is_empty() => {
                children.insert(dir.to_string(), Child::Directory);
            }
            Some(_) => {}
            None if rest.is_empty() || entry.is_dir() => {}
            None => {
                children.insert(rest.to_string(), Child::Entry(index));
            }
        }
    }

    Ok(children
        .into_iter()
        .map(|(name, child)| {
            let display = display.join(&name);
            match child {
                Child::Directory => SourceNode::Archive {
                    display,
                    archive: Arc::clone(archive),
                    prefix: format!("{prefix}{name}/"),
                },
                Child::Entry(index) => SourceNode::Entry {
                    display,
                    archive: Arc::clone(archive),
                    index,
                },
            }
        })
        .collect())
}
