//! Filesystem capability set
//!
//! The engines only ever talk to storage through [`Storage`]; paths are
//! absolute, `/`-separated virtual paths as produced by path resolution.

use std::io::{Read, Write};
use std::time::SystemTime;

use crate::error::StorageError;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create, truncating any previous content.
    Write,
    /// Create if missing, keep existing content and write at the end.
    Append,
}

/// Metadata of a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// An open file. Closing is dropping.
pub trait FileHandle: Read + Write + Send {
    /// Current size of the file in bytes.
    fn size(&self) -> u64;
}

/// The filesystem collaborator used by both engines.
pub trait Storage: Send {
    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn FileHandle>, StorageError>;

    fn metadata(&self, path: &str) -> Result<Metadata, StorageError>;

    fn exists(&self, path: &str) -> bool {
        self.metadata(path).is_ok()
    }

    fn remove(&self, path: &str) -> Result<(), StorageError>;

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    fn mkdir(&self, path: &str) -> Result<(), StorageError>;

    /// Removes an empty directory.
    fn rmdir(&self, path: &str) -> Result<(), StorageError>;

    fn list(&self, path: &str) -> Result<Vec<DirEntry>, StorageError>;
}
