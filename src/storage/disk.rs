//! Disk-backed storage rooted at a host directory.

use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::storage::filesystem::{DirEntry, FileHandle, Metadata, OpenMode, Storage};

/// Maps virtual `/a/b` paths below `root`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a virtual path onto the root, refusing anything that could
    /// step outside of it.
    fn real_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

struct DiskFile {
    file: File,
}

impl Read for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DiskFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl FileHandle for DiskFile {
    fn size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

fn not_found_or(err: io::Error, path: &str) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::IoError(err)
    }
}

impl Storage for DiskStorage {
    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn FileHandle>, StorageError> {
        let real = self.real_path(path)?;
        if real.is_dir() {
            return Err(StorageError::IsADirectory(path.to_string()));
        }
        debug!("Opening {} ({:?}) at {}", path, mode, real.display());
        let file = match mode {
            OpenMode::Read => File::open(&real),
            OpenMode::Write => File::create(&real),
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(&real),
        }
        .map_err(|e| not_found_or(e, path))?;
        Ok(Box::new(DiskFile { file }))
    }

    fn metadata(&self, path: &str) -> Result<Metadata, StorageError> {
        let real = self.real_path(path)?;
        let meta = fs::metadata(&real).map_err(|e| not_found_or(e, path))?;
        Ok(Metadata {
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        let real = self.real_path(path)?;
        if real.is_dir() {
            return Err(StorageError::IsADirectory(path.to_string()));
        }
        fs::remove_file(real).map_err(|e| not_found_or(e, path))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let real_from = self.real_path(from)?;
        let real_to = self.real_path(to)?;
        if real_to.exists() {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        fs::rename(real_from, real_to).map_err(|e| not_found_or(e, from))
    }

    fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        let real = self.real_path(path)?;
        if real.exists() {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        fs::create_dir(real).map_err(StorageError::from)
    }

    fn rmdir(&self, path: &str) -> Result<(), StorageError> {
        let real = self.real_path(path)?;
        if !real.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }
        if fs::read_dir(&real)?.next().is_some() {
            return Err(StorageError::NotEmpty(path.to_string()));
        }
        fs::remove_dir(real).map_err(StorageError::from)
    }

    fn list(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
        let real = self.real_path(path)?;
        if !real.is_dir() {
            return Err(if real.exists() {
                StorageError::NotADirectory(path.to_string())
            } else {
                StorageError::NotFound(path.to_string())
            });
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&real)?.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
