//! In-memory storage.
//!
//! A cloneable handle onto a shared tree of files and directories. Clones
//! see the same content, so a test (or host) can keep one handle while the
//! engine owns another.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::storage::filesystem::{DirEntry, FileHandle, Metadata, OpenMode, Storage};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    modified: SystemTime,
}

type Tree = BTreeMap<String, Entry>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tree: Arc<Mutex<Tree>>,
}

/// Normalises to `/a/b` form without a trailing slash.
fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

fn lock(tree: &Mutex<Tree>) -> MutexGuard<'_, Tree> {
    // poisoning is ignored: every mutation is a single map update
    tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_dir(tree: &Tree, path: &str) -> bool {
    path == "/" || matches!(tree.get(path), Some(Entry { node: Node::Dir, .. }))
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file with the given content.
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        self.insert_file_at(path, content, SystemTime::now());
    }

    pub fn insert_file_at(&self, path: &str, content: &[u8], modified: SystemTime) {
        let mut tree = lock(&self.tree);
        tree.insert(
            normalize(path),
            Entry {
                node: Node::File(content.to_vec()),
                modified,
            },
        );
    }

    /// Returns a copy of a file's content.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match lock(&self.tree).get(&normalize(path)) {
            Some(Entry {
                node: Node::File(data),
                ..
            }) => Some(data.clone()),
            _ => None,
        }
    }
}

struct MemoryFile {
    tree: Arc<Mutex<Tree>>,
    path: String,
    position: usize,
    append: bool,
}

impl MemoryFile {
    fn missing(&self) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("{} was removed", self.path))
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let tree = lock(&self.tree);
        let Some(Entry {
            node: Node::File(data),
            ..
        }) = tree.get(&self.path)
        else {
            return Err(self.missing());
        };
        let start = self.position.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position = start + n;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = lock(&self.tree);
        let Some(entry) = tree.get_mut(&self.path) else {
            return Err(self.missing());
        };
        let Node::File(data) = &mut entry.node else {
            return Err(self.missing());
        };
        if self.append {
            self.position = data.len();
        }
        let end = self.position + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.position..end].copy_from_slice(buf);
        self.position = end;
        entry.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileHandle for MemoryFile {
    fn size(&self) -> u64 {
        match lock(&self.tree).get(&self.path) {
            Some(Entry {
                node: Node::File(data),
                ..
            }) => data.len() as u64,
            _ => 0,
        }
    }
}

impl Storage for MemoryStorage {
    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn FileHandle>, StorageError> {
        let path = normalize(path);
        let mut tree = lock(&self.tree);

        if is_dir(&tree, &path) {
            return Err(StorageError::IsADirectory(path));
        }
        match mode {
            OpenMode::Read => {
                if !tree.contains_key(&path) {
                    return Err(StorageError::NotFound(path));
                }
            }
            OpenMode::Write | OpenMode::Append => {
                if !is_dir(&tree, parent_of(&path)) {
                    return Err(StorageError::NotFound(parent_of(&path).to_string()));
                }
                let truncate = mode == OpenMode::Write || !tree.contains_key(&path);
                if truncate {
                    tree.insert(
                        path.clone(),
                        Entry {
                            node: Node::File(Vec::new()),
                            modified: SystemTime::now(),
                        },
                    );
                }
            }
        }
        drop(tree);

        Ok(Box::new(MemoryFile {
            tree: Arc::clone(&self.tree),
            path,
            position: 0,
            append: mode == OpenMode::Append,
        }))
    }

    fn metadata(&self, path: &str) -> Result<Metadata, StorageError> {
        let path = normalize(path);
        if path == "/" {
            return Ok(Metadata {
                is_dir: true,
                size: 0,
                modified: SystemTime::UNIX_EPOCH,
            });
        }
        let tree = lock(&self.tree);
        let entry = tree.get(&path).ok_or(StorageError::NotFound(path.clone()))?;
        Ok(match &entry.node {
            Node::File(data) => Metadata {
                is_dir: false,
                size: data.len() as u64,
                modified: entry.modified,
            },
            Node::Dir => Metadata {
                is_dir: true,
                size: 0,
                modified: entry.modified,
            },
        })
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path);
        let mut tree = lock(&self.tree);
        match tree.get(&path) {
            Some(Entry {
                node: Node::File(_),
                ..
            }) => {
                tree.remove(&path);
                Ok(())
            }
            Some(_) => Err(StorageError::IsADirectory(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from = normalize(from);
        let to = normalize(to);
        let mut tree = lock(&self.tree);

        if !tree.contains_key(&from) {
            return Err(StorageError::NotFound(from));
        }
        if tree.contains_key(&to) || to == "/" {
            return Err(StorageError::AlreadyExists(to));
        }
        if !is_dir(&tree, parent_of(&to)) || to.starts_with(&format!("{}/", from)) {
            return Err(StorageError::InvalidPath(to));
        }

        // move the node and, for directories, everything below it
        let prefix = format!("{}/", from);
        let moved: Vec<String> = tree
            .keys()
            .filter(|k| **k == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(entry) = tree.remove(&key) {
                let new_key = format!("{}{}", to, &key[from.len()..]);
                tree.insert(new_key, entry);
            }
        }
        Ok(())
    }

    fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path);
        let mut tree = lock(&self.tree);
        if path == "/" || tree.contains_key(&path) {
            return Err(StorageError::AlreadyExists(path));
        }
        if !is_dir(&tree, parent_of(&path)) {
            return Err(StorageError::NotFound(parent_of(&path).to_string()));
        }
        tree.insert(
            path,
            Entry {
                node: Node::Dir,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn rmdir(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path);
        let mut tree = lock(&self.tree);
        if path == "/" || !is_dir(&tree, &path) {
            return Err(StorageError::NotADirectory(path));
        }
        let prefix = format!("{}/", path);
        if tree.keys().any(|k| k.starts_with(&prefix)) {
            return Err(StorageError::NotEmpty(path));
        }
        tree.remove(&path);
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
        let path = normalize(path);
        let tree = lock(&self.tree);
        if !is_dir(&tree, &path) {
            return Err(if tree.contains_key(&path) {
                StorageError::NotADirectory(path)
            } else {
                StorageError::NotFound(path)
            });
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        Ok(tree
            .iter()
            .filter_map(|(key, entry)| {
                let name = key.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                let (is_dir, size) = match &entry.node {
                    Node::File(data) => (false, data.len() as u64),
                    Node::Dir => (true, 0),
                };
                Some(DirEntry {
                    name: name.to_string(),
                    is_dir,
                    size,
                    modified: entry.modified,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_content() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();

        let mut file = storage.open("/a.txt", OpenMode::Write).unwrap();
        file.write_all(b"abc").unwrap();
        drop(file);

        assert_eq!(handle.read_file("/a.txt"), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_write_truncates_append_extends() {
        let storage = MemoryStorage::new();
        storage.insert_file("/f", b"0123456789");

        let mut file = storage.open("/f", OpenMode::Append).unwrap();
        file.write_all(b"ab").unwrap();
        assert_eq!(file.size(), 12);
        drop(file);

        storage.open("/f", OpenMode::Write).unwrap();
        assert_eq!(storage.read_file("/f"), Some(Vec::new()));
    }

    #[test]
    fn test_read_in_chunks() {
        let storage = MemoryStorage::new();
        storage.insert_file("/data.bin", &[7u8; 10]);

        let mut file = storage.open("/data.bin", OpenMode::Read).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 4);
        assert_eq!(file.read(&mut buf).unwrap(), 4);
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.open("/nodir/f", OpenMode::Write),
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.mkdir("/nodir/sub").is_err());
    }

    #[test]
    fn test_list_only_direct_children() {
        let storage = MemoryStorage::new();
        storage.mkdir("/dir").unwrap();
        storage.insert_file("/dir/inner.txt", b"x");
        storage.insert_file("/top.txt", b"xy");

        let mut names: Vec<(String, bool)> = storage
            .list("/")
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![("dir".to_string(), true), ("top.txt".to_string(), false)]
        );
        assert_eq!(storage.list("/dir").unwrap().len(), 1);
        assert!(matches!(storage.list("/top.txt"), Err(StorageError::NotADirectory(_))));
    }

    #[test]
    fn test_rename_moves_directory_contents() {
        let storage = MemoryStorage::new();
        storage.mkdir("/old").unwrap();
        storage.insert_file("/old/f.txt", b"1");

        storage.rename("/old", "/new").unwrap();
        assert!(!storage.exists("/old"));
        assert_eq!(storage.read_file("/new/f.txt"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let storage = MemoryStorage::new();
        storage.insert_file("/a", b"1");
        storage.insert_file("/b", b"2");
        assert!(matches!(
            storage.rename("/a", "/b"),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_rmdir_requires_empty() {
        let storage = MemoryStorage::new();
        storage.mkdir("/d").unwrap();
        storage.insert_file("/d/x", b"");
        assert!(matches!(storage.rmdir("/d"), Err(StorageError::NotEmpty(_))));
        storage.remove("/d/x").unwrap();
        storage.rmdir("/d").unwrap();
        assert!(!storage.exists("/d"));
    }
}
