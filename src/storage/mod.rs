//! File system storage
//!
//! The filesystem collaborator interface and its disk and in-memory
//! implementations.

pub mod disk;
pub mod filesystem;
pub mod memory;

pub use disk::DiskStorage;
pub use filesystem::{DirEntry, FileHandle, Metadata, OpenMode, Storage};
pub use memory::MemoryStorage;
