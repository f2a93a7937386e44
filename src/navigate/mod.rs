//! Navigate module
//!
//! Resolves command parameters against the working directory of a
//! control session.

mod operations;

pub use operations::{parent_of, resolve_directory, resolve_path};
