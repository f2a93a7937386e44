//! Utility functions
//!
//! Provides timer and network helpers.

pub mod network;
pub mod timer;

pub use timer::Deadline;
