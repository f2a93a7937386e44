//! Server middleware
//!
//! Provides logging helpers shared by both engines.

pub mod logging;
