//! # herald-core
//!
//! Update model, cursor, configuration, error handling, and the request
//! gateway seam shared by the Herald transports and dispatcher.

pub mod config;
pub mod cursor;
pub mod error;
pub mod traits;
pub mod update;
