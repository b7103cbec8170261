//! # Transcript Review Common Library
//!
//! Shared code for the transcript review service:
//! - Row model and the rows table schema
//! - Row Store queries (list, allow-listed partial update)
//! - Service variant and configuration types
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use config::{ServerConfig, Variant};
pub use error::{Error, Result};
