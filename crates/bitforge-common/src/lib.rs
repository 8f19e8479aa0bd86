//! Bitforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across bitforge:
//!
//! - **Internal IDs**: Random identifiers used to name every derivative artifact
//! - **File Categories**: Extension-based classification of bitstreams
//! - **Checksums**: Streaming SHA-256 digests of files on disk
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use bitforge_common::{FileCategory, InternalId};
//! use bitforge_common::paths::classify;
//! use std::path::Path;
//!
//! let id = InternalId::new();
//! assert_eq!(id.shard().len(), 2);
//!
//! assert_eq!(classify(Path::new("scan.TIF")), FileCategory::Image);
//! ```

pub mod checksum;
pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
