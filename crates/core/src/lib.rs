//! Core domain types and shared logic for the Depot file store.
//!
//! This crate defines the data model used across all other crates:
//! - Content hashes and incremental hashing
//! - Object identifiers and their shard layout
//! - The persisted object record
//! - Upload filename policy
//! - Configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod object_id;
pub mod policy;
pub mod record;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use object_id::ObjectId;
pub use policy::{ExtensionPolicy, Rejection, extension_of};
pub use record::ObjectRecord;
