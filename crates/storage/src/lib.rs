//! File storage for Depot.
//!
//! This crate provides:
//! - Chunked SHA-256 digests over files and streams
//! - Sharded path allocation for new objects
//! - A staging area with drop-guarded temporary files
//! - Removal of committed object files and a guard for unrecorded ones

pub mod allocator;
pub mod digest;
pub mod error;
pub mod objects;
pub mod staging;
pub mod traits;

pub use allocator::{Allocation, IdSource, PathAllocator};
pub use digest::HashStore;
pub use error::{StorageError, StorageResult};
pub use objects::{PlacedObject, remove_object};
pub use staging::{StagedFile, StagingArea};
pub use traits::{ByteStream, bytes_stream, reader_stream};
