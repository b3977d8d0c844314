//! Ingest pipeline and service facade for Depot.
//!
//! Every upload runs through [`IngestPipeline`]: extension policy, staging,
//! hashing, a per-hash duplicate check, path allocation, move into place,
//! and the index insert. [`Depot`] wraps the pipeline with listing,
//! retrieval, deletion and verification.

pub mod depot;
pub mod error;
pub mod locks;
pub mod pipeline;

pub use depot::{Depot, ListOrder};
pub use error::{IngestError, IngestResult};
pub use locks::{HashLockGuard, HashLocks};
pub use pipeline::{IngestPipeline, IngestStage, Ingested};
