//! Storage capability for the blobgate server.
//!
//! Exposes a two-operation [`BlobStore`] trait (streaming `put` and `get`)
//! and a production implementation backed by [`object_store`], selected by
//! URL scheme at construction time:
//!
//! - `file:///path` — local filesystem
//! - `s3://bucket/prefix` — Amazon S3 (credentials from the environment)
//! - `az://container/prefix` — Azure Blob Storage (credentials from the
//!   environment; workload identity first, then the default chain)
//! - `memory:///` — in-memory, for tests
//!
//! Both operations move bytes as a chunk stream so memory use stays bounded
//! regardless of blob size.

mod config;
mod error;
mod storage;

pub use config::{default_blob_store_path, BlobStorageConfig};
pub use error::{BlobError, BlobResult};
pub use storage::{BlobStore, GetBlob, ObjectStoreBlobStorage, PutOptions, PutResult};
