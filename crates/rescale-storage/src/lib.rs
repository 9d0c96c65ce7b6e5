//! Rescale Storage Library
//!
//! Blob storage abstraction used by the pipeline, with implementations for
//! cloud object stores (GCS, S3) and the local filesystem.
//!
//! # Key layout
//!
//! Uploads land under a staging directory, e.g. `files/<uid>/assets/upload/<name>`.
//! Processed output is written to the sibling output directory with a timestamp
//! prefix: `files/<uid>/assets/images/<ISO-8601>_<name>`. Key derivation lives in
//! the `keys` module so every caller produces the same layout.

#[cfg(feature = "storage-cloud")]
pub mod cloud;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-cloud")]
pub use cloud::{CloudBlobStore, ReadAccess};
pub use factory::create_blob_store;
pub use keys::{scaled_object_key, validate_key};
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use rescale_core::StorageBackend;
pub use traits::{BlobStore, ObjectHandle, StorageError, StorageResult};
