//! Rescale Document Store Library
//!
//! The pipeline notifies the record that initiated an upload by writing the final
//! artifact URL into it. This crate provides the `DocumentStore` abstraction and
//! backends for Firestore (REST) and a local JSON directory.
//!
//! Document paths follow the Firestore layout: alternating collection and document
//! ids, e.g. `messages/m1` or `rooms/r1/messages/m1`.

pub mod factory;
#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "local")]
pub mod local;
pub mod traits;

pub use factory::create_document_store;
#[cfg(feature = "firestore")]
pub use firestore::{FirestoreAuth, FirestoreDocumentStore};
#[cfg(feature = "local")]
pub use local::LocalDocumentStore;
pub use rescale_core::DocumentBackend;
pub use traits::{
    validate_document_path, DocumentError, DocumentResult, DocumentStore, Fields,
};
