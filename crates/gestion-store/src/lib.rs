//! # gestion-store
//!
//! Adapters for the document database and the object store.
//!
//! - [`FirestoreDocumentStore`] / [`GcsObjectStore`]: Google Cloud, via REST
//! - [`LocalDocumentStore`] / [`LocalObjectStore`]: a directory on disk
//! - [`InMemoryDocumentStore`] / [`InMemoryObjectStore`]: tests

pub mod firestore;
pub mod gcs;
pub mod local;
pub mod memory;

pub use firestore::FirestoreDocumentStore;
pub use gcs::GcsObjectStore;
pub use local::{LocalDocumentStore, LocalObjectStore};
pub use memory::{InMemoryDocumentStore, InMemoryObjectStore};
