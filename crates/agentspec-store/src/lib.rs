// ABOUTME: Persistence layer for agentspec documents and their component sidecars.
// ABOUTME: Writes atomically and reloads a document with its sidecar pre-registered.

pub mod document_store;

pub use document_store::{DocumentStore, StoreError, StoredPaths};
