//! Blob Storage Layer Abstraction
//!
//! This module provides an abstraction over blob storage backends,
//! allowing the system to use different implementations (local files,
//! object-storage buckets, in-memory mocks) without affecting the
//! higher-level services.

pub mod local_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use crate::error::GalleryResult;

/// Blob key type
pub type BlobKey = String;

/// Trait defining the blob storage interface
///
/// Per-key atomicity is the backend's responsibility; this subsystem
/// performs no client-side locking around blob operations.
pub trait BlobStorage: Send + Sync {
    /// Store content under a key and return its public URL
    fn put(&self, key: &str, content: &[u8], content_type: &str) -> GalleryResult<String>;

    /// Retrieve the content stored under a key
    fn get(&self, key: &str) -> GalleryResult<Vec<u8>>;

    /// Derive the public URL for a key. Pure derivation, no I/O.
    fn get_public_url(&self, key: &str) -> String;

    /// Check whether a key currently resolves to stored content
    fn exists(&self, key: &str) -> GalleryResult<bool>;

    /// List all keys under a prefix
    fn list(&self, prefix: &str) -> GalleryResult<Vec<BlobKey>>;

    /// Delete the content stored under a key. Deleting a missing key is
    /// not an error, matching object-store delete semantics.
    fn delete(&self, key: &str) -> GalleryResult<()>;
}

/// Join a base URL and a key without doubling separators.
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
