//! Local filesystem blob storage implementation
//!
//! Keys map directly onto relative paths under a configured base
//! directory. Public URLs are derived from a configured base URL, so
//! the derivation stays a pure string operation like an object-store
//! `getPublicUrl`.

use crate::blob::{join_url, BlobKey, BlobStorage};
use crate::config::BlobConfig;
use crate::error::{GalleryError, GalleryResult};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Local filesystem implementation of BlobStorage
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(config: &BlobConfig) -> Self {
        let base_path = PathBuf::from(&config.base_path);
        if !base_path.exists() {
            fs::create_dir_all(&base_path).expect("Failed to create blob storage directory");
        }
        info!("Using local blob storage directory: {}", base_path.display());
        Self {
            base_path,
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Resolve a key to its on-disk path, rejecting keys that would
    /// escape the base directory.
    fn key_path(&self, key: &str) -> GalleryResult<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return Err(GalleryError::Store(format!("invalid blob key: {}", key)));
        }
        Ok(self.base_path.join(key))
    }

    fn collect_keys(&self, dir: &Path, out: &mut Vec<BlobKey>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.base_path) {
                // Keys always use '/' separators regardless of platform
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl BlobStorage for LocalBlobStore {
    fn put(&self, key: &str, content: &[u8], content_type: &str) -> GalleryResult<String> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GalleryError::Store(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        fs::write(&path, content)
            .map_err(|e| GalleryError::Store(format!("failed to write {}: {}", key, e)))?;
        debug!("Stored blob {} ({} bytes, {})", key, content.len(), content_type);
        Ok(self.get_public_url(key))
    }

    fn get(&self, key: &str) -> GalleryResult<Vec<u8>> {
        let path = self.key_path(key)?;
        if !path.is_file() {
            return Err(GalleryError::NotFound(format!("blob not found: {}", key)));
        }
        fs::read(&path).map_err(|e| GalleryError::Store(format!("failed to read {}: {}", key, e)))
    }

    fn get_public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }

    fn exists(&self, key: &str) -> GalleryResult<bool> {
        Ok(self.key_path(key)?.is_file())
    }

    fn list(&self, prefix: &str) -> GalleryResult<Vec<BlobKey>> {
        let mut keys = Vec::new();
        if self.base_path.exists() {
            self.collect_keys(&self.base_path.clone(), &mut keys)
                .map_err(|e| GalleryError::Store(format!("failed to list blobs: {}", e)))?;
        }
        let wanted = format!("{}/", prefix.trim_end_matches('/'));
        keys.retain(|k| k.starts_with(&wanted));
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> GalleryResult<()> {
        let path = self.key_path(key)?;
        if !path.is_file() {
            warn!("Delete for missing blob key: {}", key);
            return Ok(());
        }
        fs::remove_file(&path)
            .map_err(|e| GalleryError::Store(format!("failed to delete {}: {}", key, e)))?;
        debug!("Deleted blob {}", key);
        Ok(())
    }
}
