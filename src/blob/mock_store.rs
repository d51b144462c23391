//! Mock implementation of BlobStorage trait for testing

use crate::blob::{join_url, BlobKey, BlobStorage};
use crate::error::{GalleryError, GalleryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct MockObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-memory implementation of BlobStorage for testing
pub struct MockBlobStore {
    objects: Arc<Mutex<HashMap<BlobKey, MockObject>>>,
    public_base_url: String,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBlobStore {
    /// Create a new mock blob store
    pub fn new(public_base_url: &str) -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            public_base_url: public_base_url.to_string(),
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Clear all data from the store (useful for test cleanup)
    pub fn clear(&self) {
        self.objects.lock().unwrap().clear();
    }

    /// Number of stored objects
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Make subsequent put calls fail, to exercise upload failure paths
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent delete calls fail, to exercise cleanup failure paths
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Plant an object directly, bypassing the upload pipeline. Used by
    /// tests to create orphaned blobs.
    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Content type recorded for a key, if present
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }
}

impl BlobStorage for MockBlobStore {
    fn put(&self, key: &str, content: &[u8], content_type: &str) -> GalleryResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GalleryError::Store("simulated put failure".to_string()));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(self.get_public_url(key))
    }

    fn get(&self, key: &str) -> GalleryResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| GalleryError::NotFound(format!("blob not found: {}", key)))
    }

    fn get_public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }

    fn exists(&self, key: &str) -> GalleryResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn list(&self, prefix: &str) -> GalleryResult<Vec<BlobKey>> {
        let wanted = format!("{}/", prefix.trim_end_matches('/'));
        let mut keys: Vec<BlobKey> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&wanted))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> GalleryResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(GalleryError::Store("simulated delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_blob_store_basic_operations() {
        let store = MockBlobStore::new("http://mock/files");
        assert_eq!(store.object_count(), 0);

        let url = store.put("gallery/u/x.png", b"data", "image/png").unwrap();
        assert_eq!(url, "http://mock/files/gallery/u/x.png");
        assert_eq!(store.object_count(), 1);
        assert!(store.exists("gallery/u/x.png").unwrap());
        assert_eq!(store.get("gallery/u/x.png").unwrap(), b"data");
        assert_eq!(store.content_type_of("gallery/u/x.png").unwrap(), "image/png");

        store.delete("gallery/u/x.png").unwrap();
        assert!(!store.exists("gallery/u/x.png").unwrap());

        // Deleting again is still fine
        store.delete("gallery/u/x.png").unwrap();
    }

    #[test]
    fn test_mock_blob_store_failure_injection() {
        let store = MockBlobStore::new("http://mock/files");
        store.set_fail_puts(true);
        assert!(store.put("gallery/u/x.png", b"data", "image/png").is_err());
        store.set_fail_puts(false);
        store.put("gallery/u/x.png", b"data", "image/png").unwrap();

        store.set_fail_deletes(true);
        assert!(store.delete("gallery/u/x.png").is_err());
        store.set_fail_deletes(false);
        store.delete("gallery/u/x.png").unwrap();
    }

    #[test]
    fn test_mock_blob_store_list_prefix() {
        let store = MockBlobStore::new("http://mock/files");
        store.insert_raw("gallery/u1/a.png", b"a");
        store.insert_raw("gallery/u2/b.png", b"b");
        store.insert_raw("backups/s.json", b"{}");

        let keys = store.list("gallery").unwrap();
        assert_eq!(keys, vec!["gallery/u1/a.png", "gallery/u2/b.png"]);
        // A key equal to the prefix plus other text must not leak in
        store.insert_raw("galleryx/c.png", b"c");
        let keys = store.list("gallery").unwrap();
        assert_eq!(keys.len(), 2);
    }
}
