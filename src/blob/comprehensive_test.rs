//! Comprehensive tests exercising every BlobStorage backend through the
//! trait, so both implementations are held to the same contract.

use crate::blob::local_store::LocalBlobStore;
use crate::blob::mock_store::MockBlobStore;
use crate::blob::BlobStorage;
use crate::config::{BlobBackend, BlobConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn local_store(dir: &TempDir) -> Arc<dyn BlobStorage> {
    Arc::new(LocalBlobStore::new(&BlobConfig {
        backend: BlobBackend::Local,
        base_path: dir.path().to_string_lossy().to_string(),
        public_base_url: "http://localhost/files".to_string(),
        managed_prefix: "gallery".to_string(),
        backup_prefix: "backups".to_string(),
    }))
}

fn run_contract(store: Arc<dyn BlobStorage>, backend_name: &str) {
    let key = "gallery/contract-user/photo.png";

    assert!(
        !store.exists(key).unwrap(),
        "{}: key should not exist initially",
        backend_name
    );

    let url = store.put(key, b"pixels", "image/png").unwrap();
    assert!(
        url.ends_with("gallery/contract-user/photo.png"),
        "{}: url should be derived from the key",
        backend_name
    );
    assert_eq!(url, store.get_public_url(key), "{}: put url matches derivation", backend_name);

    assert!(store.exists(key).unwrap(), "{}: key exists after put", backend_name);
    assert_eq!(store.get(key).unwrap(), b"pixels", "{}: content round-trips", backend_name);

    // Overwrite is allowed
    store.put(key, b"pixels-v2", "image/png").unwrap();
    assert_eq!(store.get(key).unwrap(), b"pixels-v2", "{}: overwrite", backend_name);

    let listed = store.list("gallery").unwrap();
    assert!(listed.contains(&key.to_string()), "{}: listed under prefix", backend_name);
    let other = store.list("other-prefix").unwrap();
    assert!(other.is_empty(), "{}: foreign prefix is empty", backend_name);

    store.delete(key).unwrap();
    assert!(!store.exists(key).unwrap(), "{}: gone after delete", backend_name);
    assert!(store.get(key).is_err(), "{}: get after delete errors", backend_name);
    assert!(store.list("gallery").unwrap().is_empty(), "{}: list empty after delete", backend_name);
}

#[test]
fn test_blob_storage_contract_all_backends() {
    let dir = TempDir::new().unwrap();
    run_contract(local_store(&dir), "local");
    run_contract(Arc::new(MockBlobStore::new("http://mock/files")), "mock");
}

#[test]
fn test_public_url_derivation_is_pure() {
    let store = MockBlobStore::new("http://mock/files");
    // No put has happened, derivation must still work
    assert_eq!(
        store.get_public_url("gallery/u/missing.png"),
        "http://mock/files/gallery/u/missing.png"
    );
}
