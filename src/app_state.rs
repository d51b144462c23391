//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use log::info;
use std::sync::Arc;

use crate::blob::{local_store::LocalBlobStore, mock_store::MockBlobStore, BlobStorage};
use crate::config::{AppConfig, BlobBackend, RowBackend};
use crate::error::{GalleryError, GalleryResult};
use crate::rows::{mock_store::MockRowStore, sqlite_store::SqliteRowStore, RowStorage};
use crate::service::backup_service::BackupService;
use crate::service::consistency::ConsistencyService;
use crate::service::gallery_service::GalleryService;
use crate::service::upload_service::UploadService;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub blob: Arc<dyn BlobStorage>,
    pub rows: Arc<dyn RowStorage>,
    pub upload_service: Arc<UploadService>,
    pub gallery_service: Arc<GalleryService>,
    pub consistency_service: Arc<ConsistencyService>,
    pub backup_service: Arc<BackupService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with services configured from YAML config
    pub fn new() -> GalleryResult<Self> {
        let config =
            AppConfig::load().map_err(|e| GalleryError::Config(e.to_string()))?;
        Self::from_config(config)
    }

    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> GalleryResult<Self> {
        info!("Initializing application state with configuration");

        let blob: Arc<dyn BlobStorage> = match config.blob.backend {
            BlobBackend::Local => {
                info!(
                    "Using local blob backend with base_path: {}, public_base_url: {}",
                    config.blob.base_path, config.blob.public_base_url
                );
                Arc::new(LocalBlobStore::new(&config.blob))
            }
            BlobBackend::Mock => {
                info!("Using mock blob backend");
                Arc::new(MockBlobStore::new(&config.blob.public_base_url))
            }
        };

        let rows: Arc<dyn RowStorage> = match config.rows.backend {
            RowBackend::SQLite => {
                info!(
                    "Using SQLite row backend with db_path: {}",
                    config.rows.db_path
                );
                Arc::new(SqliteRowStore::new(&config.rows.db_path)?)
            }
            RowBackend::Mock => {
                info!("Using mock row backend");
                Arc::new(MockRowStore::new())
            }
        };

        Ok(Self::wire(blob, rows, config))
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        let mut config = AppConfig::default();
        config.blob.backend = BlobBackend::Mock;
        config.rows.backend = RowBackend::Mock;
        config.cleanup.enabled = false;
        config.cleanup.grace_period_secs = 0;

        let blob: Arc<dyn BlobStorage> =
            Arc::new(MockBlobStore::new(&config.blob.public_base_url));
        let rows: Arc<dyn RowStorage> = Arc::new(MockRowStore::new());
        Self::wire(blob, rows, config)
    }

    fn wire(blob: Arc<dyn BlobStorage>, rows: Arc<dyn RowStorage>, config: AppConfig) -> Self {
        let upload_service = Arc::new(UploadService::new(
            blob.clone(),
            config.upload.clone(),
            &config.blob.managed_prefix,
        ));
        let gallery_service = Arc::new(GalleryService::new(blob.clone(), rows.clone()));
        let consistency_service = Arc::new(ConsistencyService::new(
            blob.clone(),
            rows.clone(),
            &config.blob.managed_prefix,
            config.cleanup.grace_period_secs,
        ));
        let backup_service = Arc::new(BackupService::new(
            blob.clone(),
            rows.clone(),
            &config.blob.backup_prefix,
            config.cleanup.backup_log_limit,
        ));

        info!("Application state initialized successfully");
        Self {
            blob,
            rows,
            upload_service,
            gallery_service,
            consistency_service,
            backup_service,
            config,
        }
    }
}
