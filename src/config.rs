//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use log::{info, warn};

/// Blob storage backend types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BlobBackend {
    Local,
    Mock,
}

impl Default for BlobBackend {
    fn default() -> Self {
        BlobBackend::Local
    }
}

/// Row storage backend types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RowBackend {
    SQLite,
    Mock,
}

impl Default for RowBackend {
    fn default() -> Self {
        RowBackend::SQLite
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Blob store configuration
    pub blob: BlobConfig,
    /// Row store configuration
    pub rows: RowConfig,
    /// Upload policy limits
    pub upload: UploadPolicy,
    /// Cleanup worker configuration
    pub cleanup: CleanupConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum payload size in bytes
    pub max_payload_size: u64,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Blob backend type
    pub backend: BlobBackend,
    /// Base path for the local backend
    pub base_path: String,
    /// Base URL public object URLs are derived from
    pub public_base_url: String,
    /// Key prefix this subsystem is allowed to create, scan and delete within
    pub managed_prefix: String,
    /// Key prefix backup snapshots are persisted under
    pub backup_prefix: String,
}

/// Row store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowConfig {
    /// Row backend type
    pub backend: RowBackend,
    /// SQLite database file path
    pub db_path: String,
}

/// Upload validation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum size of a single file in bytes
    pub max_file_size: u64,
    /// Maximum number of files in a batch
    pub max_files: usize,
    /// Maximum aggregate batch size in bytes
    pub max_batch_size: u64,
    /// Maximum in-flight uploads for a batch
    pub max_concurrent_uploads: usize,
    /// Maximum length of a sanitized filename stem
    pub max_name_length: usize,
}

/// Cleanup worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Enable the background cleanup worker
    pub enabled: bool,
    /// Interval between cleanup runs in seconds
    pub interval_secs: u64,
    /// Orphans younger than this are never reclaimed
    pub grace_period_secs: u64,
    /// Number of recent audit entries included in a backup snapshot
    pub backup_log_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Path to log configuration file
    pub config_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9720,
                workers: 4,
                max_payload_size: 52428800, // 50MB
            },
            blob: BlobConfig {
                backend: BlobBackend::Local,
                base_path: "./data/blobs".to_string(),
                public_base_url: "http://127.0.0.1:9720/files".to_string(),
                managed_prefix: "gallery".to_string(),
                backup_prefix: "backups".to_string(),
            },
            rows: RowConfig {
                backend: RowBackend::SQLite,
                db_path: "./data/gallery.db".to_string(),
            },
            upload: UploadPolicy::default(),
            cleanup: CleanupConfig {
                enabled: true,
                interval_secs: 3600,
                grace_period_secs: 86400,
                backup_log_limit: 100,
            },
            logging: LoggingConfig {
                config_file: "server_log.yaml".to_string(),
            },
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 20 * 1024 * 1024, // 20 MiB
            max_files: 20,
            max_batch_size: 100 * 1024 * 1024,
            max_concurrent_uploads: 4,
            max_name_length: 80,
        }
    }
}

impl AppConfig {
    /// Load configuration from file, use defaults if not found
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = "config.yaml";
        if Path::new(config_path).exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", config_path);
            Ok(config)
        } else {
            warn!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.blob.backend, BlobBackend::Local);
        assert_eq!(config.rows.backend, RowBackend::SQLite);
        assert_eq!(config.blob.managed_prefix, "gallery");
        assert_eq!(config.upload.max_file_size, 20 * 1024 * 1024);
        assert!(config.cleanup.grace_period_secs > 0);
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.blob.backend, config.blob.backend);
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.upload.max_files, config.upload.max_files);
    }
}
