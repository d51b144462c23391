//! Backup and restore
//!
//! Snapshots are self-contained JSON documents written through the blob
//! store under a prefix of their own, outside the managed gallery prefix
//! so the orphan reclaimer can never touch them. Each snapshot is also
//! recorded in the backup catalog relation.

use crate::blob::BlobStorage;
use crate::error::{GalleryError, GalleryResult};
use crate::rows::{AuditEntry, BackupRecord, GalleryItem, NewAuditEntry, RowStorage};
use crate::service::user_context::UserContext;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Snapshot document format version. Bumped on breaking layout changes;
/// restore refuses snapshots from a different version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Schedule class a snapshot belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    Manual,
    Daily,
    Weekly,
    Monthly,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Manual => "manual",
            BackupType::Daily => "daily",
            BackupType::Weekly => "weekly",
            BackupType::Monthly => "monthly",
        }
    }
}

impl FromStr for BackupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(BackupType::Manual),
            "daily" => Ok(BackupType::Daily),
            "weekly" => Ok(BackupType::Weekly),
            "monthly" => Ok(BackupType::Monthly),
            _ => Err(format!("unknown backup type: {}", s)),
        }
    }
}

/// A complete, self-contained backup document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub items: Vec<GalleryItem>,
    pub logs: Vec<AuditEntry>,
    pub timestamp: DateTime<Utc>,
    pub backup_type: BackupType,
    pub created_by: String,
    pub version: u32,
}

/// Outcome of a restore pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restored: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

/// Backup service over an injected blob/row store pair
pub struct BackupService {
    blob: Arc<dyn BlobStorage>,
    rows: Arc<dyn RowStorage>,
    backup_prefix: String,
    log_limit: usize,
}

impl BackupService {
    pub fn new(
        blob: Arc<dyn BlobStorage>,
        rows: Arc<dyn RowStorage>,
        backup_prefix: &str,
        log_limit: usize,
    ) -> Self {
        Self {
            blob,
            rows,
            backup_prefix: backup_prefix.trim_matches('/').to_string(),
            log_limit,
        }
    }

    /// Snapshot every gallery row plus recent audit entries into a JSON
    /// document, persist it, and record it in the backup catalog.
    pub fn create_backup(
        &self,
        backup_type: BackupType,
        context: &UserContext,
    ) -> GalleryResult<BackupRecord> {
        let timestamp = Utc::now();
        let snapshot = BackupSnapshot {
            items: self.rows.all_items()?,
            logs: self.rows.recent_audit(self.log_limit)?,
            timestamp,
            backup_type,
            created_by: context.user_id.clone(),
            version: SNAPSHOT_VERSION,
        };

        let body = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| GalleryError::Store(format!("failed to serialize snapshot: {}", e)))?;
        let storage_path = format!(
            "{}/{}-{}.json",
            self.backup_prefix,
            backup_type.as_str(),
            timestamp.format("%Y%m%dT%H%M%S%3fZ")
        );
        self.blob.put(&storage_path, &body, "application/json")?;

        let record = BackupRecord {
            id: uuid::Uuid::new_v4().to_string(),
            storage_path: storage_path.clone(),
            backup_type: backup_type.as_str().to_string(),
            file_count: snapshot.items.len() as u64,
            total_size: body.len() as u64,
            status: "completed".to_string(),
            created_by: context.user_id.clone(),
            created_at: timestamp,
        };
        self.rows.insert_backup_record(&record)?;
        self.rows.insert_audit(&NewAuditEntry {
            action: "backup".to_string(),
            item_id: None,
            user_id: context.user_id.clone(),
            detail: format!(
                "{} backup of {} items written to {}",
                backup_type.as_str(),
                record.file_count,
                storage_path
            ),
        })?;

        info!(
            "Backup {} wrote {} items ({} bytes) to {}",
            record.id, record.file_count, record.total_size, record.storage_path
        );
        Ok(record)
    }

    /// Fetch and parse a stored snapshot without applying it.
    pub fn load_backup(&self, storage_path: &str) -> GalleryResult<BackupSnapshot> {
        let body = self.blob.get(storage_path)?;
        let snapshot: BackupSnapshot = serde_json::from_slice(&body)
            .map_err(|e| GalleryError::Store(format!("invalid backup snapshot: {}", e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(GalleryError::Store(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Replace the gallery dataset with a snapshot's contents. The
    /// current rows are cleared first; rows that fail to re-insert are
    /// counted and reported rather than aborting the rest of the pass.
    pub fn restore_from_backup(
        &self,
        storage_path: &str,
        context: &UserContext,
    ) -> GalleryResult<RestoreReport> {
        let snapshot = self.load_backup(storage_path)?;

        let cleared = self.rows.clear_items()?;
        info!(
            "Restore from {}: cleared {} rows, applying {}",
            storage_path,
            cleared,
            snapshot.items.len()
        );

        let mut restored = 0u64;
        let mut failed = 0u64;
        let mut errors = Vec::new();
        for item in &snapshot.items {
            match self.rows.restore_item(item) {
                Ok(()) => restored += 1,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("{}: {}", item.id, e));
                }
            }
        }
        if failed > 0 {
            warn!(
                "Restore from {} completed with {} failed rows",
                storage_path, failed
            );
        }

        self.rows.insert_audit(&NewAuditEntry {
            action: "restore".to_string(),
            item_id: None,
            user_id: context.user_id.clone(),
            detail: format!(
                "restore from {}: {} restored, {} failed",
                storage_path, restored, failed
            ),
        })?;

        Ok(RestoreReport {
            restored,
            failed,
            errors,
        })
    }

    /// Catalog of recorded snapshots, newest first.
    pub fn list_backups(&self) -> GalleryResult<Vec<BackupRecord>> {
        self.rows.list_backup_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::mock_store::MockBlobStore;
    use crate::rows::mock_store::MockRowStore;
    use crate::rows::NewGalleryItem;

    fn service() -> (Arc<MockBlobStore>, Arc<MockRowStore>, BackupService) {
        let blob = Arc::new(MockBlobStore::new("http://mock/files"));
        let rows = Arc::new(MockRowStore::new());
        let service = BackupService::new(blob.clone(), rows.clone(), "backups", 100);
        (blob, rows, service)
    }

    fn ctx() -> UserContext {
        UserContext::new("ops".to_string())
    }

    fn seed(rows: &MockRowStore, title: &str) -> GalleryItem {
        rows.insert_item(&NewGalleryItem {
            title: title.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_backup_writes_snapshot_and_catalog_row() {
        let (blob, rows, service) = service();
        seed(&rows, "a");
        seed(&rows, "b");

        let record = service.create_backup(BackupType::Daily, &ctx()).unwrap();
        assert!(record.storage_path.starts_with("backups/daily-"));
        assert_eq!(record.file_count, 2);
        assert_eq!(record.status, "completed");
        assert!(blob.exists(&record.storage_path).unwrap());

        let catalog = service.list_backups().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, record.id);

        let snapshot = service.load_backup(&record.storage_path).unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.backup_type, BackupType::Daily);
        assert_eq!(snapshot.created_by, "ops");
    }

    #[test]
    fn test_restore_round_trip_preserves_rows() {
        let (_, rows, service) = service();
        let a = seed(&rows, "keep-a");
        let b = seed(&rows, "keep-b");
        let record = service.create_backup(BackupType::Manual, &ctx()).unwrap();

        // dataset drifts after the snapshot
        rows.clear_items().unwrap();
        seed(&rows, "post-snapshot noise");

        let report = service
            .restore_from_backup(&record.storage_path, &ctx())
            .unwrap();
        assert_eq!(report.restored, 2);
        assert_eq!(report.failed, 0);

        // exactly the snapshot rows, identity intact
        assert_eq!(rows.item_count(), 2);
        assert_eq!(rows.get_item(&a.id).unwrap(), a);
        assert_eq!(rows.get_item(&b.id).unwrap(), b);
    }

    #[test]
    fn test_restore_counts_failed_rows_without_aborting() {
        let (blob, rows, service) = service();
        let item = seed(&rows, "dup");
        let mut snapshot = service
            .load_backup(
                &service
                    .create_backup(BackupType::Manual, &ctx())
                    .unwrap()
                    .storage_path,
            )
            .unwrap();
        // A duplicated id makes the second insert fail
        snapshot.items.push(item.clone());
        let body = serde_json::to_vec(&snapshot).unwrap();
        blob.insert_raw("backups/hand-crafted.json", &body);

        let report = service
            .restore_from_backup("backups/hand-crafted.json", &ctx())
            .unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains(&item.id));
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let (blob, rows, service) = service();
        seed(&rows, "a");
        let record = service.create_backup(BackupType::Manual, &ctx()).unwrap();
        let mut snapshot = service.load_backup(&record.storage_path).unwrap();
        snapshot.version = 99;
        blob.insert_raw(
            "backups/future.json",
            &serde_json::to_vec(&snapshot).unwrap(),
        );

        let err = service
            .restore_from_backup("backups/future.json", &ctx())
            .unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version"));
        // the existing dataset was not cleared
        assert_eq!(rows.item_count(), 1);
    }

    #[test]
    fn test_restore_of_missing_snapshot_is_not_found() {
        let (_, rows, service) = service();
        seed(&rows, "a");
        let err = service
            .restore_from_backup("backups/never-existed.json", &ctx())
            .unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
        assert_eq!(rows.item_count(), 1);
    }
}
