//! Mock implementation of RowStorage trait for testing

use crate::error::{GalleryError, GalleryResult};
use crate::rows::{
    compute_stats, matches_filter, AuditEntry, BackupRecord, GalleryFilter, GalleryItem,
    GalleryItemPatch, NewAuditEntry, NewGalleryItem, QueryResult, RowStorage, StorageStats,
};
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct MockTables {
    items: HashMap<String, GalleryItem>,
    audit: Vec<AuditEntry>,
    backups: Vec<BackupRecord>,
    next_audit_id: i64,
}

/// In-memory implementation of RowStorage for testing
pub struct MockRowStore {
    tables: Arc<Mutex<MockTables>>,
    fail_inserts: AtomicBool,
}

impl MockRowStore {
    /// Create a new mock row store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(MockTables::default())),
            fail_inserts: AtomicBool::new(false),
        }
    }

    /// Clear all tables (useful for test cleanup)
    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        *tables = MockTables::default();
    }

    /// Number of gallery item rows
    pub fn item_count(&self) -> usize {
        self.tables.lock().unwrap().items.len()
    }

    /// Number of audit log rows
    pub fn audit_count(&self) -> usize {
        self.tables.lock().unwrap().audit.len()
    }

    /// Make subsequent item inserts fail, to exercise the
    /// blob-put-succeeds/row-insert-fails path
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn sorted_for_query(mut rows: Vec<GalleryItem>) -> Vec<GalleryItem> {
        rows.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| Reverse(a.created_at).cmp(&Reverse(b.created_at)))
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }
}

impl Default for MockRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStorage for MockRowStore {
    fn insert_item(&self, item: &NewGalleryItem) -> GalleryResult<GalleryItem> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(GalleryError::RowStore("simulated insert failure".to_string()));
        }
        let now = Utc::now();
        let row = GalleryItem {
            id: Uuid::new_v4().to_string(),
            title: item.title.clone(),
            description: item.description.clone(),
            storage_path: item.storage_path.clone(),
            image_url: item.image_url.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            category: item.category,
            status: item.status,
            tags: item.tags.clone(),
            display_order: item.display_order,
            file_metadata: item.file_metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .unwrap()
            .items
            .insert(row.id.clone(), row.clone());
        Ok(row)
    }

    fn restore_item(&self, item: &GalleryItem) -> GalleryResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(GalleryError::RowStore("simulated insert failure".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.items.contains_key(&item.id) {
            return Err(GalleryError::RowStore(format!(
                "duplicate gallery item id: {}",
                item.id
            )));
        }
        tables.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn update_item(&self, id: &str, patch: &GalleryItemPatch) -> GalleryResult<GalleryItem> {
        let mut tables = self.tables.lock().unwrap();
        let item = tables
            .items
            .get_mut(id)
            .ok_or_else(|| GalleryError::NotFound(format!("gallery item not found: {}", id)))?;
        patch.apply(item, Utc::now());
        Ok(item.clone())
    }

    fn delete_item(&self, id: &str) -> GalleryResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GalleryError::NotFound(format!("gallery item not found: {}", id)))
    }

    fn get_item(&self, id: &str) -> GalleryResult<GalleryItem> {
        self.tables
            .lock()
            .unwrap()
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| GalleryError::NotFound(format!("gallery item not found: {}", id)))
    }

    fn find_by_storage_path(&self, storage_path: &str) -> GalleryResult<Option<GalleryItem>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .items
            .values()
            .find(|item| item.storage_path.as_deref() == Some(storage_path))
            .cloned())
    }

    fn query_items(
        &self,
        filter: &GalleryFilter,
        page: Option<(u64, u64)>,
    ) -> GalleryResult<QueryResult> {
        let matching: Vec<GalleryItem> = self
            .tables
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|item| matches_filter(item, filter))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let mut rows = Self::sorted_for_query(matching);
        if let Some((offset, limit)) = page {
            rows = rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
        }
        Ok(QueryResult { rows, total })
    }

    fn all_items(&self) -> GalleryResult<Vec<GalleryItem>> {
        let mut items: Vec<GalleryItem> =
            self.tables.lock().unwrap().items.values().cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    fn clear_items(&self) -> GalleryResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let count = tables.items.len() as u64;
        tables.items.clear();
        Ok(count)
    }

    fn insert_audit(&self, entry: &NewAuditEntry) -> GalleryResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.next_audit_id += 1;
        let id = tables.next_audit_id;
        tables.audit.push(AuditEntry {
            id,
            action: entry.action.clone(),
            item_id: entry.item_id.clone(),
            user_id: entry.user_id.clone(),
            detail: entry.detail.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn recent_audit(&self, limit: usize) -> GalleryResult<Vec<AuditEntry>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }

    fn insert_backup_record(&self, record: &BackupRecord) -> GalleryResult<()> {
        self.tables.lock().unwrap().backups.push(record.clone());
        Ok(())
    }

    fn list_backup_records(&self) -> GalleryResult<Vec<BackupRecord>> {
        let mut records = self.tables.lock().unwrap().backups.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    fn storage_stats(&self) -> GalleryResult<StorageStats> {
        let items = self.all_items()?;
        Ok(compute_stats(&items, Utc::now()))
    }
}
