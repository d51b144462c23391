//! SQLite implementation of the RowStorage trait.
//!
//! Tags and file metadata are persisted as JSON text columns; timestamps
//! are stored as fixed-precision RFC 3339 strings so range predicates can
//! compare them lexicographically.

use crate::error::{GalleryError, GalleryResult};
use crate::rows::{
    compute_stats, AuditEntry, BackupRecord, GalleryFilter, GalleryItem, GalleryItemPatch,
    NewAuditEntry, NewGalleryItem, QueryResult, RowStorage, StorageStats,
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, title, description, storage_path, image_url, thumbnail_url, \
     category, status, tags, display_order, file_metadata, created_at, updated_at";

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the precision the text columns keep, so a
/// row read back compares equal to the row that was written.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_store_err(e: rusqlite::Error) -> GalleryError {
    GalleryError::RowStore(e.to_string())
}

/// SQLite implementation of RowStorage
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowStore {
    /// Open (or create) the database at the given path
    pub fn new(db_path: &str) -> GalleryResult<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GalleryError::RowStore(format!("failed to create {}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(db_path).map_err(row_store_err)?;
        Self::init(&conn)?;
        info!("Opened SQLite row store at {}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database, used by tests
    pub fn new_in_memory() -> GalleryResult<Self> {
        let conn = Connection::open_in_memory().map_err(row_store_err)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> GalleryResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS gallery_items (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                storage_path TEXT,
                image_url TEXT,
                thumbnail_url TEXT,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                tags TEXT NOT NULL,
                display_order INTEGER NOT NULL DEFAULT 0,
                file_metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_gallery_items_storage_path
                ON gallery_items(storage_path);
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action TEXT NOT NULL,
                item_id TEXT,
                user_id TEXT NOT NULL,
                detail TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS backup_catalog (
                id TEXT PRIMARY KEY,
                storage_path TEXT NOT NULL,
                backup_type TEXT NOT NULL,
                file_count INTEGER NOT NULL,
                total_size INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(row_store_err)
    }

    fn item_from_row(row: &Row) -> rusqlite::Result<GalleryItem> {
        let category: String = row.get(6)?;
        let status: String = row.get(7)?;
        let tags_json: String = row.get(8)?;
        let metadata_json: Option<String> = row.get(10)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;

        Ok(GalleryItem {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            storage_path: row.get(3)?,
            image_url: row.get(4)?,
            thumbnail_url: row.get(5)?,
            category: category.parse().unwrap_or_default(),
            status: status.parse().unwrap_or_default(),
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            display_order: row.get(9)?,
            file_metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: parse_ts(11, created_at)?,
            updated_at: parse_ts(12, updated_at)?,
        })
    }

    fn write_item(&self, item: &GalleryItem) -> GalleryResult<()> {
        let tags_json = serde_json::to_string(&item.tags)
            .map_err(|e| GalleryError::RowStore(e.to_string()))?;
        let metadata_json = item
            .file_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| GalleryError::RowStore(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO gallery_items (id, title, description, storage_path, image_url, \
             thumbnail_url, category, status, tags, display_order, file_metadata, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                item.id,
                item.title,
                item.description,
                item.storage_path,
                item.image_url,
                item.thumbnail_url,
                item.category.as_str(),
                item.status.as_str(),
                tags_json,
                item.display_order,
                metadata_json,
                ts(&item.created_at),
                ts(&item.updated_at),
            ],
        )
        .map_err(row_store_err)?;
        Ok(())
    }

    /// Build the WHERE clause and bound parameters for a filter
    fn build_where(filter: &GalleryFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(category) = filter.category {
            values.push(Box::new(category.as_str().to_string()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(from) = filter.date_from {
            values.push(Box::new(ts(&from)));
            clauses.push(format!("created_at >= ?{}", values.len()));
        }
        if let Some(to) = filter.date_to {
            values.push(Box::new(ts(&to)));
            clauses.push(format!("created_at <= ?{}", values.len()));
        }
        if let Some(search) = &filter.search {
            if !search.is_empty() {
                let pattern = format!("%{}%", search.to_lowercase());
                values.push(Box::new(pattern.clone()));
                let a = values.len();
                values.push(Box::new(pattern.clone()));
                let b = values.len();
                values.push(Box::new(pattern));
                let c = values.len();
                clauses.push(format!(
                    "(lower(title) LIKE ?{} OR lower(coalesce(description, '')) LIKE ?{} \
                     OR lower(tags) LIKE ?{})",
                    a, b, c
                ));
            }
        }
        if let Some(tags) = &filter.tags {
            if !tags.is_empty() {
                let mut tag_clauses = Vec::new();
                for tag in tags {
                    // Tags are stored as a JSON array, so an exact member
                    // match is a quoted substring of the lowered column.
                    values.push(Box::new(format!("%\"{}\"%", tag.to_lowercase())));
                    tag_clauses.push(format!("lower(tags) LIKE ?{}", values.len()));
                }
                clauses.push(format!("({})", tag_clauses.join(" OR ")));
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (where_sql, values)
    }
}

impl RowStorage for SqliteRowStore {
    fn insert_item(&self, item: &NewGalleryItem) -> GalleryResult<GalleryItem> {
        let now = now_micros();
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
        self.write_item(&row)?;
        Ok(row)
    }

    fn restore_item(&self, item: &GalleryItem) -> GalleryResult<()> {
        self.write_item(item)
    }

    fn update_item(&self, id: &str, patch: &GalleryItemPatch) -> GalleryResult<GalleryItem> {
        let mut item = self.get_item(id)?;
        patch.apply(&mut item, now_micros());

        let tags_json = serde_json::to_string(&item.tags)
            .map_err(|e| GalleryError::RowStore(e.to_string()))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE gallery_items SET title = ?1, description = ?2, thumbnail_url = ?3, \
             category = ?4, status = ?5, tags = ?6, display_order = ?7, updated_at = ?8 \
             WHERE id = ?9",
            params![
                item.title,
                item.description,
                item.thumbnail_url,
                item.category.as_str(),
                item.status.as_str(),
                tags_json,
                item.display_order,
                ts(&item.updated_at),
                id,
            ],
        )
        .map_err(row_store_err)?;
        Ok(item)
    }

    fn delete_item(&self, id: &str) -> GalleryResult<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute("DELETE FROM gallery_items WHERE id = ?1", params![id])
            .map_err(row_store_err)?;
        if affected == 0 {
            return Err(GalleryError::NotFound(format!("gallery item not found: {}", id)));
        }
        Ok(())
    }

    fn get_item(&self, id: &str) -> GalleryResult<GalleryItem> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM gallery_items WHERE id = ?1",
                ITEM_COLUMNS
            ))
            .map_err(row_store_err)?;
        stmt.query_row(params![id], Self::item_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    GalleryError::NotFound(format!("gallery item not found: {}", id))
                }
                other => row_store_err(other),
            })
    }

    fn find_by_storage_path(&self, storage_path: &str) -> GalleryResult<Option<GalleryItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM gallery_items WHERE storage_path = ?1 LIMIT 1",
                ITEM_COLUMNS
            ))
            .map_err(row_store_err)?;
        match stmt.query_row(params![storage_path], Self::item_from_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(row_store_err(e)),
        }
    }

    fn query_items(
        &self,
        filter: &GalleryFilter,
        page: Option<(u64, u64)>,
    ) -> GalleryResult<QueryResult> {
        let (where_sql, values) = Self::build_where(filter);
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let conn = self.conn.lock().unwrap();
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM gallery_items{}", where_sql),
                &param_refs[..],
                |row| row.get(0),
            )
            .map_err(row_store_err)?;

        let mut sql = format!(
            "SELECT {} FROM gallery_items{} ORDER BY display_order ASC, created_at DESC, id ASC",
            ITEM_COLUMNS, where_sql
        );
        if let Some((offset, limit)) = page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }

        let mut stmt = conn.prepare(&sql).map_err(row_store_err)?;
        let mapped = stmt
            .query_map(&param_refs[..], Self::item_from_row)
            .map_err(row_store_err)?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row.map_err(row_store_err)?);
        }
        Ok(QueryResult {
            rows,
            total: total as u64,
        })
    }

    fn all_items(&self) -> GalleryResult<Vec<GalleryItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM gallery_items ORDER BY created_at ASC, id ASC",
                ITEM_COLUMNS
            ))
            .map_err(row_store_err)?;
        let mapped = stmt.query_map([], Self::item_from_row).map_err(row_store_err)?;

        let mut items = Vec::new();
        for row in mapped {
            items.push(row.map_err(row_store_err)?);
        }
        Ok(items)
    }

    fn clear_items(&self) -> GalleryResult<u64> {
        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute("DELETE FROM gallery_items", [])
            .map_err(row_store_err)?;
        Ok(affected as u64)
    }

    fn insert_audit(&self, entry: &NewAuditEntry) -> GalleryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (action, item_id, user_id, detail, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.action,
                entry.item_id,
                entry.user_id,
                entry.detail,
                ts(&Utc::now()),
            ],
        )
        .map_err(row_store_err)?;
        Ok(())
    }

    fn recent_audit(&self, limit: usize) -> GalleryResult<Vec<AuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, action, item_id, user_id, detail, created_at FROM audit_log \
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(row_store_err)?;
        let mapped = stmt
            .query_map(params![limit as i64], |row| {
                let created_at: String = row.get(5)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    item_id: row.get(2)?,
                    user_id: row.get(3)?,
                    detail: row.get(4)?,
                    created_at: parse_ts(5, created_at)?,
                })
            })
            .map_err(row_store_err)?;

        let mut entries = Vec::new();
        for row in mapped {
            entries.push(row.map_err(row_store_err)?);
        }
        Ok(entries)
    }

    fn insert_backup_record(&self, record: &BackupRecord) -> GalleryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO backup_catalog (id, storage_path, backup_type, file_count, \
             total_size, status, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.storage_path,
                record.backup_type,
                record.file_count as i64,
                record.total_size as i64,
                record.status,
                record.created_by,
                ts(&record.created_at),
            ],
        )
        .map_err(row_store_err)?;
        Ok(())
    }

    fn list_backup_records(&self) -> GalleryResult<Vec<BackupRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, storage_path, backup_type, file_count, total_size, status, \
                 created_by, created_at FROM backup_catalog ORDER BY created_at DESC, id ASC",
            )
            .map_err(row_store_err)?;
        let mapped = stmt
            .query_map([], |row| {
                let file_count: i64 = row.get(3)?;
                let total_size: i64 = row.get(4)?;
                let created_at: String = row.get(7)?;
                Ok(BackupRecord {
                    id: row.get(0)?,
                    storage_path: row.get(1)?,
                    backup_type: row.get(2)?,
                    file_count: file_count as u64,
                    total_size: total_size as u64,
                    status: row.get(5)?,
                    created_by: row.get(6)?,
                    created_at: parse_ts(7, created_at)?,
                })
            })
            .map_err(row_store_err)?;

        let mut records = Vec::new();
        for row in mapped {
            records.push(row.map_err(row_store_err)?);
        }
        Ok(records)
    }

    fn storage_stats(&self) -> GalleryResult<StorageStats> {
        let items = self.all_items()?;
        Ok(compute_stats(&items, Utc::now()))
    }
}
