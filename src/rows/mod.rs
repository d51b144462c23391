//! Row Storage Layer Abstraction
//!
//! This module provides an abstraction over row storage backends for the
//! `gallery_items`, `audit_log` and `backup_catalog` relations, allowing
//! the system to use different implementations (SQLite, in-memory mocks)
//! without affecting the higher-level services.

pub mod mock_store;
pub mod sqlite_store;


use crate::error::GalleryResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Item identifier type. Server-assigned, immutable.
pub type ItemId = String;

/// Gallery item categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GalleryCategory {
    General,
    Event,
    Partner,
    Team,
    Venue,
}

impl Default for GalleryCategory {
    fn default() -> Self {
        GalleryCategory::General
    }
}

impl GalleryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryCategory::General => "general",
            GalleryCategory::Event => "event",
            GalleryCategory::Partner => "partner",
            GalleryCategory::Team => "team",
            GalleryCategory::Venue => "venue",
        }
    }
}

impl FromStr for GalleryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(GalleryCategory::General),
            "event" => Ok(GalleryCategory::Event),
            "partner" => Ok(GalleryCategory::Partner),
            "team" => Ok(GalleryCategory::Team),
            "venue" => Ok(GalleryCategory::Venue),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

/// Gallery item lifecycle status. Drives default-filtered read visibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GalleryStatus {
    Published,
    Draft,
    Archived,
}

impl Default for GalleryStatus {
    fn default() -> Self {
        GalleryStatus::Published
    }
}

impl GalleryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryStatus::Published => "published",
            GalleryStatus::Draft => "draft",
            GalleryStatus::Archived => "archived",
        }
    }
}

impl FromStr for GalleryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "published" => Ok(GalleryStatus::Published),
            "draft" => Ok(GalleryStatus::Draft),
            "archived" => Ok(GalleryStatus::Archived),
            _ => Err(format!("unknown status: {}", s)),
        }
    }
}

/// File attributes recorded at ingest time. A closed record rather than
/// an open attribute bag, so unknown keys cannot creep in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_generated: Option<bool>,
    /// Hex MD5 of the uploaded content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One published/draft media asset.
///
/// If `storage_path` is non-null the referenced blob should exist in the
/// blob store; violations are exactly what the consistency checker
/// detects. Legacy rows may carry only a raw `image_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryItem {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub storage_path: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: GalleryCategory,
    pub status: GalleryStatus,
    pub tags: Vec<String>,
    pub display_order: i64,
    pub file_metadata: Option<FileMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form for a gallery item. The row store assigns `id`,
/// `created_at` and `updated_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGalleryItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub category: GalleryCategory,
    #[serde(default)]
    pub status: GalleryStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub file_metadata: Option<FileMetadata>,
}

/// Partial update form. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryItemPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub category: Option<GalleryCategory>,
    #[serde(default)]
    pub status: Option<GalleryStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub display_order: Option<i64>,
}

impl GalleryItemPatch {
    /// Apply this patch to an item, bumping `updated_at`.
    pub fn apply(&self, item: &mut GalleryItem, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(thumbnail_url) = &self.thumbnail_url {
            item.thumbnail_url = Some(thumbnail_url.clone());
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(display_order) = self.display_order {
            item.display_order = display_order;
        }
        item.updated_at = now;
    }
}

/// Filter for gallery queries. Matching is case-insensitive substring
/// for `search` across title, description and tag membership.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryFilter {
    pub category: Option<GalleryCategory>,
    pub status: Option<GalleryStatus>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

/// A page of filtered rows plus the unpaginated match count.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<GalleryItem>,
    pub total: u64,
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub item_id: Option<ItemId>,
    pub user_id: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// Insert form for an audit entry.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: String,
    pub item_id: Option<ItemId>,
    pub user_id: String,
    pub detail: String,
}

/// Catalog row recorded for each persisted backup snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupRecord {
    pub id: String,
    pub storage_path: String,
    pub backup_type: String,
    pub file_count: u64,
    pub total_size: u64,
    pub status: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Derived aggregate view over the gallery dataset. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_bytes: u64,
    pub by_category: HashMap<String, u64>,
    pub by_status: HashMap<String, u64>,
    pub uploads_last_24h: u64,
}

/// Compute aggregate stats from a full item scan. Shared by backends so
/// both report identical numbers for identical datasets.
pub fn compute_stats(items: &[GalleryItem], now: DateTime<Utc>) -> StorageStats {
    let mut by_category: HashMap<String, u64> = HashMap::new();
    let mut by_status: HashMap<String, u64> = HashMap::new();
    let mut total_bytes = 0u64;
    let mut uploads_last_24h = 0u64;
    let window_start = now - Duration::hours(24);

    for item in items {
        *by_category.entry(item.category.as_str().to_string()).or_insert(0) += 1;
        *by_status.entry(item.status.as_str().to_string()).or_insert(0) += 1;
        if let Some(meta) = &item.file_metadata {
            total_bytes += meta.size.unwrap_or(0);
        }
        if item.created_at >= window_start {
            uploads_last_24h += 1;
        }
    }

    StorageStats {
        total_files: items.len() as u64,
        total_bytes,
        by_category,
        by_status,
        uploads_last_24h,
    }
}

/// Does an item match a filter? Shared matching semantics for in-memory
/// evaluation (the SQLite backend pushes the same predicates into SQL).
pub fn matches_filter(item: &GalleryItem, filter: &GalleryFilter) -> bool {
    if let Some(category) = filter.category {
        if item.category != category {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if item.status != status {
            return false;
        }
    }
    if let Some(from) = filter.date_from {
        if item.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.date_to {
        if item.created_at > to {
            return false;
        }
    }
    if let Some(tags) = &filter.tags {
        if !tags.is_empty() {
            let has_any = tags.iter().any(|wanted| {
                item.tags
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(wanted))
            });
            if !has_any {
                return false;
            }
        }
    }
    if let Some(search) = &filter.search {
        let q = search.to_lowercase();
        if !q.is_empty() {
            let in_title = item.title.to_lowercase().contains(&q);
            let in_description = item
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&q))
                .unwrap_or(false);
            let in_tags = item.tags.iter().any(|t| t.to_lowercase().contains(&q));
            if !in_title && !in_description && !in_tags {
                return false;
            }
        }
    }
    true
}

/// Trait defining the row storage interface
pub trait RowStorage: Send + Sync {
    /// Insert a gallery item, assigning id and timestamps
    fn insert_item(&self, item: &NewGalleryItem) -> GalleryResult<GalleryItem>;

    /// Insert a gallery item preserving its id and timestamps. Used by
    /// restore; fails if the id already exists.
    fn restore_item(&self, item: &GalleryItem) -> GalleryResult<()>;

    /// Apply a partial update to an item and return the updated row
    fn update_item(&self, id: &str, patch: &GalleryItemPatch) -> GalleryResult<GalleryItem>;

    /// Delete a gallery item row
    fn delete_item(&self, id: &str) -> GalleryResult<()>;

    /// Retrieve a single item by id
    fn get_item(&self, id: &str) -> GalleryResult<GalleryItem>;

    /// Find the item referencing a storage path, if any
    fn find_by_storage_path(&self, storage_path: &str) -> GalleryResult<Option<GalleryItem>>;

    /// Filtered, optionally paginated query. `page` is `(offset, limit)`.
    /// Rows are ordered by display_order, then created_at descending,
    /// then id for stability.
    fn query_items(&self, filter: &GalleryFilter, page: Option<(u64, u64)>) -> GalleryResult<QueryResult>;

    /// Full table scan, ordered by created_at then id
    fn all_items(&self) -> GalleryResult<Vec<GalleryItem>>;

    /// Delete every gallery item row, returning the number removed
    fn clear_items(&self) -> GalleryResult<u64>;

    /// Append an audit log entry
    fn insert_audit(&self, entry: &NewAuditEntry) -> GalleryResult<()>;

    /// Most recent audit entries, newest first
    fn recent_audit(&self, limit: usize) -> GalleryResult<Vec<AuditEntry>>;

    /// Record a backup catalog row
    fn insert_backup_record(&self, record: &BackupRecord) -> GalleryResult<()>;

    /// All backup catalog rows, newest first
    fn list_backup_records(&self) -> GalleryResult<Vec<BackupRecord>>;

    /// Aggregate stats over the gallery dataset
    fn storage_stats(&self) -> GalleryResult<StorageStats>;
}
