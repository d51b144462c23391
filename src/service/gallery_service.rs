//! Gallery read/write facade
//!
//! Pagination, filtering, ranked search and item CRUD over the injected
//! store pair. Public URLs are derived from storage keys at read time,
//! so a change of blob backend or base URL never requires a data
//! migration.

use crate::blob::BlobStorage;
use crate::error::{GalleryError, GalleryResult};
use crate::rows::{
    GalleryFilter, GalleryItem, GalleryItemPatch, GalleryStatus, NewAuditEntry, NewGalleryItem,
    RowStorage, StorageStats,
};
use crate::service::user_context::UserContext;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One page of gallery items plus pagination bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryPage {
    pub data: Vec<GalleryItem>,
    pub total: u64,
    pub page: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

/// A search hit with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem {
    pub item: GalleryItem,
    pub score: u32,
}

/// Outcome of a bulk delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub deleted: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

/// Gallery facade over an injected blob/row store pair
pub struct GalleryService {
    blob: Arc<dyn BlobStorage>,
    rows: Arc<dyn RowStorage>,
}

impl GalleryService {
    pub fn new(blob: Arc<dyn BlobStorage>, rows: Arc<dyn RowStorage>) -> Self {
        Self { blob, rows }
    }

    /// Rewrite display URLs from the storage key, when one exists.
    /// Legacy rows without a key keep whatever raw URL they carry.
    fn resolve_urls(&self, item: &mut GalleryItem) {
        if let Some(path) = item.storage_path.as_deref() {
            item.image_url = Some(self.blob.get_public_url(path));
        }
    }

    /// Callers without the admin role only see published items unless
    /// they ask for a status explicitly.
    fn effective_filter(filter: &GalleryFilter, context: &UserContext) -> GalleryFilter {
        let mut filter = filter.clone();
        if filter.status.is_none() && !context.is_admin() {
            filter.status = Some(GalleryStatus::Published);
        }
        filter
    }

    /// Paginated, filtered listing. Pages are 1-indexed; a page past the
    /// end returns an empty data array with the totals intact.
    pub fn list(
        &self,
        page: u64,
        limit: u64,
        filter: &GalleryFilter,
        context: &UserContext,
    ) -> GalleryResult<GalleryPage> {
        let mut errors = Vec::new();
        if page == 0 {
            errors.push("page must be at least 1".to_string());
        }
        if limit == 0 {
            errors.push("limit must be at least 1".to_string());
        }
        if !errors.is_empty() {
            return Err(GalleryError::Validation(errors));
        }

        let filter = Self::effective_filter(filter, context);
        let offset = (page - 1) * limit;
        let result = self.rows.query_items(&filter, Some((offset, limit)))?;

        let mut data = result.rows;
        for item in &mut data {
            self.resolve_urls(item);
        }

        Ok(GalleryPage {
            data,
            total: result.total,
            page,
            total_pages: result.total.div_ceil(limit),
        })
    }

    /// Relevance-ranked search. Title matches weigh more than tag
    /// matches, which weigh more than description matches; items that
    /// match nowhere are dropped entirely.
    pub fn search_ranked(
        &self,
        query: &str,
        context: &UserContext,
    ) -> GalleryResult<Vec<RankedItem>> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Err(GalleryError::validation("search query must not be empty"));
        }

        let filter = Self::effective_filter(&GalleryFilter::default(), context);
        let candidates = self.rows.query_items(&filter, None)?;

        let mut hits: Vec<RankedItem> = candidates
            .rows
            .into_iter()
            .filter_map(|mut item| {
                let mut score = 0u32;
                if item.title.to_lowercase().contains(&q) {
                    score += 3;
                }
                if item.tags.iter().any(|t| t.to_lowercase().contains(&q)) {
                    score += 2;
                }
                if item
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&q))
                    .unwrap_or(false)
                {
                    score += 1;
                }
                if score == 0 {
                    return None;
                }
                self.resolve_urls(&mut item);
                Some(RankedItem { item, score })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.item.id.cmp(&b.item.id)));
        Ok(hits)
    }

    /// Create a row by hand, for assets hosted outside the blob store or
    /// pre-seeded content.
    pub fn add_item(
        &self,
        item: &NewGalleryItem,
        context: &UserContext,
    ) -> GalleryResult<GalleryItem> {
        if item.title.trim().is_empty() {
            return Err(GalleryError::validation("title must not be empty"));
        }
        let mut created = self.rows.insert_item(item)?;
        self.rows.insert_audit(&NewAuditEntry {
            action: "create".to_string(),
            item_id: Some(created.id.clone()),
            user_id: context.user_id.clone(),
            detail: format!("created item '{}'", created.title),
        })?;
        self.resolve_urls(&mut created);
        Ok(created)
    }

    pub fn get_item(&self, id: &str) -> GalleryResult<GalleryItem> {
        let mut item = self.rows.get_item(id)?;
        self.resolve_urls(&mut item);
        Ok(item)
    }

    pub fn update_item(
        &self,
        id: &str,
        patch: &GalleryItemPatch,
        context: &UserContext,
    ) -> GalleryResult<GalleryItem> {
        let mut updated = self.rows.update_item(id, patch)?;
        self.rows.insert_audit(&NewAuditEntry {
            action: "update".to_string(),
            item_id: Some(updated.id.clone()),
            user_id: context.user_id.clone(),
            detail: format!("updated item '{}'", updated.title),
        })?;
        self.resolve_urls(&mut updated);
        Ok(updated)
    }

    /// Delete a row and, best effort, its blob. A blob-side failure is
    /// logged but never fails the delete; the orphan reclaimer picks the
    /// blob up on a later pass.
    pub fn delete_item(&self, id: &str, context: &UserContext) -> GalleryResult<()> {
        let item = self.rows.get_item(id)?;
        self.rows.delete_item(id)?;

        if let Some(path) = item.storage_path.as_deref() {
            if let Err(e) = self.blob.delete(path) {
                warn!("Blob delete deferred for {}: {}", path, e);
            }
        }
        self.rows.insert_audit(&NewAuditEntry {
            action: "delete".to_string(),
            item_id: Some(item.id.clone()),
            user_id: context.user_id.clone(),
            detail: format!("deleted item '{}'", item.title),
        })?;
        info!("Deleted item {} ('{}')", item.id, item.title);
        Ok(())
    }

    /// Delete several rows, reporting per-id failures rather than
    /// aborting on the first.
    pub fn delete_many(
        &self,
        ids: &[String],
        context: &UserContext,
    ) -> GalleryResult<BulkDeleteReport> {
        let mut deleted = 0u64;
        let mut failed = 0u64;
        let mut errors = Vec::new();
        for id in ids {
            match self.delete_item(id, context) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("{}: {}", id, e));
                }
            }
        }
        Ok(BulkDeleteReport {
            deleted,
            failed,
            errors,
        })
    }

    pub fn stats(&self) -> GalleryResult<StorageStats> {
        self.rows.storage_stats()
    }
}
