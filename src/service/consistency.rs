//! Consistency checking and orphan reclamation
//!
//! The checker diffs the row store against the blob store in both
//! directions without mutating either. The reclaimer is the only code
//! path that deletes unreferenced blobs, and it re-derives its candidate
//! set at deletion time rather than trusting an earlier report.

use crate::blob::BlobStorage;
use crate::error::GalleryResult;
use crate::rows::{ItemId, NewAuditEntry, RowStorage};
use crate::service::path_gen::parse_upload_timestamp;
use crate::service::user_context::UserContext;
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Kinds of divergence between the row store and the blob store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// A row references a storage key with no blob behind it
    MissingFile,
    /// A blob under the managed prefix that no row references
    OrphanedFile,
    /// A row with no storage key whose raw URL cannot be resolved
    BrokenReference,
}

/// One detected divergence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsistencyIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    pub storage_path: String,
    pub issue_type: IssueType,
    pub description: String,
}

/// Outcome of a full consistency check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub items_checked: u64,
    pub blobs_checked: u64,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of an orphan reclamation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub attempted: u64,
    pub deleted: u64,
    pub errors: Vec<String>,
}

/// Consistency service over an injected blob/row store pair
pub struct ConsistencyService {
    blob: Arc<dyn BlobStorage>,
    rows: Arc<dyn RowStorage>,
    managed_prefix: String,
    grace_period: Duration,
}

fn is_resolvable_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl ConsistencyService {
    pub fn new(
        blob: Arc<dyn BlobStorage>,
        rows: Arc<dyn RowStorage>,
        managed_prefix: &str,
        grace_period_secs: u64,
    ) -> Self {
        Self {
            blob,
            rows,
            managed_prefix: managed_prefix.trim_matches('/').to_string(),
            grace_period: Duration::seconds(grace_period_secs as i64),
        }
    }

    /// Diff rows against blobs in both directions. Read-only: repeated
    /// runs over an unchanged system return identical reports, with rows
    /// scanned in id order and blob keys in lexicographic order.
    pub fn check(&self) -> GalleryResult<ConsistencyReport> {
        let mut items = self.rows.all_items()?;
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let mut issues = Vec::new();
        let mut referenced: HashSet<&str> = HashSet::new();

        for item in &items {
            match item.storage_path.as_deref() {
                Some(path) => {
                    referenced.insert(path);
                    if !self.blob.exists(path)? {
                        issues.push(ConsistencyIssue {
                            item_id: Some(item.id.clone()),
                            storage_path: path.to_string(),
                            issue_type: IssueType::MissingFile,
                            description: format!(
                                "item '{}' references a key with no stored blob",
                                item.title
                            ),
                        });
                    }
                }
                None => {
                    if let Some(url) = item.image_url.as_deref() {
                        if !is_resolvable_url(url) {
                            issues.push(ConsistencyIssue {
                                item_id: Some(item.id.clone()),
                                storage_path: url.to_string(),
                                issue_type: IssueType::BrokenReference,
                                description: format!(
                                    "item '{}' carries an unresolvable URL and no storage key",
                                    item.title
                                ),
                            });
                        }
                    }
                }
            }
        }

        // list() returns keys sorted, so orphan ordering is stable too
        let keys = self.blob.list(&self.managed_prefix)?;
        let blobs_checked = keys.len() as u64;
        for key in keys {
            if !referenced.contains(key.as_str()) {
                issues.push(ConsistencyIssue {
                    item_id: None,
                    storage_path: key,
                    issue_type: IssueType::OrphanedFile,
                    description: "blob is not referenced by any gallery item".to_string(),
                });
            }
        }

        info!(
            "Consistency check: {} items, {} blobs, {} issues",
            items.len(),
            blobs_checked,
            issues.len()
        );
        Ok(ConsistencyReport {
            items_checked: items.len() as u64,
            blobs_checked,
            issues,
        })
    }

    /// Delete unreferenced blobs under the managed prefix. The candidate
    /// set is derived fresh here, never taken from a prior report, and
    /// each key is re-checked against the row store immediately before
    /// deletion so a blob referenced since enumeration survives.
    pub fn cleanup(&self, context: &UserContext) -> GalleryResult<CleanupReport> {
        let now = Utc::now();
        let guard = format!("{}/", self.managed_prefix);

        let mut attempted = 0u64;
        let mut deleted = 0u64;
        let mut errors = Vec::new();

        for key in self.blob.list(&self.managed_prefix)? {
            // Only keys this subsystem generated are eligible
            if !key.starts_with(&guard) {
                continue;
            }
            let uploaded_at = match parse_upload_timestamp(&key) {
                Some(ts) => ts,
                None => {
                    debug!("Skipping {}: not a generated key", key);
                    continue;
                }
            };
            // Grace window covers uploads whose row insert has not landed yet
            if now - uploaded_at < self.grace_period {
                debug!("Skipping {}: inside grace window", key);
                continue;
            }
            if self.rows.find_by_storage_path(&key)?.is_some() {
                continue;
            }

            attempted += 1;
            match self.blob.delete(&key) {
                Ok(()) => {
                    deleted += 1;
                    info!("Reclaimed orphaned blob {}", key);
                }
                Err(e) => {
                    warn!("Failed to reclaim {}: {}", key, e);
                    errors.push(format!("{}: {}", key, e));
                }
            }
        }

        self.rows.insert_audit(&NewAuditEntry {
            action: "cleanup".to_string(),
            item_id: None,
            user_id: context.user_id.clone(),
            detail: format!(
                "orphan reclamation: {} attempted, {} deleted, {} errors",
                attempted,
                deleted,
                errors.len()
            ),
        })?;

        Ok(CleanupReport {
            attempted,
            deleted,
            errors,
        })
    }
}
