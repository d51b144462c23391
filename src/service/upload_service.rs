//! Upload orchestration service
//!
//! Drives the validate → generate-path → put-blob pipeline for single
//! files and batches. The orchestrator never touches the row store:
//! row creation stays with the caller so a blob-layer failure can never
//! leave a half-written row, and vice versa.

use crate::blob::BlobStorage;
use crate::config::UploadPolicy;
use crate::error::{GalleryError, GalleryResult};
use crate::rows::FileMetadata;
use crate::service::path_gen::generate_storage_path;
use crate::service::user_context::UserContext;
use crate::service::validator::{FileCandidate, FileValidator};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A file ready to be uploaded
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    fn candidate(&self) -> FileCandidate {
        FileCandidate {
            file_name: self.file_name.clone(),
            size: self.bytes.len() as u64,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Per-upload options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub generate_thumbnail: bool,
    #[serde(default)]
    pub compression_quality: Option<u8>,
}

/// Blob-layer result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub storage_path: String,
    pub url: String,
    pub metadata: FileMetadata,
}

/// Per-file outcome of a batch upload. One file's failure never affects
/// its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadResult {
    pub file_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Callback invoked with overall completion percent after each file
/// reaches a terminal state
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Upload orchestration service with injected blob backend
pub struct UploadService {
    blob: Arc<dyn BlobStorage>,
    validator: FileValidator,
    policy: UploadPolicy,
    managed_prefix: String,
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

impl UploadService {
    pub fn new(blob: Arc<dyn BlobStorage>, policy: UploadPolicy, managed_prefix: &str) -> Self {
        Self {
            blob,
            validator: FileValidator::new(policy.clone()),
            policy,
            managed_prefix: managed_prefix.to_string(),
        }
    }

    /// Upload a single file: validate, generate a namespaced key, store
    /// the blob, and return blob-layer results plus derived metadata.
    pub fn upload(
        &self,
        file: &UploadFile,
        context: &UserContext,
        options: &UploadOptions,
    ) -> GalleryResult<UploadOutcome> {
        let report = self.validator.validate(&file.candidate());
        if !report.valid {
            debug!("Rejected upload {}: {:?}", file.file_name, report.errors);
            return Err(GalleryError::Validation(report.errors));
        }
        if options.optimize || options.generate_thumbnail {
            debug!(
                "Transform options requested for {}; no server-side pipeline, flags recorded as not applied",
                file.file_name
            );
        }

        let storage_path = generate_storage_path(
            &self.managed_prefix,
            &context.user_id,
            &file.file_name,
            self.policy.max_name_length,
        );

        let url = self
            .blob
            .put(&storage_path, &file.bytes, &file.mime_type)
            .map_err(|e| GalleryError::Upload(e.to_string()))?;

        let dimensions = probe_dimensions(&file.bytes);
        let metadata = FileMetadata {
            size: Some(file.bytes.len() as u64),
            mime_type: Some(file.mime_type.clone()),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            // No server-side transform pipeline runs here; options are
            // recorded as not applied.
            optimized: Some(false),
            thumbnail_generated: Some(false),
            checksum: Some(hex::encode(md5::compute(&file.bytes).0)),
        };

        info!(
            "Uploaded {} as {} ({} bytes)",
            file.file_name,
            storage_path,
            file.bytes.len()
        );
        Ok(UploadOutcome {
            storage_path,
            url,
            metadata,
        })
    }

    /// Upload a batch with bounded concurrency. Batch-level policy
    /// violations reject the whole batch; individual file failures are
    /// reported per file and never abort their siblings. Results come
    /// back in submission order regardless of completion order.
    pub async fn upload_many(
        &self,
        files: Vec<UploadFile>,
        context: &UserContext,
        options: &UploadOptions,
        progress: Option<ProgressFn>,
    ) -> GalleryResult<Vec<FileUploadResult>> {
        let candidates: Vec<FileCandidate> = files.iter().map(|f| f.candidate()).collect();
        let batch_report = self.validator.validate_batch(&candidates);
        if !batch_report.batch_valid() {
            return Err(GalleryError::Validation(batch_report.batch_errors));
        }

        let total = files.len();
        let completed = AtomicUsize::new(0);

        let mut indexed: Vec<(usize, FileUploadResult)> = stream::iter(files.into_iter().enumerate())
            .map(|(index, file)| {
                let completed = &completed;
                let progress = progress.clone();
                async move {
                    let outcome = self.upload(&file, context, options);
                    let result = match outcome {
                        Ok(out) => FileUploadResult {
                            file_name: file.file_name.clone(),
                            success: true,
                            storage_path: Some(out.storage_path),
                            url: Some(out.url),
                            error: None,
                        },
                        Err(e) => {
                            warn!("Batch upload failed for {}: {}", file.file_name, e);
                            FileUploadResult {
                                file_name: file.file_name.clone(),
                                success: false,
                                storage_path: None,
                                url: None,
                                error: Some(e.to_string()),
                            }
                        }
                    };
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(report) = &progress {
                        report(((done * 100) / total) as u8);
                    }
                    (index, result)
                }
            })
            .buffer_unordered(self.policy.max_concurrent_uploads.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }
}
