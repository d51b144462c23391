//! Upload validation
//!
//! Pure policy checks that run before any I/O. Every applicable error is
//! accumulated so callers can present a complete report instead of the
//! first violation only.

use crate::config::UploadPolicy;
use serde::{Deserialize, Serialize};

/// Image content types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];

/// Executable/script-like extensions rejected regardless of the declared
/// MIME type, as a second layer against MIME spoofing
pub const DENIED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "msi", "dll", "sh", "bash", "ps1", "php", "js", "mjs",
    "jar", "vbs", "py",
];

/// A candidate upload as seen before any bytes are read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCandidate {
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Validation outcome for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validation outcome for a batch: per-file reports plus batch-level
/// violations that reject the batch as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidationReport {
    pub per_file: Vec<ValidationReport>,
    pub batch_errors: Vec<String>,
}

impl BatchValidationReport {
    pub fn batch_valid(&self) -> bool {
        self.batch_errors.is_empty()
    }
}

/// Policy-driven upload validator. Holds no I/O handles; both entry
/// points are pure functions of their inputs.
#[derive(Debug, Clone)]
pub struct FileValidator {
    policy: UploadPolicy,
}

fn extension_of(file_name: &str) -> Option<String> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

impl FileValidator {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    /// Validate a single candidate, accumulating all applicable errors
    pub fn validate(&self, file: &FileCandidate) -> ValidationReport {
        let mut errors = Vec::new();

        if file.size == 0 {
            errors.push(format!("empty file: {}", file.file_name));
        }
        if file.size > self.policy.max_file_size {
            errors.push(format!(
                "exceeds size limit: {} is {} bytes, limit is {} bytes",
                file.file_name, file.size, self.policy.max_file_size
            ));
        }
        if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
            errors.push(format!("unsupported type: {}", file.mime_type));
        }
        if let Some(ext) = extension_of(&file.file_name) {
            if DENIED_EXTENSIONS.contains(&ext.as_str()) {
                errors.push(format!("extension not permitted: .{}", ext));
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Validate a batch. Each file is validated independently; count and
    /// aggregate-size violations reject the whole batch.
    pub fn validate_batch(&self, files: &[FileCandidate]) -> BatchValidationReport {
        let per_file = files.iter().map(|f| self.validate(f)).collect();

        let mut batch_errors = Vec::new();
        if files.len() > self.policy.max_files {
            batch_errors.push(format!(
                "too many files: {} exceeds the batch limit of {}",
                files.len(),
                self.policy.max_files
            ));
        }
        let aggregate: u64 = files.iter().map(|f| f.size).sum();
        if aggregate > self.policy.max_batch_size {
            batch_errors.push(format!(
                "batch too large: {} bytes exceeds the limit of {} bytes",
                aggregate, self.policy.max_batch_size
            ));
        }

        BatchValidationReport {
            per_file,
            batch_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> FileValidator {
        FileValidator::new(UploadPolicy::default())
    }

    fn candidate(name: &str, size: u64, mime: &str) -> FileCandidate {
        FileCandidate {
            file_name: name.to_string(),
            size,
            mime_type: mime.to_string(),
        }
    }

    #[test]
    fn test_valid_image_passes() {
        let report = validator().validate(&candidate("party.jpg", 1024, "image/jpeg"));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_multiple_defects_all_reported() {
        // Oversized AND wrong type: both errors must come back
        let report = validator().validate(&candidate("video.mp4", 30 * 1024 * 1024, "video/mp4"));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.contains("exceeds size limit")));
        assert!(report.errors.iter().any(|e| e.contains("unsupported type")));
    }

    #[test]
    fn test_empty_file_rejected() {
        let report = validator().validate(&candidate("blank.png", 0, "image/png"));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("empty file")));
    }

    #[test]
    fn test_spoofed_extension_rejected() {
        // MIME claims image but the extension is executable
        let report = validator().validate(&candidate("totally-a-photo.exe", 512, "image/png"));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("extension not permitted")));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let report = validator().validate(&candidate("run.SH", 512, "image/png"));
        assert!(report.errors.iter().any(|e| e.contains("extension not permitted")));
    }

    #[test]
    fn test_batch_limits() {
        let v = FileValidator::new(UploadPolicy {
            max_files: 2,
            max_batch_size: 1000,
            ..UploadPolicy::default()
        });

        let files = vec![
            candidate("a.png", 400, "image/png"),
            candidate("b.png", 400, "image/png"),
            candidate("c.png", 400, "image/png"),
        ];
        let report = v.validate_batch(&files);
        assert!(!report.batch_valid());
        assert_eq!(report.batch_errors.len(), 2); // count and aggregate size
        assert_eq!(report.per_file.len(), 3);
        assert!(report.per_file.iter().all(|r| r.valid));
    }

    #[test]
    fn test_batch_per_file_independence() {
        let files = vec![
            candidate("good.png", 100, "image/png"),
            candidate("bad.pdf", 100, "application/pdf"),
        ];
        let report = validator().validate_batch(&files);
        assert!(report.batch_valid());
        assert!(report.per_file[0].valid);
        assert!(!report.per_file[1].valid);
    }
}
