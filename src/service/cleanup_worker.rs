//! Background cleanup worker
//!
//! Runs the orphan reclaimer on a fixed interval so blobs stranded by
//! failed uploads or interrupted deletes are eventually reclaimed
//! without operator intervention.

use crate::service::consistency::ConsistencyService;
use crate::service::user_context::{Role, UserContext};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Background cleanup worker
pub struct CleanupWorker {
    consistency: Arc<ConsistencyService>,
    interval: Duration,
}

impl CleanupWorker {
    pub fn new(consistency: Arc<ConsistencyService>, interval_secs: u64) -> Self {
        Self {
            consistency,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Start the cleanup worker as a background task (non-blocking)
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        info!(
            "Starting cleanup worker with {}s interval",
            self.interval.as_secs()
        );

        tokio::spawn(async move {
            let context = UserContext::with_role("system".to_string(), Role::Admin);
            let mut interval = time::interval(self.interval);
            // the first tick fires immediately; skip it so startup stays quiet
            interval.tick().await;

            loop {
                interval.tick().await;

                match self.consistency.cleanup(&context) {
                    Ok(report) => {
                        if report.attempted > 0 {
                            info!(
                                "Cleanup pass: {} attempted, {} deleted, {} errors",
                                report.attempted,
                                report.deleted,
                                report.errors.len()
                            );
                        }
                    }
                    Err(e) => error!("Cleanup pass failed: {}", e),
                }
            }
        })
    }
}
