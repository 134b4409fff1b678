// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retention sweeper: deletes finished jobs and their documents once they
// are older than the retention window.
//
// Blobs go first, rows second.  A crash in between leaves a row pointing at
// a missing blob, which the next sweep deletes; the reverse order would
// leave a blob nothing refers to.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use printdesk_core::config::SweeperConfig;
use printdesk_core::error::Result;
use printdesk_core::types::JobId;
use printdesk_store::{BlobStore, JobFilter, JobStore};

use crate::cutoff;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted_jobs: u64,
    pub deleted_files: usize,
}

pub struct RetentionSweeper {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    config: SweeperConfig,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn JobStore>, blobs: Arc<dyn BlobStore>, config: SweeperConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Delete one batch of expired jobs.  Any error ends the run; the next
    /// run starts over.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let filter = JobFilter::statuses(self.config.statuses.iter().copied())
            .updated_before(cutoff(now, self.config.retention))
            .limit(self.config.batch_size);
        let expired = self.store.list(filter).await?;
        if expired.is_empty() {
            debug!("nothing to sweep");
            return Ok(SweepReport::default());
        }

        let paths: Vec<String> = expired.iter().map(|job| job.file_ref.clone()).collect();
        let ids: Vec<JobId> = expired.iter().map(|job| job.id).collect();

        let deleted_files = self.blobs.remove(&paths).await?;
        let deleted_jobs = self.store.delete(ids).await?;

        info!(deleted_jobs, deleted_files, "retention sweep complete");
        Ok(SweepReport {
            deleted_jobs,
            deleted_files,
        })
    }

    /// Sweep every `interval` until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let statuses: Vec<&str> = self.config.statuses.iter().map(|s| s.as_str()).collect();
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            retention_secs = self.config.retention.as_secs(),
            statuses = %statuses.join(","),
            "retention sweeper started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep(Utc::now()).await {
                        error!(error = %e, "retention sweep aborted");
                    }
                }
            }
        }
    }
}
