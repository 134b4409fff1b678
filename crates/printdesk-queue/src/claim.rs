// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Claim and stale-claim recovery.
//
// A claim is a single compare-and-swap APPROVED -> PRINTING.  When two
// agents race, the store lets exactly one write through; the loser sees no
// row and moves on.  Agents never touch `updated_at` between claim and
// finish, so a PRINTING row that has not changed for `stale_after` belongs
// to an agent that died or hung, and is handed back to APPROVED.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use printdesk_core::error::Result;
use printdesk_core::status::can_recover;
use printdesk_core::types::{Job, JobId, JobStatus};
use printdesk_store::{JobFilter, JobStore, StatusUpdate};

use crate::cutoff;

/// Claim `id` for this agent.  `Ok(None)` means another agent got there
/// first (or the job left APPROVED), which is not an error.
pub async fn try_claim(store: &dyn JobStore, id: JobId) -> Result<Option<Job>> {
    let claimed = store
        .conditional_update(id, JobStatus::Approved, StatusUpdate::now(JobStatus::Printing))
        .await?;
    match &claimed {
        Some(_) => info!(job_id = %id, "job claimed"),
        None => debug!(job_id = %id, "job already claimed elsewhere"),
    }
    Ok(claimed)
}

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// PRINTING rows older than the threshold.
    pub stale: usize,
    /// Rows moved back to APPROVED.
    pub recovered: usize,
    /// Rows that changed under us or whose update failed.
    pub skipped: usize,
}

/// Hand PRINTING jobs untouched since `now - stale_after` back to APPROVED.
///
/// Only listing the candidates can fail the pass.  A failed or lost update
/// for one job is logged and the pass continues.
pub async fn reset_stale_jobs(
    store: &dyn JobStore,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Result<RecoveryReport> {
    let threshold = cutoff(now, stale_after);
    let stale = store
        .list(JobFilter::status(JobStatus::Printing).updated_before(threshold))
        .await?;

    let mut report = RecoveryReport {
        stale: stale.len(),
        ..RecoveryReport::default()
    };

    for job in stale {
        debug_assert!(can_recover(job.status, JobStatus::Approved));
        match store
            .conditional_update(job.id, JobStatus::Printing, StatusUpdate::new(JobStatus::Approved, now))
            .await
        {
            Ok(Some(_)) => {
                warn!(job_id = %job.id, last_update = %job.updated_at, "stale PRINTING job returned to queue");
                report.recovered += 1;
            }
            Ok(None) => {
                debug!(job_id = %job.id, "stale job finished before recovery");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "could not recover stale job");
                report.skipped += 1;
            }
        }
    }

    if report.stale > 0 {
        info!(stale = report.stale, recovered = report.recovered, "stale recovery pass complete");
    }
    Ok(report)
}
