// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print agent poll loop.
//
// One cycle: recover stale claims, list APPROVED jobs oldest first, and for
// each one try to claim it, download it, print it and record the outcome.
// Jobs inside a cycle run one after another.  A tick that fires while a
// cycle is still running is dropped.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use printdesk_core::config::AgentConfig;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::{Job, JobStatus, PrintOutcome};
use printdesk_print::{PrintOptions, Printer};
use printdesk_store::{JobFilter, verify_content};

use crate::claim::{reset_stale_jobs, try_claim};
use crate::lifecycle::JobLifecycle;

/// Reentrancy state of one agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub recovered: usize,
    /// APPROVED jobs seen in the listing.
    pub candidates: usize,
    pub claimed: usize,
    pub printed: usize,
    pub failed: usize,
}

pub struct PrintAgent {
    lifecycle: JobLifecycle,
    printer: Arc<dyn Printer>,
    config: AgentConfig,
    state: Mutex<PollState>,
}

/// Puts the agent back to `Idle` however the cycle ends.
struct CycleGuard<'a> {
    state: &'a Mutex<PollState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = PollState::Idle;
    }
}

impl PrintAgent {
    pub fn new(lifecycle: JobLifecycle, printer: Arc<dyn Printer>, config: AgentConfig) -> Self {
        Self {
            lifecycle,
            printer,
            config,
            state: Mutex::new(PollState::Idle),
        }
    }

    pub fn state(&self) -> PollState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_cycle(&self) -> Option<CycleGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match *state {
            PollState::Polling => None,
            PollState::Idle => {
                *state = PollState::Polling;
                Some(CycleGuard { state: &self.state })
            }
        }
    }

    /// Run one cycle unless one is already running.
    ///
    /// `Ok(None)` means the call overlapped a running cycle and was dropped.
    /// `Err` means listing stale PRINTING or APPROVED jobs failed and the
    /// cycle stopped there.
    pub async fn poll_once(&self) -> Result<Option<CycleReport>> {
        let Some(_guard) = self.begin_cycle() else {
            debug!("poll cycle still running; tick dropped");
            return Ok(None);
        };
        self.run_cycle(Utc::now()).await.map(Some)
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        // A failed PRINTING listing ends the cycle, as a failed APPROVED
        // listing does.
        let recovery = reset_stale_jobs(self.lifecycle.store(), self.config.stale_after, now).await?;
        report.recovered = recovery.recovered;

        let approved = self
            .lifecycle
            .store()
            .list(JobFilter::status(JobStatus::Approved))
            .await?;
        report.candidates = approved.len();

        for job in approved {
            let claimed = match try_claim(self.lifecycle.store(), job.id).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => continue,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "claim failed; skipping job");
                    continue;
                }
            };
            report.claimed += 1;

            match self.process(&claimed).await {
                PrintOutcome::Done => report.printed += 1,
                PrintOutcome::Failed => report.failed += 1,
            }
        }

        Ok(report)
    }

    /// Print a claimed job and record DONE or FAILED.
    async fn process(&self, job: &Job) -> PrintOutcome {
        info!(job_id = %job.id, copies = job.copies.get(), page_range = %job.page_range, "printing job");

        let outcome = match self.print_job(job).await {
            Ok(()) => PrintOutcome::Done,
            Err(e) => {
                error!(job_id = %job.id, file_ref = %job.file_ref, error = %e, "print job failed");
                PrintOutcome::Failed
            }
        };

        match self.lifecycle.finish(job.id, outcome).await {
            Ok(finished) => info!(job_id = %job.id, status = %finished.status, "job finished"),
            Err(e) => error!(
                job_id = %job.id,
                outcome = ?outcome,
                error = %e,
                "could not record job outcome; stale recovery will return it to the queue"
            ),
        }
        outcome
    }

    async fn print_job(&self, job: &Job) -> Result<()> {
        let bytes = self.lifecycle.blobs().get(&job.file_ref).await?;
        if let Some(expected) = job.file_hash.as_deref() {
            verify_content(&bytes, expected)?;
        }

        let suffix = Path::new(&job.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let working_copy = tempfile::Builder::new()
            .prefix("printdesk-")
            .suffix(&suffix)
            .tempfile()?;

        let result = self.print_file(working_copy.path(), &bytes, job).await;

        if let Err(e) = working_copy.close() {
            let err = PrintdeskError::Cleanup(e.to_string());
            warn!(job_id = %job.id, error = %err, "could not remove working copy");
        }
        result
    }

    async fn print_file(&self, path: &Path, bytes: &[u8], job: &Job) -> Result<()> {
        tokio::fs::write(path, bytes).await?;
        let options = PrintOptions::for_job(job, self.config.printer_name.as_deref());
        debug!(job_id = %job.id, backend = self.printer.name(), path = %path.display(), "handing job to printer");
        self.printer.print(path, &options).await
    }

    /// Poll every `poll_interval` until `shutdown` resolves.  The first
    /// cycle starts immediately.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            backend = self.printer.name(),
            "print agent started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("print agent stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let agent = Arc::clone(&self);
                    tokio::spawn(async move { agent.tick().await });
                }
            }
        }
    }

    async fn tick(&self) {
        match self.poll_once().await {
            Ok(Some(report)) if report.claimed > 0 || report.recovered > 0 => {
                info!(
                    claimed = report.claimed,
                    printed = report.printed,
                    failed = report.failed,
                    recovered = report.recovered,
                    "poll cycle complete"
                );
            }
            Ok(Some(_)) | Ok(None) => {}
            Err(e) => error!(error = %e, "poll cycle aborted: could not list jobs"),
        }
    }
}
