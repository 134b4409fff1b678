// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job lifecycle manager.
//
// Every mutation follows one pattern: read the row, check the edge against
// the status model, then write conditionally on the status that was read.
// A write that matches nothing means someone else moved the job first and
// is reported as `ConcurrentConflict`, never as success.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::status::{ALLOWED_STATUS_UPDATES, can_transition};
use printdesk_core::types::{
    Copies, Job, JobId, JobStatus, NewJob, PageRange, PrintOutcome, StatusTransition,
};
use printdesk_store::{BlobStore, JobFilter, JobStore, StatusUpdate, build_storage_path, content_hash};

/// A document submitted for printing, as received from the client.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Raw `copies` form value.
    pub copies: Option<String>,
    /// Raw `pageRange` form value.
    pub page_range: Option<String>,
}

#[derive(Clone)]
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Store the document and create a `PENDING` job for it.
    ///
    /// The blob is written first.  If the row insert then fails the blob is
    /// removed again; if that removal fails too the orphan is logged and the
    /// insert error is returned.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, len = upload.bytes.len()))]
    pub async fn submit(&self, upload: Upload) -> Result<Job> {
        if upload.bytes.is_empty() {
            return Err(PrintdeskError::InvalidInput(
                "No file uploaded. Use form-data key \"file\".".into(),
            ));
        }
        let copies = Copies::parse(upload.copies.as_deref())?;
        let page_range = PageRange::parse(upload.page_range.as_deref())?;

        let now = Utc::now();
        let path = build_storage_path(&upload.file_name, now);
        let file_hash = content_hash(&upload.bytes);
        let file_ref = self.blobs.put(&path, upload.bytes).await?;

        let new_job = NewJob {
            file_ref: file_ref.clone(),
            file_name: upload.file_name,
            file_hash: Some(file_hash),
            copies,
            page_range,
        };

        match self.store.insert(new_job, now).await {
            Ok(job) => {
                info!(job_id = %job.id, file_ref = %job.file_ref, copies = job.copies.get(), "job submitted");
                Ok(job)
            }
            Err(insert_err) => {
                warn!(file_ref = %file_ref, error = %insert_err, "job insert failed; removing uploaded blob");
                if let Err(cleanup_err) = self.blobs.remove(std::slice::from_ref(&file_ref)).await {
                    error!(
                        file_ref = %file_ref,
                        error = %cleanup_err,
                        "orphaned blob left behind; needs manual reconciliation"
                    );
                }
                Err(insert_err)
            }
        }
    }

    pub async fn approve(&self, id: JobId) -> Result<Job> {
        self.transition(id, JobStatus::Approved).await
    }

    pub async fn reject(&self, id: JobId) -> Result<Job> {
        self.transition(id, JobStatus::Rejected).await
    }

    /// APPROVED → PRINTING.  Print agents use [`crate::claim::try_claim`],
    /// which skips the pre-read; this form reports why a claim was refused.
    pub async fn claim(&self, id: JobId) -> Result<Job> {
        self.transition(id, JobStatus::Printing).await
    }

    pub async fn finish(&self, id: JobId, outcome: PrintOutcome) -> Result<Job> {
        self.transition(id, outcome.into()).await
    }

    /// Worker-facing status write.  Only `PRINTING`, `DONE` and `FAILED`
    /// may be requested here; approver decisions go through
    /// [`approve`](Self::approve) / [`reject`](Self::reject).
    pub async fn update_status(&self, id: JobId, next: JobStatus) -> Result<Job> {
        if !ALLOWED_STATUS_UPDATES.contains(&next) {
            let allowed: Vec<&str> = ALLOWED_STATUS_UPDATES.iter().map(JobStatus::as_str).collect();
            return Err(PrintdeskError::InvalidInput(format!(
                "Invalid status. Allowed: {}",
                allowed.join(", ")
            )));
        }
        self.transition(id, next).await
    }

    pub async fn get(&self, id: JobId) -> Result<Job> {
        self.store.get(id).await?.ok_or(PrintdeskError::NotFound(id))
    }

    /// Jobs newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let filter = match status {
            Some(status) => JobFilter::status(status),
            None => JobFilter::all(),
        };
        self.store.list(filter.newest_first()).await
    }

    pub async fn history(&self, id: JobId) -> Result<Vec<StatusTransition>> {
        self.get(id).await?;
        self.store.history(id).await
    }

    #[instrument(skip_all, fields(job_id = %id, to = %next))]
    async fn transition(&self, id: JobId, next: JobStatus) -> Result<Job> {
        let current = self.get(id).await?;
        if !can_transition(current.status, next) {
            return Err(PrintdeskError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        match self
            .store
            .conditional_update(id, current.status, StatusUpdate::now(next))
            .await?
        {
            Some(job) => {
                info!(from = %current.status, to = %job.status, "job status changed");
                Ok(job)
            }
            None => Err(PrintdeskError::ConcurrentConflict {
                id,
                expected: current.status,
            }),
        }
    }
}
