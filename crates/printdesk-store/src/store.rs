// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The job store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use printdesk_core::error::Result;
use printdesk_core::types::{Job, JobId, JobStatus, NewJob, StatusTransition};

/// New status for a conditional update, and when it happened.
#[derive(Debug, Clone, Copy)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus, at: DateTime<Utc>) -> Self {
        Self { status, at }
    }

    pub fn now(status: JobStatus) -> Self {
        Self::new(status, Utc::now())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first (FIFO).
    #[default]
    CreatedAsc,
    CreatedDesc,
}

/// Row selection for [`JobStore::list`] and [`JobStore::count`].
///
/// All set conditions must hold.  An empty `statuses` matches any status.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub statuses: Vec<JobStatus>,
    pub updated_before: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub created_since: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn status(status: JobStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    pub fn statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn updated_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.updated_before = Some(cutoff);
        self
    }

    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    pub fn created_since(mut self, start: DateTime<Utc>) -> Self {
        self.created_since = Some(start);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::CreatedDesc;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Durable job table keyed by id.
///
/// `status` is never written unconditionally: the only mutation is
/// [`JobStore::conditional_update`], which applies only while the row still
/// holds the expected status.  That compare-and-swap is what keeps two
/// print agents from claiming the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a `PENDING` job.  `at` becomes both `created_at` and
    /// `updated_at`.
    async fn insert(&self, job: NewJob, at: DateTime<Utc>) -> Result<Job>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Move `id` from `expected` to `update.status`.
    ///
    /// Returns `Ok(None)` when no row matched, i.e. the job is missing or
    /// another actor already moved it.  `updated_at` never goes backwards.
    async fn conditional_update(
        &self,
        id: JobId,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<Option<Job>>;

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>>;

    /// Number of matching rows; `order` and `limit` are ignored.
    async fn count(&self, filter: JobFilter) -> Result<u64>;

    /// Delete rows (and their history).  Returns how many rows existed.
    async fn delete(&self, ids: Vec<JobId>) -> Result<u64>;

    /// Status history, oldest first, starting with the creation entry.
    async fn history(&self, id: JobId) -> Result<Vec<StatusTransition>>;
}
