// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job status model: the single source of truth for which transitions are
// legal.  Pure functions only.
//
//   PENDING ──> APPROVED ──> PRINTING ──> DONE
//      │                        │
//      └──> REJECTED            └──> FAILED
//
// Stale recovery (PRINTING -> APPROVED) is not an edge of this graph; it is
// a separate system edge, see `can_recover`.

use crate::types::JobStatus;

/// Every status; valid as a list filter.
pub const ALLOWED_STATUS_VALUES: [JobStatus; 6] = [
    JobStatus::Pending,
    JobStatus::Approved,
    JobStatus::Rejected,
    JobStatus::Printing,
    JobStatus::Done,
    JobStatus::Failed,
];

/// Statuses a print agent may write.  Approvers use approve/reject instead.
pub const ALLOWED_STATUS_UPDATES: [JobStatus; 3] =
    [JobStatus::Printing, JobStatus::Done, JobStatus::Failed];

/// Outgoing edges of `status`.
pub fn next_statuses(status: JobStatus) -> &'static [JobStatus] {
    match status {
        JobStatus::Pending => &[JobStatus::Approved, JobStatus::Rejected],
        JobStatus::Approved => &[JobStatus::Printing],
        JobStatus::Printing => &[JobStatus::Done, JobStatus::Failed],
        JobStatus::Rejected | JobStatus::Done | JobStatus::Failed => &[],
    }
}

/// Whether `current -> next` is an edge of the lifecycle graph.
/// Self-transitions are never legal.
pub fn can_transition(current: JobStatus, next: JobStatus) -> bool {
    next_statuses(current).contains(&next)
}

/// Whether the stale-job sweep may move `current` to `next`.
pub fn can_recover(current: JobStatus, next: JobStatus) -> bool {
    current == JobStatus::Printing && next == JobStatus::Approved
}

impl JobStatus {
    /// No outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        next_statuses(*self).is_empty()
    }

    /// May be written through the worker-facing status update.
    pub fn is_worker_update(&self) -> bool {
        ALLOWED_STATUS_UPDATES.contains(self)
    }
}
