// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Queue moves a job through its lifecycle:
// approver transitions, exactly-once claiming by print agents, stale-claim
// recovery, the agent poll loop, and the retention sweeper.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

pub mod claim;
pub mod lifecycle;
pub mod position;
pub mod sweeper;
pub mod worker;

pub use claim::{RecoveryReport, reset_stale_jobs, try_claim};
pub use lifecycle::{JobLifecycle, Upload};
pub use position::{AVG_PRINT_SECONDS, HourlyCount, JobStats, QueuePosition, QueueSummary};
pub use sweeper::{RetentionSweeper, SweepReport};
pub use worker::{CycleReport, PollState, PrintAgent};

/// `now - age`, saturating at the earliest representable instant.
pub(crate) fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
