// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue position, queue pressure and status statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::status::ALLOWED_STATUS_VALUES;
use printdesk_core::types::{JobId, JobStatus};
use printdesk_store::{JobFilter, JobStore};

/// Assumed printing time per job, for waiting-time estimates.
pub const AVG_PRINT_SECONDS: u64 = 30;

/// Jobs that still stand between a new job and the printer.
const IN_QUEUE: [JobStatus; 2] = [JobStatus::Approved, JobStatus::Printing];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuePosition {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Queued jobs created before this one.
    pub position: u64,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub people_ahead: u64,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    /// `HH:00`, UTC.
    pub hour: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// All jobs by status.
    pub counts: BTreeMap<&'static str, u64>,
    /// Jobs created in the last 24 hours, by status.
    pub today_counts: BTreeMap<&'static str, u64>,
    /// Jobs created in the last 24 hours, per hour, oldest first.
    pub today_trend: Vec<HourlyCount>,
}

pub async fn position(store: &dyn JobStore, id: JobId) -> Result<QueuePosition> {
    let job = store.get(id).await?.ok_or(PrintdeskError::NotFound(id))?;
    let ahead = store
        .count(JobFilter::statuses(IN_QUEUE).created_before(job.created_at))
        .await?;
    Ok(QueuePosition {
        job_id: job.id,
        status: job.status,
        position: ahead,
        estimated_seconds: ahead * AVG_PRINT_SECONDS,
    })
}

pub async fn summary(store: &dyn JobStore) -> Result<QueueSummary> {
    let people_ahead = store.count(JobFilter::statuses(IN_QUEUE)).await?;
    Ok(QueueSummary {
        people_ahead,
        estimated_seconds: people_ahead * AVG_PRINT_SECONDS,
    })
}

pub async fn stats(store: &dyn JobStore, now: DateTime<Utc>) -> Result<JobStats> {
    let mut counts = empty_counts();
    for status in ALLOWED_STATUS_VALUES {
        let n = store.count(JobFilter::status(status)).await?;
        counts.insert(status.as_str(), n);
    }

    let since = now - TimeDelta::hours(24);
    let recent = store.list(JobFilter::all().created_since(since)).await?;

    let mut today_counts = empty_counts();
    let mut hourly: BTreeMap<i64, u64> = BTreeMap::new();
    for job in &recent {
        *today_counts.entry(job.status.as_str()).or_default() += 1;
        *hourly.entry(job.created_at.timestamp().div_euclid(3600)).or_default() += 1;
    }

    let today_trend = hourly
        .into_iter()
        .map(|(hour, count)| HourlyCount {
            hour: format!("{:02}:00", hour.rem_euclid(24)),
            count,
        })
        .collect();

    Ok(JobStats {
        counts,
        today_counts,
        today_trend,
    })
}

fn empty_counts() -> BTreeMap<&'static str, u64> {
    ALLOWED_STATUS_VALUES.iter().map(|s| (s.as_str(), 0)).collect()
}

#[cfg(test)]
mod tests {
    use printdesk_core::types::{Copies, NewJob, PageRange};
    use printdesk_store::{SqliteJobStore, StatusUpdate};

    use super::*;

    async fn insert_at(store: &SqliteJobStore, at: DateTime<Utc>) -> JobId {
        store
            .insert(
                NewJob {
                    file_ref: format!("jobs/{}", at.timestamp_micros()),
                    file_name: "a.pdf".into(),
                    file_hash: None,
                    copies: Copies::default(),
                    page_range: PageRange::All,
                },
                at,
            )
            .await
            .unwrap()
            .id
    }

    async fn approve(store: &SqliteJobStore, id: JobId) {
        store
            .conditional_update(id, JobStatus::Pending, StatusUpdate::now(JobStatus::Approved))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn position_counts_queued_jobs_created_earlier() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let a = insert_at(&store, t0).await;
        let b = insert_at(&store, t0 + TimeDelta::seconds(1)).await;
        let _pending = insert_at(&store, t0 + TimeDelta::seconds(2)).await;
        let c = insert_at(&store, t0 + TimeDelta::seconds(3)).await;
        approve(&store, a).await;
        approve(&store, b).await;
        approve(&store, c).await;
        store
            .conditional_update(a, JobStatus::Approved, StatusUpdate::now(JobStatus::Printing))
            .await
            .unwrap();

        let first = position(&store, a).await.unwrap();
        assert_eq!((first.position, first.estimated_seconds), (0, 0));
        let last = position(&store, c).await.unwrap();
        assert_eq!(last.position, 2);
        assert_eq!(last.estimated_seconds, 60);
        assert_eq!(last.status, JobStatus::Approved);

        let queue = summary(&store).await.unwrap();
        assert_eq!(queue, QueueSummary { people_ahead: 3, estimated_seconds: 90 });
    }

    #[tokio::test]
    async fn position_of_missing_job_is_not_found() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        assert!(matches!(
            position(&store, JobId::new()).await,
            Err(PrintdeskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stats_cover_all_statuses_and_last_day() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let now = DateTime::from_timestamp(1_700_003_600, 0).unwrap();
        let old = insert_at(&store, now - TimeDelta::hours(30)).await;
        insert_at(&store, now - TimeDelta::minutes(90)).await;
        insert_at(&store, now - TimeDelta::minutes(80)).await;
        insert_at(&store, now - TimeDelta::minutes(5)).await;
        approve(&store, old).await;

        let stats = stats(&store, now).await.unwrap();
        assert_eq!(stats.counts.len(), 6);
        assert_eq!(stats.counts["PENDING"], 3);
        assert_eq!(stats.counts["APPROVED"], 1);
        assert_eq!(stats.counts["DONE"], 0);
        assert_eq!(stats.today_counts["PENDING"], 3);
        assert_eq!(stats.today_counts["APPROVED"], 0);

        let total: u64 = stats.today_trend.iter().map(|h| h.count).sum();
        assert_eq!(total, 3);
        assert!(stats.today_trend.iter().all(|h| h.hour.len() == 5 && h.hour.ends_with(":00")));
    }
}
