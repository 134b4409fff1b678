// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry with exponential backoff + jitter at the store-access layer.
//
// Only transient failures (busy/locked database, timed-out round trips) are
// retried.  Lifecycle outcomes such as "no row matched" are results, not
// errors, and application-level rejections are never retried.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use printdesk_core::error::{ErrorClass, PrintdeskError, Result};
use printdesk_core::types::{Job, JobId, JobStatus, NewJob, StatusTransition};

use crate::store::{JobFilter, JobStore, StatusUpdate};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error is not transient.
    GiveUp(ErrorClass),
    /// Retry budget used up.
    Exhausted,
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &PrintdeskError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match err.class() {
        ErrorClass::Transient if attempt >= config.max_retries => RetryDecision::Exhausted,
        ErrorClass::Transient => RetryDecision::RetryAfter(compute_delay(attempt, config)),
        class => RetryDecision::GiveUp(class),
    }
}

/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms));
    Duration::from_millis(total_ms.min(config.max_delay.as_millis() as u64))
}

/// Spread concurrent agents apart so they do not retry in lockstep.
fn jitter(base_ms: u64) -> u64 {
    let nanos = Utc::now().timestamp_subsec_nanos() as u64;
    nanos.wrapping_mul(6364136223846793005) % base_ms.max(1)
}

/// Run `op` until it succeeds, fails non-transiently, or the budget runs out.
pub async fn retry_transient<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match should_retry(&err, attempt, config) {
            RetryDecision::RetryAfter(delay) => {
                debug!(op = what, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying store call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::Exhausted => {
                warn!(op = what, attempts = attempt + 1, error = %err, "store retry budget exhausted");
                return Err(err);
            }
            RetryDecision::GiveUp(_) => return Err(err),
        }
    }
}

/// [`JobStore`] decorator that retries transient failures of `S`.
pub struct RetryingJobStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: JobStore> RetryingJobStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: JobStore> JobStore for RetryingJobStore<S> {
    async fn insert(&self, job: NewJob, at: DateTime<Utc>) -> Result<Job> {
        retry_transient(&self.config, "insert", || self.inner.insert(job.clone(), at)).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        retry_transient(&self.config, "get", || self.inner.get(id)).await
    }

    async fn conditional_update(
        &self,
        id: JobId,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<Option<Job>> {
        retry_transient(&self.config, "conditional_update", || {
            self.inner.conditional_update(id, expected, update)
        })
        .await
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        retry_transient(&self.config, "list", || self.inner.list(filter.clone())).await
    }

    async fn count(&self, filter: JobFilter) -> Result<u64> {
        retry_transient(&self.config, "count", || self.inner.count(filter.clone())).await
    }

    async fn delete(&self, ids: Vec<JobId>) -> Result<u64> {
        retry_transient(&self.config, "delete", || self.inner.delete(ids.clone())).await
    }

    async fn history(&self, id: JobId) -> Result<Vec<StatusTransition>> {
        retry_transient(&self.config, "history", || self.inner.history(id)).await
    }
}
