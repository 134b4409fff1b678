// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job store backed by SQLite.
//
// The store keeps job metadata only; document bytes live in the blob store
// and are referenced by `file_ref`.  Several processes (API server and any
// number of print agents) may open the same database file: every status
// change is a single `UPDATE ... WHERE id = ? AND status = ?` inside an
// IMMEDIATE transaction, so at most one writer moves a job off a given
// status.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info, instrument};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::{Copies, Job, JobId, JobStatus, NewJob, PageRange, StatusTransition};

use crate::store::{JobFilter, JobStore, SortOrder, StatusUpdate};

/// SQLite schema for the jobs and transition history tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        file_ref TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_hash TEXT,
        status TEXT NOT NULL,
        copies INTEGER NOT NULL DEFAULT 1,
        page_range TEXT NOT NULL DEFAULT 'ALL',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs (status, created_at);
    CREATE INDEX IF NOT EXISTS idx_jobs_status_updated ON jobs (status, updated_at);

    CREATE TABLE IF NOT EXISTS job_transitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL,
        from_status TEXT,
        to_status TEXT NOT NULL,
        at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_job_transitions_job ON job_transitions (job_id);
"#;

const SELECT_JOB_COLUMNS: &str = "SELECT id, file_ref, file_name, file_hash, status, copies,
        page_range, created_at, updated_at FROM jobs";

/// Convert a `rusqlite::Error` into a `PrintdeskError`, keeping busy/locked
/// failures retryable.
fn db_err(e: rusqlite::Error) -> PrintdeskError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            PrintdeskError::TransientStore(e.to_string())
        }
        _ => PrintdeskError::Database(e.to_string()),
    }
}

/// Fixed-width UTC timestamps so that text order is time order.
fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Storage precision.
fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// SQLite-backed [`JobStore`].
///
/// `rusqlite` is synchronous, so each call runs on the blocking pool while
/// holding the connection mutex.  Queries are sub-millisecond; contention
/// between tasks in one process is negligible.
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Open (or create) the job database at the given path.
    ///
    /// WAL mode lets the API server read while an agent writes; the busy
    /// timeout absorbs short write-lock waits between processes.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(db_err)?;
        conn.busy_timeout(busy_timeout).map_err(db_err)?;
        conn.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;

        info!("job database opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;

        debug!("in-memory job database opened");
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| PrintdeskError::Database("connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| PrintdeskError::Database(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, job), fields(file_ref = %job.file_ref))]
    async fn insert(&self, job: NewJob, at: DateTime<Utc>) -> Result<Job> {
        let job = Job {
            id: JobId::new(),
            file_ref: job.file_ref,
            file_name: job.file_name,
            file_hash: job.file_hash,
            status: JobStatus::Pending,
            copies: job.copies,
            page_range: job.page_range,
            created_at: truncate(at),
            updated_at: truncate(at),
        };

        let row = job.clone();
        self.call(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            tx.execute(
                "INSERT INTO jobs (id, file_ref, file_name, file_hash, status, copies,
                 page_range, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id.to_string(),
                    row.file_ref,
                    row.file_name,
                    row.file_hash,
                    row.status.as_str(),
                    row.copies.get(),
                    row.page_range.as_str(),
                    fmt_ts(row.created_at),
                    fmt_ts(row.updated_at),
                ],
            )
            .map_err(db_err)?;
            record_transition(&tx, row.id, None, row.status, row.created_at)?;
            tx.commit().map_err(db_err)
        })
        .await?;

        info!(job_id = %job.id, "job inserted");
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.call(move |conn| select_job(conn, id)).await
    }

    #[instrument(skip(self, update), fields(job_id = %id, from = %expected, to = %update.status))]
    async fn conditional_update(
        &self,
        id: JobId,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<Option<Job>> {
        let updated = self
            .call(move |conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(db_err)?;

                let previous: Option<String> = tx
                    .query_row(
                        "SELECT updated_at FROM jobs WHERE id = ?1 AND status = ?2",
                        params![id.to_string(), expected.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(db_err)?;
                let Some(previous) = previous else {
                    return Ok(None);
                };
                let previous = parse_ts(&previous)
                    .map_err(|e| PrintdeskError::Database(format!("stored updated_at: {e}")))?;

                // Strictly after the previous write, even if clocks disagree.
                let at = truncate(update.at).max(previous + TimeDelta::microseconds(1));

                let rows = tx
                    .execute(
                        "UPDATE jobs SET status = ?1, updated_at = ?2
                         WHERE id = ?3 AND status = ?4",
                        params![update.status.as_str(), fmt_ts(at), id.to_string(), expected.as_str()],
                    )
                    .map_err(db_err)?;
                if rows == 0 {
                    return Ok(None);
                }

                record_transition(&tx, id, Some(expected), update.status, at)?;
                let job = select_job(&tx, id)?;
                tx.commit().map_err(db_err)?;
                Ok(job)
            })
            .await?;

        match &updated {
            Some(_) => debug!("conditional update applied"),
            None => debug!("conditional update matched no row"),
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let jobs = self
            .call(move |conn| {
                let (clause, mut values) = where_clause(&filter);
                let order = match filter.order {
                    SortOrder::CreatedAsc => "ASC",
                    SortOrder::CreatedDesc => "DESC",
                };
                let mut sql = format!("{SELECT_JOB_COLUMNS}{clause} ORDER BY created_at {order}, id {order}");
                if let Some(limit) = filter.limit {
                    sql.push_str(" LIMIT ?");
                    values.push(Value::Integer(i64::from(limit)));
                }

                let mut stmt = conn.prepare(&sql).map_err(db_err)?;
                let jobs = stmt
                    .query_map(params_from_iter(values), row_to_job)
                    .map_err(db_err)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(db_err)?;
                Ok(jobs)
            })
            .await?;

        debug!(count = jobs.len(), "listed jobs");
        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: JobFilter) -> Result<u64> {
        self.call(move |conn| {
            let (clause, values) = where_clause(&filter);
            let sql = format!("SELECT COUNT(*) FROM jobs{clause}");
            let count: i64 = conn
                .query_row(&sql, params_from_iter(values), |row| row.get(0))
                .map_err(db_err)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete(&self, ids: Vec<JobId>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self
            .call(move |conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(db_err)?;
                let mut deleted = 0u64;
                {
                    let mut delete_history = tx
                        .prepare("DELETE FROM job_transitions WHERE job_id = ?1")
                        .map_err(db_err)?;
                    let mut delete_job = tx.prepare("DELETE FROM jobs WHERE id = ?1").map_err(db_err)?;
                    for id in &ids {
                        let key = id.to_string();
                        delete_history.execute(params![key]).map_err(db_err)?;
                        deleted += delete_job.execute(params![key]).map_err(db_err)? as u64;
                    }
                }
                tx.commit().map_err(db_err)?;
                Ok(deleted)
            })
            .await?;

        info!(deleted, "jobs deleted");
        Ok(deleted)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn history(&self, id: JobId) -> Result<Vec<StatusTransition>> {
        self.call(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT job_id, from_status, to_status, at FROM job_transitions
                     WHERE job_id = ?1 ORDER BY id ASC",
                )
                .map_err(db_err)?;
            let history = stmt
                .query_map(params![id.to_string()], row_to_transition)
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?;
            Ok(history)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Query helpers
// ---------------------------------------------------------------------------

fn select_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    conn.query_row(
        &format!("{SELECT_JOB_COLUMNS} WHERE id = ?1"),
        params![id.to_string()],
        row_to_job,
    )
    .optional()
    .map_err(db_err)
}

fn record_transition(
    conn: &Connection,
    id: JobId,
    from: Option<JobStatus>,
    to: JobStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO job_transitions (job_id, from_status, to_status, at) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), from.map(|s| s.as_str()), to.as_str(), fmt_ts(at)],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Build ` WHERE ...` (or an empty string) plus its positional values.
fn where_clause(filter: &JobFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if !filter.statuses.is_empty() {
        let placeholders = vec!["?"; filter.statuses.len()].join(", ");
        conditions.push(format!("status IN ({placeholders})"));
        values.extend(filter.statuses.iter().map(|s| Value::Text(s.as_str().to_owned())));
    }
    if let Some(cutoff) = filter.updated_before {
        conditions.push("updated_at < ?".to_owned());
        values.push(Value::Text(fmt_ts(cutoff)));
    }
    if let Some(cutoff) = filter.created_before {
        conditions.push("created_at < ?".to_owned());
        values.push(Value::Text(fmt_ts(cutoff)));
    }
    if let Some(start) = filter.created_since {
        conditions.push("created_at >= ?".to_owned());
        values.push(Value::Text(fmt_ts(start)));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_err<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

/// Map a SQLite row to a `Job`.
///
/// Column indices must match `SELECT_JOB_COLUMNS`.  Copies and page range
/// are re-normalised so a hand-edited row can never reach a printer with
/// out-of-range values.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get(0)?;
    let status: String = row.get(4)?;
    let copies: i64 = row.get(5)?;
    let page_range: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    let uuid = uuid::Uuid::parse_str(&id).map_err(|e| conversion_err(0, e))?;
    let status: JobStatus = status.parse().map_err(|e| conversion_err(4, e))?;

    Ok(Job {
        id: JobId(uuid),
        file_ref: row.get(1)?,
        file_name: row.get(2)?,
        file_hash: row.get(3)?,
        status,
        copies: Copies::lenient(copies),
        page_range: PageRange::lenient(Some(&page_range)),
        created_at: parse_ts(&created_at).map_err(|e| conversion_err(7, e))?,
        updated_at: parse_ts(&updated_at).map_err(|e| conversion_err(8, e))?,
    })
}

fn row_to_transition(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusTransition> {
    let id: String = row.get(0)?;
    let from: Option<String> = row.get(1)?;
    let to: String = row.get(2)?;
    let at: String = row.get(3)?;

    Ok(StatusTransition {
        job_id: JobId(uuid::Uuid::parse_str(&id).map_err(|e| conversion_err(0, e))?),
        from: from
            .map(|s| s.parse::<JobStatus>())
            .transpose()
            .map_err(|e| conversion_err(1, e))?,
        to: to.parse().map_err(|e| conversion_err(2, e))?,
        at: parse_ts(&at).map_err(|e| conversion_err(3, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(name: &str) -> NewJob {
        NewJob {
            file_ref: format!("jobs/{name}"),
            file_name: name.into(),
            file_hash: None,
            copies: Copies::default(),
            page_range: PageRange::All,
        }
    }

    fn minutes_ago(m: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::minutes(m)
    }

    #[tokio::test]
    async fn insert_and_retrieve_job() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let job = store.insert(new_job("a.pdf"), Utc::now()).await.expect("insert");

        let fetched = store.get(job.id).await.expect("get").expect("found");
        assert_eq!(fetched, job);
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn get_nonexistent_job_returns_none() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        assert!(store.get(JobId::new()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn conditional_update_requires_expected_status() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let job = store.insert(new_job("a.pdf"), Utc::now()).await.expect("insert");

        let miss = store
            .conditional_update(job.id, JobStatus::Approved, StatusUpdate::now(JobStatus::Printing))
            .await
            .expect("update");
        assert!(miss.is_none());

        let hit = store
            .conditional_update(job.id, JobStatus::Pending, StatusUpdate::now(JobStatus::Approved))
            .await
            .expect("update")
            .expect("matched");
        assert_eq!(hit.status, JobStatus::Approved);
        assert!(hit.updated_at > job.updated_at);
    }

    #[tokio::test]
    async fn updated_at_never_goes_backwards() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let job = store.insert(new_job("a.pdf"), Utc::now()).await.expect("insert");

        let earlier = job.updated_at - TimeDelta::hours(1);
        let updated = store
            .conditional_update(job.id, JobStatus::Pending, StatusUpdate::new(JobStatus::Approved, earlier))
            .await
            .expect("update")
            .expect("matched");
        assert!(updated.updated_at > job.updated_at);
    }

    #[tokio::test]
    async fn history_records_every_transition() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let job = store.insert(new_job("a.pdf"), Utc::now()).await.expect("insert");
        store
            .conditional_update(job.id, JobStatus::Pending, StatusUpdate::now(JobStatus::Rejected))
            .await
            .expect("update");

        let history = store.history(job.id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from, None);
        assert_eq!(history[0].to, JobStatus::Pending);
        assert_eq!(history[1].from, Some(JobStatus::Pending));
        assert_eq!(history[1].to, JobStatus::Rejected);
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let old = store.insert(new_job("old.pdf"), minutes_ago(30)).await.expect("insert");
        let young = store.insert(new_job("young.pdf"), minutes_ago(5)).await.expect("insert");
        let other = store.insert(new_job("other.pdf"), minutes_ago(10)).await.expect("insert");
        for id in [old.id, young.id] {
            store
                .conditional_update(id, JobStatus::Pending, StatusUpdate::now(JobStatus::Approved))
                .await
                .expect("approve");
        }

        let approved = store.list(JobFilter::status(JobStatus::Approved)).await.expect("list");
        let ids: Vec<_> = approved.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![old.id, young.id]);

        let newest = store.list(JobFilter::all().newest_first().limit(1)).await.expect("list");
        assert_eq!(newest[0].id, young.id);

        let before = store
            .count(JobFilter::all().created_before(other.created_at))
            .await
            .expect("count");
        assert_eq!(before, 1);
    }

    #[tokio::test]
    async fn updated_before_filter_uses_updated_at() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let stale = store.insert(new_job("stale.pdf"), minutes_ago(20)).await.expect("insert");
        store.insert(new_job("fresh.pdf"), Utc::now()).await.expect("insert");

        let found = store
            .list(JobFilter::status(JobStatus::Pending).updated_before(minutes_ago(10)))
            .await
            .expect("list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);
    }

    #[tokio::test]
    async fn delete_removes_rows_and_history() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let job = store.insert(new_job("a.pdf"), Utc::now()).await.expect("insert");

        assert_eq!(store.delete(vec![job.id, JobId::new()]).await.expect("delete"), 1);
        assert!(store.get(job.id).await.expect("get").is_none());
        assert!(store.history(job.id).await.expect("history").is_empty());
        assert_eq!(store.delete(vec![job.id]).await.expect("delete again"), 0);
    }

    #[tokio::test]
    async fn two_connections_race_one_winner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");
        let a = SqliteJobStore::open(&path, Duration::from_secs(5)).expect("open a");
        let b = SqliteJobStore::open(&path, Duration::from_secs(5)).expect("open b");

        let job = a.insert(new_job("race.pdf"), Utc::now()).await.expect("insert");
        a.conditional_update(job.id, JobStatus::Pending, StatusUpdate::now(JobStatus::Approved))
            .await
            .expect("approve");

        let claim = StatusUpdate::now(JobStatus::Printing);
        let (ra, rb) = tokio::join!(
            a.conditional_update(job.id, JobStatus::Approved, claim),
            b.conditional_update(job.id, JobStatus::Approved, claim),
        );
        let winners = [ra.expect("a"), rb.expect("b")].into_iter().flatten().count();
        assert_eq!(winners, 1);
    }
}
