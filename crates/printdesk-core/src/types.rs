// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdesk job coordinator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PrintdeskError;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = PrintdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PrintdeskError::InvalidInput("Invalid job id format".into()))
    }
}

/// Lifecycle states of a print job.
///
/// The legal edges between these live in [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Uploaded, waiting for an approver.
    Pending,
    /// Approved and claimable by any print agent.
    Approved,
    /// Turned down by an approver.
    Rejected,
    /// Claimed by exactly one print agent.
    Printing,
    /// Printed successfully.
    Done,
    /// Download or print failed; needs operator follow-up.
    Failed,
}

impl JobStatus {
    /// Wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Printing => "PRINTING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PrintdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "PRINTING" => Ok(Self::Printing),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            other => Err(PrintdeskError::InvalidInput(format!("unknown status: {other}"))),
        }
    }
}

/// Number of copies to print, always within `1..=MAX_COPIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Copies(u32);

impl Copies {
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Result<Self, PrintdeskError> {
        if (1..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Self::out_of_range())
        }
    }

    /// Parse a form value.  A missing or blank value means one copy.
    pub fn parse(raw: Option<&str>) -> Result<Self, PrintdeskError> {
        let trimmed = raw.map(str::trim).unwrap_or("");
        if trimmed.is_empty() {
            return Ok(Self(1));
        }
        let value: u32 = trimmed.parse().map_err(|_| Self::out_of_range())?;
        Self::new(value)
    }

    /// Clamp a stored value into range.  Print agents use this on rows read
    /// back from the store so a bad value can never reach the printer.
    pub fn lenient(raw: i64) -> Self {
        match u32::try_from(raw) {
            Ok(value) if (1..=Self::MAX).contains(&value) => Self(value),
            _ => Self(1),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    fn out_of_range() -> PrintdeskError {
        PrintdeskError::InvalidInput(format!(
            "Invalid copies value. Must be an integer between 1 and {}.",
            Self::MAX
        ))
    }
}

impl Default for Copies {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u32> for Copies {
    type Error = PrintdeskError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Copies> for u32 {
    fn from(copies: Copies) -> Self {
        copies.0
    }
}

/// Pages to print: everything, or a list like `1-3,5,8-9`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageRange {
    #[default]
    All,
    /// Normalised (whitespace-free) list of `N` / `N-M` segments.
    Pages(String),
}

impl PageRange {
    pub const ALL: &'static str = "ALL";

    /// Parse a form value.  Whitespace is ignored; an empty value or any
    /// casing of `ALL` selects every page.
    pub fn parse(raw: Option<&str>) -> Result<Self, PrintdeskError> {
        let compact: String = raw
            .unwrap_or(Self::ALL)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if compact.is_empty() || compact.eq_ignore_ascii_case(Self::ALL) {
            return Ok(Self::All);
        }
        if is_valid_page_list(&compact) {
            Ok(Self::Pages(compact))
        } else {
            Err(PrintdeskError::InvalidInput(
                "Invalid pageRange. Use ALL or formats like 1-3, 2,4,6, 1-2,5.".into(),
            ))
        }
    }

    /// Like [`PageRange::parse`] but falls back to `ALL` on anything invalid.
    pub fn lenient(raw: Option<&str>) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => Self::ALL,
            Self::Pages(list) => list,
        }
    }
}

/// `N` or `N-M`, comma separated, no empty segments.
fn is_valid_page_list(list: &str) -> bool {
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    list.split(',').all(|segment| match segment.split_once('-') {
        Some((start, end)) => is_number(start) && is_number(end),
        None => is_number(segment),
    })
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PageRange {
    type Error = PrintdeskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(Some(&value))
    }
}

impl From<PageRange> for String {
    fn from(range: PageRange) -> Self {
        range.as_str().to_owned()
    }
}

/// Fields supplied by the upload path when a job is created.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Path of the document in the blob store.
    pub file_ref: String,
    /// Original client-side file name.
    pub file_name: String,
    /// SHA-256 hex digest of the uploaded bytes.
    pub file_hash: Option<String>,
    pub copies: Copies,
    pub page_range: PageRange,
}

/// One print request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub file_ref: String,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub status: JobStatus,
    pub copies: Copies,
    pub page_range: PageRange,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a job's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub job_id: JobId,
    /// `None` for the creation entry.
    pub from: Option<JobStatus>,
    pub to: JobStatus,
    pub at: DateTime<Utc>,
}

/// Terminal result a print agent reports for a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    Done,
    Failed,
}

impl From<PrintOutcome> for JobStatus {
    fn from(outcome: PrintOutcome) -> Self {
        match outcome {
            PrintOutcome::Done => JobStatus::Done,
            PrintOutcome::Failed => JobStatus::Failed,
        }
    }
}
