// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printdesk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Top-level error type for all Printdesk operations.
#[derive(Debug, Error)]
pub enum PrintdeskError {
    // -- Lifecycle errors --
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// A conditional write matched zero rows: another actor moved the job
    /// away from `expected` first.
    #[error("job {id} is no longer {expected}")]
    ConcurrentConflict { id: JobId, expected: JobStatus },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- Storage --
    /// Busy/locked database or a timed-out round trip.  Safe to retry.
    #[error("transient store error: {0}")]
    TransientStore(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    // -- Printing --
    #[error("print failed: {0}")]
    PrintFailure(String),

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    // -- Ambient --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classification of errors for retry and response decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, busy database or timeout; safe to retry automatically.
    Transient,
    /// The request itself is wrong; retrying it unchanged cannot help.
    Client,
    /// Lost a race with another actor; the user may retry.
    Conflict,
    /// Anything else.
    Permanent,
}

impl PrintdeskError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TransientStore(_) => ErrorClass::Transient,
            Self::NotFound(_) | Self::InvalidInput(_) => ErrorClass::Client,
            Self::InvalidTransition { .. } | Self::ConcurrentConflict { .. } => {
                ErrorClass::Conflict
            }
            Self::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintdeskError>;
