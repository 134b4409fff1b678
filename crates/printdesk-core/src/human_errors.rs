// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Categorised, user-facing error messages.
//
// API callers see these messages only.  Internal store, blob, and driver
// text stays in the logs.

use crate::error::PrintdeskError;

/// A public error with a plain message.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Safe to show to any client.
    pub message: String,
}

/// Convert a `PrintdeskError` into a `HumanError` without leaking internals.
pub fn humanize_error(err: &PrintdeskError) -> HumanError {
    let message = match err {
        PrintdeskError::NotFound(_) => "Job not found".to_owned(),

        // Our own status names; no store text involved.
        PrintdeskError::InvalidTransition { from, to } => {
            format!("Invalid status transition: {from} -> {to}")
        }

        PrintdeskError::ConcurrentConflict { .. } => "Job status changed concurrently. Retry.".to_owned(),

        // Validation messages are written by us for the client.
        PrintdeskError::InvalidInput(detail) => detail.clone(),

        PrintdeskError::TransientStore(_) => "The job store is busy. Please try again shortly.".to_owned(),

        PrintdeskError::Database(_) | PrintdeskError::Serialization(_) => {
            "The job store had a problem.".to_owned()
        }

        PrintdeskError::Blob(_) | PrintdeskError::Io(_) => "The document storage had a problem.".to_owned(),

        PrintdeskError::Integrity { .. } => "The stored document does not match the upload.".to_owned(),

        PrintdeskError::PrintFailure(_) => "The printer could not print this job.".to_owned(),

        PrintdeskError::Cleanup(_) | PrintdeskError::Config(_) => "Internal server error".to_owned(),
    };

    HumanError { message }
}
