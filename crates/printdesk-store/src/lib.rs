// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Store holds the two persistence contracts the coordinator uses:
// a job table with compare-and-swap status updates, and a path-keyed blob
// store for the uploaded documents.

pub mod blobs;
pub mod retry;
pub mod sqlite;
pub mod store;

pub use blobs::{BlobStore, FsBlobStore, build_storage_path, content_hash, verify_content};
pub use retry::{RetryConfig, RetryingJobStore};
pub use sqlite::SqliteJobStore;
pub use store::{JobFilter, JobStore, SortOrder, StatusUpdate};
