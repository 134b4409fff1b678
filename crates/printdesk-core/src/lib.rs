// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Core: types, status model, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod status;
pub mod types;

pub use config::DeskConfig;
pub use error::{ErrorClass, PrintdeskError};
pub use status::{ALLOWED_STATUS_UPDATES, ALLOWED_STATUS_VALUES, can_recover, can_transition};
pub use types::*;
