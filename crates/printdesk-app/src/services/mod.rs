// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: opens the stores once and hands out the queue components
// the binaries run.

pub mod app_services;
pub mod data_dir;

pub use app_services::AppServices;
