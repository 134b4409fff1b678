// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk application layer, shared by the two binaries:
//
// * `printdesk-server`: the job HTTP API plus the retention sweeper.
// * `printdesk-agent`: a polling print agent.  Run as many as there are
//   printers; they coordinate only through the job store.

pub mod api;
pub mod services;
pub mod telemetry;
