// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Print: the side effect at the end of a job.  Each backend takes
// a local file plus the job's copies/page range and either prints it or
// returns a `PrintFailure`.

pub mod dry_run;
pub mod lp;
pub mod printer;
pub mod raw_client;

pub use dry_run::DryRunPrinter;
pub use lp::LpPrinter;
pub use printer::{PrintOptions, Printer, build_printer};
pub use raw_client::RawSocketPrinter;
