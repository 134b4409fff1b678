// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The print capability consumed by the agent.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use printdesk_core::config::{AgentConfig, PrinterBackend};
use printdesk_core::error::Result;
use printdesk_core::types::{Copies, Job, PageRange};

use crate::dry_run::DryRunPrinter;
use crate::lp::LpPrinter;
use crate::raw_client::RawSocketPrinter;

/// Per-job print settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub copies: Copies,
    pub page_range: PageRange,
    /// Target printer; `None` means the backend's default.
    pub printer: Option<String>,
}

impl PrintOptions {
    pub fn for_job(job: &Job, printer: Option<&str>) -> Self {
        Self {
            copies: job.copies,
            page_range: job.page_range.clone(),
            printer: printer.map(str::to_owned),
        }
    }
}

/// Print a local file.  `Ok(())` means the printer accepted the document.
#[async_trait]
pub trait Printer: Send + Sync {
    async fn print(&self, path: &Path, options: &PrintOptions) -> Result<()>;

    /// Short backend label for logs.
    fn name(&self) -> &'static str;
}

/// Backend selected by `PRINTER_BACKEND`.
pub fn build_printer(config: &AgentConfig) -> Arc<dyn Printer> {
    match config.backend {
        PrinterBackend::Lp => Arc::new(LpPrinter::new(config.print_timeout)),
        PrinterBackend::Raw => Arc::new(RawSocketPrinter::new(config.print_timeout)),
        PrinterBackend::DryRun => Arc::new(DryRunPrinter),
    }
}
