// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use printdesk_core::error::{PrintdeskError, Result};

use crate::printer::{PrintOptions, Printer};

/// Logs the job and reports success without touching a printer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPrinter;

#[async_trait]
impl Printer for DryRunPrinter {
    async fn print(&self, path: &Path, options: &PrintOptions) -> Result<()> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| PrintdeskError::PrintFailure(format!("{}: {e}", path.display())))?
            .len();
        info!(
            path = %path.display(),
            bytes = size,
            copies = options.copies.get(),
            page_range = options.page_range.as_str(),
            printer = options.printer.as_deref().unwrap_or("(default)"),
            "dry run: not printing"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
