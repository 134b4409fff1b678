// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS `lp` backend.
//
// The document is handed to the local spooler; `lp` exiting zero means CUPS
// accepted the job, which is as much as the agent can observe.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use printdesk_core::error::{PrintdeskError, Result};

use crate::printer::{PrintOptions, Printer};

#[derive(Debug, Clone)]
pub struct LpPrinter {
    program: String,
    timeout: Duration,
}

impl LpPrinter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "lp".into(),
            timeout,
        }
    }

    /// Use another executable with `lp`'s command line (tests, wrappers).
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

/// `lp` arguments for `path` under `options`.
pub fn lp_args(path: &Path, options: &PrintOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(printer) = options.printer.as_deref().filter(|p| !p.is_empty()) {
        args.push("-d".to_owned());
        args.push(printer.to_owned());
    }
    args.push("-n".to_owned());
    args.push(options.copies.get().to_string());
    if !options.page_range.is_all() {
        args.push("-P".to_owned());
        args.push(options.page_range.as_str().to_owned());
    }
    args.push("--".to_owned());
    args.push(path.display().to_string());
    args
}

#[async_trait]
impl Printer for LpPrinter {
    async fn print(&self, path: &Path, options: &PrintOptions) -> Result<()> {
        let args = lp_args(path, options);
        debug!(program = %self.program, ?args, "invoking spooler");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                PrintdeskError::PrintFailure(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| PrintdeskError::PrintFailure(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrintdeskError::PrintFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        info!(
            request = %String::from_utf8_lossy(&output.stdout).trim(),
            "spooler accepted job"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "lp"
    }
}
