// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk agent: polls the job store and prints APPROVED jobs.
//
// Several agents may share one store.  Stopping an agent mid-print leaves
// its job in PRINTING until another agent's stale recovery returns it.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use printdesk_app::services::AppServices;
use printdesk_app::telemetry::{self, LogFormat};
use printdesk_core::config::DeskConfig;
use printdesk_core::error::Result;
use printdesk_print::build_printer;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let config = match DeskConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("printdesk-agent: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = telemetry::init(config.agent.log_file.as_deref(), LogFormat::from_env()) {
        eprintln!("printdesk-agent: {e}");
        return ExitCode::FAILURE;
    }
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "agent stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: DeskConfig) -> Result<()> {
    let printer = build_printer(&config.agent);
    info!(
        backend = printer.name(),
        printer = config.agent.printer_name.as_deref().unwrap_or("(default)"),
        stale_after_secs = config.agent.stale_after.as_secs(),
        "starting print agent"
    );

    let services = AppServices::init(config)?;
    let agent = Arc::new(services.agent(printer));
    agent
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    error!(error = %e, "cannot listen for ctrl-c; running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;
    Ok(())
}
