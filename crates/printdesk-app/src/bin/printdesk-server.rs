// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk server: job HTTP API plus the retention sweeper.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use printdesk_app::api;
use printdesk_app::services::AppServices;
use printdesk_app::telemetry::{self, LogFormat};
use printdesk_core::config::DeskConfig;
use printdesk_core::error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let config = match DeskConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("printdesk-server: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = telemetry::init(config.server.log_file.as_deref(), LogFormat::from_env()) {
        eprintln!("printdesk-server: {e}");
        return ExitCode::FAILURE;
    }
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: DeskConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.bind_addr, config.server.port);
    let services = AppServices::init(config)?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let sweeper = Arc::new(services.sweeper());
    let sweeper_task = tokio::spawn(sweeper.run(async move {
        let _ = stop_rx.changed().await;
    }));

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "printdesk server listening");
    axum::serve(listener, api::router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(true);
    if let Err(e) = sweeper_task.await {
        error!(error = %e, "retention sweeper task failed");
    }
    info!("printdesk server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = %e, "cannot listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
