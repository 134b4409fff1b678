// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime configuration, sourced from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PrintdeskError, Result};
use crate::types::JobStatus;

/// Which print backend the agent drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrinterBackend {
    /// CUPS `lp` command.
    Lp,
    /// Raw TCP (JetDirect) socket.
    Raw,
    /// Log and succeed without printing.
    DryRun,
}

impl FromStr for PrinterBackend {
    type Err = PrintdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lp" | "cups" => Ok(Self::Lp),
            "raw" | "jetdirect" => Ok(Self::Raw),
            "dry-run" | "dryrun" | "none" => Ok(Self::DryRun),
            other => Err(PrintdeskError::Config(format!(
                "PRINTER_BACKEND must be lp, raw or dry-run (got {other:?})"
            ))),
        }
    }
}

/// Job store and blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for `jobs.db` and blob buckets.  `None` resolves to
    /// the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Blob bucket (sub-directory) name.
    pub bucket: String,
    /// Transient-error retry budget per store call.
    pub max_retries: u32,
    /// SQLite busy timeout.
    pub busy_timeout: Duration,
}

/// Print agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub poll_interval: Duration,
    /// A PRINTING job untouched for this long is presumed abandoned.
    pub stale_after: Duration,
    pub backend: PrinterBackend,
    /// Printer selector; empty means the system default.
    pub printer_name: Option<String>,
    /// Upper bound on one print invocation.
    pub print_timeout: Duration,
    /// Append-only log file.
    pub log_file: Option<PathBuf>,
}

/// Retention sweeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub retention: Duration,
    pub batch_size: u32,
    /// Terminal statuses eligible for deletion.
    pub statuses: Vec<JobStatus>,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub log_file: Option<PathBuf>,
}

/// Complete Printdesk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskConfig {
    pub store: StoreConfig,
    pub agent: AgentConfig,
    pub sweeper: SweeperConfig,
    pub server: ServerConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            bucket: "print-files".into(),
            max_retries: 3,
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(4_000),
            stale_after: Duration::from_secs(10 * 60),
            backend: PrinterBackend::Lp,
            printer_name: None,
            print_timeout: Duration::from_secs(120),
            log_file: Some(PathBuf::from("logs/agent.log")),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(60_000),
            retention: Duration::from_secs(2 * 60),
            batch_size: 200,
            statuses: vec![JobStatus::Done],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 3000,
            max_upload_bytes: 25 * 1024 * 1024,
            log_file: None,
        }
    }
}

impl DeskConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, starting from defaults.
    /// Unset or blank variables keep their default; malformed ones are an
    /// error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("PRINTDESK_DATA_DIR") {
            config.store.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(bucket) = get("PRINT_BUCKET") {
            config.store.bucket = bucket;
        }
        if let Some(v) = get("STORE_MAX_RETRIES") {
            config.store.max_retries = parse_number("STORE_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("STORE_BUSY_TIMEOUT_MS") {
            config.store.busy_timeout = millis("STORE_BUSY_TIMEOUT_MS", &v)?;
        }

        if let Some(v) = get("POLL_INTERVAL_MS") {
            config.agent.poll_interval = millis("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("STALE_PRINTING_MINUTES") {
            config.agent.stale_after = minutes("STALE_PRINTING_MINUTES", &v)?;
        }
        if let Some(v) = get("PRINTER_BACKEND") {
            config.agent.backend = v.parse()?;
        }
        config.agent.printer_name = get("PRINTER_NAME").map(|v| v.trim().to_owned());
        if let Some(v) = get("PRINT_TIMEOUT_SECS") {
            config.agent.print_timeout =
                Duration::from_secs(positive("PRINT_TIMEOUT_SECS", &v)?);
        }
        if let Some(path) = get("AGENT_LOG_FILE") {
            config.agent.log_file = Some(PathBuf::from(path));
        }

        if let Some(v) = get("CLEANUP_INTERVAL_MS") {
            config.sweeper.interval = millis("CLEANUP_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("DONE_RETENTION_MINUTES") {
            config.sweeper.retention = minutes("DONE_RETENTION_MINUTES", &v)?;
        }
        if let Some(v) = get("CLEANUP_BATCH_SIZE") {
            config.sweeper.batch_size = parse_number("CLEANUP_BATCH_SIZE", &v)?;
            if config.sweeper.batch_size == 0 {
                return Err(PrintdeskError::Config("CLEANUP_BATCH_SIZE must be > 0".into()));
            }
        }
        if let Some(v) = get("RETENTION_STATUSES") {
            config.sweeper.statuses = parse_retention_statuses(&v)?;
        }

        if let Some(addr) = get("BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        if let Some(v) = get("PORT") {
            config.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            config.server.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(path) = get("SERVER_LOG_FILE") {
            config.server.log_file = Some(PathBuf::from(path));
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PrintdeskError::Config(format!("{key} must be a number (got {value:?})")))
}

fn positive(key: &str, value: &str) -> Result<u64> {
    match parse_number::<u64>(key, value)? {
        0 => Err(PrintdeskError::Config(format!("{key} must be greater than zero"))),
        n => Ok(n),
    }
}

fn millis(key: &str, value: &str) -> Result<Duration> {
    positive(key, value).map(Duration::from_millis)
}

fn minutes(key: &str, value: &str) -> Result<Duration> {
    let m = positive(key, value)?;
    m.checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| PrintdeskError::Config(format!("{key} is too large (got {value:?})")))
}

/// Comma-separated terminal statuses, e.g. `DONE,FAILED`.
fn parse_retention_statuses(value: &str) -> Result<Vec<JobStatus>> {
    let mut statuses = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let status: JobStatus = part
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| PrintdeskError::Config(format!("RETENTION_STATUSES: unknown status {part}")))?;
        if !status.is_terminal() {
            return Err(PrintdeskError::Config(format!(
                "RETENTION_STATUSES: {status} is not a terminal status"
            )));
        }
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    if statuses.is_empty() {
        return Err(PrintdeskError::Config("RETENTION_STATUSES is empty".into()));
    }
    Ok(statuses)
}
