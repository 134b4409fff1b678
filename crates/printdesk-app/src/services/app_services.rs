// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the job store and blob bucket once and
// builds the lifecycle manager, sweeper and print agent on top of them.
//
// Every field is Arc-backed, so the struct is cheap to clone into axum
// handlers and spawned tasks.

use std::sync::Arc;

use tracing::info;

use printdesk_core::config::DeskConfig;
use printdesk_core::error::Result;
use printdesk_print::Printer;
use printdesk_queue::{JobLifecycle, PrintAgent, RetentionSweeper};
use printdesk_store::{BlobStore, FsBlobStore, JobStore, RetryConfig, RetryingJobStore, SqliteJobStore};

use super::data_dir;

#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    lifecycle: JobLifecycle,
    config: Arc<DeskConfig>,
}

impl AppServices {
    /// Open `jobs.db` and the blob bucket under the configured data
    /// directory.  Call once at startup.
    pub fn init(config: DeskConfig) -> Result<Self> {
        let dir = data_dir::data_dir(&config.store)?;
        info!(path = %dir.display(), "initialising services");

        let store = SqliteJobStore::open(dir.join("jobs.db"), config.store.busy_timeout)?;
        let store: Arc<dyn JobStore> = Arc::new(RetryingJobStore::new(
            store,
            RetryConfig::with_max_retries(config.store.max_retries),
        ));
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::open(&dir, &config.store.bucket)?);

        Ok(Self::with_stores(config, store, blobs))
    }

    /// Assemble services over already-open stores.
    pub fn with_stores(config: DeskConfig, store: Arc<dyn JobStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let lifecycle = JobLifecycle::new(store.clone(), blobs.clone());
        Self {
            store,
            blobs,
            lifecycle,
            config: Arc::new(config),
        }
    }

    pub fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.store.clone(), self.blobs.clone(), self.config.sweeper.clone())
    }

    pub fn agent(&self, printer: Arc<dyn Printer>) -> PrintAgent {
        PrintAgent::new(self.lifecycle.clone(), printer, self.config.agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use printdesk_core::types::JobStatus;
    use printdesk_print::DryRunPrinter;
    use printdesk_queue::Upload;

    use super::*;

    #[tokio::test]
    async fn init_opens_stores_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = DeskConfig::default();
        config.store.data_dir = Some(tmp.path().to_path_buf());

        let services = AppServices::init(config).unwrap();
        assert!(tmp.path().join("jobs.db").exists());
        assert!(tmp.path().join("print-files").is_dir());

        let job = services
            .lifecycle()
            .submit(Upload {
                file_name: "a.pdf".into(),
                bytes: b"%PDF".to_vec(),
                ..Upload::default()
            })
            .await
            .unwrap();
        services.lifecycle().approve(job.id).await.unwrap();

        let agent = services.agent(Arc::new(DryRunPrinter));
        let report = agent.poll_once().await.unwrap().unwrap();
        assert_eq!(report.printed, 1);
        assert_eq!(services.lifecycle().get(job.id).await.unwrap().status, JobStatus::Done);
    }
}
