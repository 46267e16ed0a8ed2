use std::future::{self, Future};

use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use crate::application::RuntimeConfig;
use crate::archive::ArchiveName;
use crate::history::{HISTORY_FILE_NAME, HistoryLoadError, HistorySaveError, HistoryStore};
use crate::orchestrator::{DirectoryFailure, Orchestrator, OrchestratorError, RunOutcome};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        Self::run_until(app_config, interrupt_signal()).await
    }

    /// Runs one archival pass that stops early once `interrupt` resolves.
    ///
    /// The history is saved exactly once after the pass, whatever ended it.
    /// Nothing is archived or saved when the existing history is unreadable.
    pub async fn run_until(
        app_config: impl Into<RuntimeConfig>,
        interrupt: impl Future<Output = ()>,
    ) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let store = HistoryStore::in_dir(&app_config.root);

        let mut history = store
            .load()
            .await
            .inspect_err(|err| {
                if err.is_format_error() {
                    error!("{HISTORY_FILE_NAME} was left untouched, fix or remove it to continue");
                }
            })
            .context(HistoryLoadSnafu)?;
        if history.is_empty() {
            info!("Starting without archive history");
        } else {
            debug!("Loaded {} archive history entries", history.len());
        }

        let outcome = Orchestrator::new(&app_config.root)
            .context(OrchestratorSnafu)?
            .run(&mut history, interrupt)
            .await
            .context(OrchestratorSnafu)?;
        info!("Archived directories: {:?}", outcome.archived());

        store.save(&history).await.context(HistorySaveSnafu)?;

        match outcome {
            RunOutcome::Aborted {
                archive_name,
                failure,
                ..
            } => Err(failure).context(BatchAbortedSnafu { archive_name }),
            RunOutcome::Interrupted { archive_name, .. } => {
                info!("Run interrupted at {archive_name}");
                Ok(())
            }
            RunOutcome::Completed { .. } => Ok(()),
        }
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupt_signal() {
    match compio::signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt"),
        Err(err) => {
            warn!("Failed to listen for interrupts: {err}");
            future::pending::<()>().await
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the archive history"))]
    HistoryLoadError { source: HistoryLoadError },
    #[snafu(display("Critical failure encountered while scanning directories"))]
    OrchestratorError { source: OrchestratorError },
    #[snafu(display("Critical failure encountered while saving the archive history"))]
    HistorySaveError { source: HistorySaveError },
    #[snafu(display("Archiving stopped at {archive_name}, remaining directories were skipped"))]
    BatchAborted {
        archive_name: ArchiveName,
        source: DirectoryFailure,
    },
}
