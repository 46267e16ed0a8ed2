use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use futures::FutureExt;
use futures::future::{self, Either};
use futures_channel::oneshot;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use super::Progress;
use crate::archive::{ArchiveError, ArchiveName, Archiver};
use crate::detection::{self, DetectionError};
use crate::history::{History, Timestamp, Watermark};

/// How a run over the subdirectories ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every subdirectory was visited; `archived` lists the ones packed.
    Completed { archived: Vec<String> },
    /// A directory failed and the remaining ones were skipped.
    Aborted {
        archived: Vec<String>,
        archive_name: ArchiveName,
        failure: DirectoryFailure,
    },
    /// An interrupt arrived while `archive_name` was next or in progress.
    Interrupted {
        archived: Vec<String>,
        archive_name: ArchiveName,
    },
}

impl RunOutcome {
    pub fn archived(&self) -> &[String] {
        match self {
            RunOutcome::Completed { archived }
            | RunOutcome::Aborted { archived, .. }
            | RunOutcome::Interrupted { archived, .. } => archived,
        }
    }
}

enum Step {
    Unchanged,
    Archived,
    Interrupted,
}

/// Visits every immediate subdirectory of a root, archiving the changed ones.
pub struct Orchestrator {
    root: PathBuf,
    archiver: Arc<Archiver>,
    dispatcher: Dispatcher,
    progress: Progress,
}

impl Orchestrator {
    pub fn new(root: &Path) -> Result<Self, OrchestratorError> {
        // One worker: at most one archive is being written at any time.
        let dispatcher = DispatcherBuilder::new()
            .worker_threads(NonZeroUsize::MIN)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            root: root.to_path_buf(),
            archiver: Arc::new(Archiver::new(root)),
            dispatcher,
            progress: Progress::new(root),
        })
    }

    /// Processes subdirectories in name order, recording a new watermark for
    /// each one archived.
    ///
    /// The first failing directory ends the run, as does `interrupt`
    /// resolving. Either way `history` keeps what was archived so far.
    pub async fn run<I>(
        &self,
        history: &mut History,
        interrupt: I,
    ) -> Result<RunOutcome, OrchestratorError>
    where
        I: Future<Output = ()>,
    {
        let directories = list_subdirectories(&self.root)?;
        debug!("Found {} subdirectories", directories.len());

        let mut interrupt = pin!(interrupt);
        let mut archived = Vec::new();

        for directory in directories {
            let archive_name = ArchiveName::for_directory(&directory);
            if interrupt.as_mut().now_or_never().is_some() {
                self.progress.interrupted(&archive_name);
                return Ok(RunOutcome::Interrupted {
                    archived,
                    archive_name,
                });
            }

            let watermark = history.watermark(&directory);
            self.progress.directory(&directory, watermark);

            match self
                .process(&directory, &archive_name, watermark, interrupt.as_mut())
                .await
            {
                Ok(Step::Unchanged) => debug!("{directory} is up to date"),
                Ok(Step::Archived) => {
                    history.record(directory.clone(), Timestamp::now());
                    archived.push(directory);
                }
                Ok(Step::Interrupted) => {
                    self.progress.interrupted(&archive_name);
                    return Ok(RunOutcome::Interrupted {
                        archived,
                        archive_name,
                    });
                }
                Err(failure) => {
                    warn!("Stopping after failure in {directory}");
                    self.progress.failed(&archive_name, &failure);
                    return Ok(RunOutcome::Aborted {
                        archived,
                        archive_name,
                        failure,
                    });
                }
            }
        }

        info!("Processed all subdirectories, archived {}", archived.len());
        Ok(RunOutcome::Completed { archived })
    }

    async fn process<I>(
        &self,
        directory: &str,
        archive_name: &ArchiveName,
        watermark: Watermark,
        interrupt: Pin<&mut I>,
    ) -> Result<Step, DirectoryFailure>
    where
        I: Future<Output = ()>,
    {
        let Some(modification) =
            detection::is_modified_after(&self.root.join(directory), watermark)
                .context(DetectionFailedSnafu)?
        else {
            return Ok(Step::Unchanged);
        };
        debug!(
            "First change in {directory} dated {}",
            modification.timestamp()
        );
        self.progress.modified(&modification);
        self.progress.creating(archive_name);

        let abandoned = Arc::new(AtomicBool::new(false));
        let receiver = self.dispatch_archive(directory, Arc::clone(&abandoned))?;
        match future::select(receiver, interrupt).await {
            Either::Left((result, _)) => {
                result
                    .context(ArchiveJobCanceledSnafu)?
                    .context(ArchivalFailedSnafu)?;
                Ok(Step::Archived)
            }
            Either::Right(((), receiver)) => {
                // Wait for the worker to drop its partial file.
                abandoned.store(true, Ordering::Release);
                match receiver.await {
                    Ok(Ok(name)) => debug!("{name} was completed before the interrupt"),
                    Ok(Err(ArchiveError::Abandoned { .. })) => {
                        debug!("Abandoned archiving {directory}")
                    }
                    Ok(Err(err)) => warn!("Archiving {directory} failed while stopping: {err}"),
                    Err(_) => warn!("Archive job for {directory} was dropped while stopping"),
                }
                Ok(Step::Interrupted)
            }
        }
    }

    /// Hands the archive job to the worker thread.
    fn dispatch_archive(
        &self,
        directory: &str,
        abandoned: Arc<AtomicBool>,
    ) -> Result<oneshot::Receiver<Result<ArchiveName, ArchiveError>>, DirectoryFailure> {
        let archiver = Arc::clone(&self.archiver);
        let owned_directory = directory.to_string();

        self.dispatcher
            .dispatch(move || async move { archiver.create_archive(&owned_directory, &abandoned) })
            .map_err(|e| DirectoryFailure::DispatchError {
                directory: directory.to_string(),
                error: e.to_string(),
            })
    }
}

/// Names of the immediate subdirectories of `root`, sorted.
fn list_subdirectories(root: &Path) -> Result<Vec<String>, OrchestratorError> {
    let mut directories = Vec::new();

    let entries = std::fs::read_dir(root).context(ListSnafu {
        root: root.to_path_buf(),
    })?;
    for entry in entries {
        let entry = entry.context(ListSnafu {
            root: root.to_path_buf(),
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => directories.push(name),
            Err(name) => warn!("Skipping directory with non UTF-8 name: {name:?}"),
        }
    }

    directories.sort();
    Ok(directories)
}

#[derive(Debug, Snafu)]
pub enum OrchestratorError {
    #[snafu(display("Failed to create the archive worker"))]
    DispatcherError { source: io::Error },
    #[snafu(display("Failed to list subdirectories of {}", root.display()))]
    ListError { root: PathBuf, source: io::Error },
}

/// Why a single directory could not be brought up to date.
#[derive(Debug, Snafu)]
pub enum DirectoryFailure {
    #[snafu(display("{source}"))]
    DetectionFailed { source: DetectionError },
    #[snafu(display("{source}"))]
    ArchivalFailed { source: ArchiveError },
    #[snafu(display("Failed to dispatch archive job for '{}': {}", directory, error))]
    DispatchError { directory: String, error: String },
    #[snafu(display("Archive job got cancelled"))]
    ArchiveJobCanceled { source: oneshot::Canceled },
}
