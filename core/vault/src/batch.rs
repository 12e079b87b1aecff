//! Batch processing on a bounded worker pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aethervault_common::{Error, ErrorKind, Password, Result};

use crate::naming::Mode;
use crate::pipeline::VaultPipeline;

/// One file to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: PathBuf,
    pub mode: Mode,
}

impl Job {
    pub fn new(source: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            source: source.into(),
            mode,
        }
    }

    /// Pick the mode from the file extension.
    pub fn detect(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let mode = Mode::detect(&source);
        Self { source, mode }
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct JobReport {
    /// Position of the job in the submitted list.
    pub index: usize,
    pub source: PathBuf,
    pub mode: Mode,
    /// Output path on success.
    pub outcome: Result<PathBuf>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Error classification, if the job failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(Error::kind)
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[JobReport]) -> Self {
        reports
            .iter()
            .fold(Self::default(), |mut summary, report| {
                match &report.outcome {
                    Ok(_) => summary.succeeded += 1,
                    Err(Error::Cancelled) => summary.cancelled += 1,
                    Err(_) => summary.failed += 1,
                }
                summary
            })
    }
}

/// Runs pipeline jobs concurrently.
///
/// Each job runs on the blocking thread pool; at most `workers` run at once.
/// Cancellation is checked before a job starts, so running jobs always
/// finish and never leave partial output.
pub struct BatchRunner {
    pipeline: Arc<VaultPipeline>,
    workers: usize,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// Create a runner using the pipeline's configured worker count.
    pub fn new(pipeline: Arc<VaultPipeline>) -> Self {
        let workers = pipeline.config().workers;
        Self::with_workers(pipeline, workers)
    }

    /// Create a runner with an explicit worker count (at least 1).
    pub fn with_workers(pipeline: Arc<VaultPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token, e.g. one tied to Ctrl-C.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels all jobs not yet started.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process `jobs` and return one report per job, in input order.
    ///
    /// A failing job never affects the others. Output goes next to each
    /// source, or into `output_dir` when given.
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        password: Password,
        output_dir: Option<PathBuf>,
    ) -> Vec<JobReport> {
        let total = jobs.len();
        let submitted: Vec<(PathBuf, Mode)> =
            jobs.iter().map(|job| (job.source.clone(), job.mode)).collect();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let password = Arc::new(password);
        let output_dir = Arc::new(output_dir);
        let mut tasks = JoinSet::new();

        info!(jobs = total, workers = self.workers, "Batch started");

        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let password = Arc::clone(&password);
            let output_dir = Arc::clone(&output_dir);
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let Job { source, mode } = job;
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) if cancel.is_cancelled() => {
                        debug!(index, "Job cancelled before start");
                        Err(Error::Cancelled)
                    }
                    Ok(_permit) => {
                        let path = source.clone();
                        tokio::task::spawn_blocking(move || {
                            pipeline.process_file(
                                &path,
                                mode,
                                output_dir.as_deref(),
                                &password,
                            )
                        })
                        .await
                        .unwrap_or_else(|e| Err(worker_error(e)))
                    }
                    Err(_) => Err(Error::Cancelled),
                };
                JobReport {
                    index,
                    source,
                    mode,
                    outcome,
                }
            });
        }

        let mut slots: Vec<Option<JobReport>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    let index = report.index;
                    slots[index] = Some(report);
                }
                Err(e) => warn!(error = %e, "Batch task aborted"),
            }
        }

        // A task lost to a panic or abort still gets its report.
        let reports: Vec<JobReport> = slots
            .into_iter()
            .zip(submitted)
            .enumerate()
            .map(|(index, (slot, (source, mode)))| {
                slot.unwrap_or_else(|| JobReport {
                    index,
                    source,
                    mode,
                    outcome: Err(Error::Worker("batch task aborted".to_string())),
                })
            })
            .collect();

        let summary = BatchSummary::from_reports(&reports);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Batch finished"
        );
        reports
    }
}

fn worker_error(err: JoinError) -> Error {
    if err.is_panic() {
        Error::Worker("pipeline panicked".to_string())
    } else {
        Error::Worker(err.to_string())
    }
}

/// Expand a list of paths into jobs with detected modes.
pub fn jobs_for<P: AsRef<Path>>(paths: &[P]) -> Vec<Job> {
    paths
        .iter()
        .map(|path| Job::detect(path.as_ref()))
        .collect()
}
