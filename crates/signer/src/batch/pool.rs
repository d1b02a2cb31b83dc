use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::{Job, JobReceiver};
use crate::context::SignerContext;
use crate::error::JobError;
use crate::stats::{StatsSnapshot, StatsTracker};

/// Default number of completed jobs between progress log lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    /// Log the running total every this many completed jobs. Zero disables it.
    pub progress_every: u64,
}

/// A fixed set of workers draining one shared job queue.
///
/// Workers run until the queue is closed and empty. Each job is read, signed
/// and written on the blocking thread pool, so a slow document only holds up
/// its own worker.
pub struct WorkerPool {
    workers: JoinSet<()>,
    stats: Arc<StatsTracker>,
}

impl WorkerPool {
    pub fn spawn(
        context: Arc<SignerContext>,
        stats: Arc<StatsTracker>,
        queue: JobReceiver,
        options: PoolOptions,
    ) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..options.workers.max(1) {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&context),
                Arc::clone(&stats),
                queue.clone(),
                options.progress_every,
            ));
        }
        Self { workers, stats }
    }

    /// Waits for every worker to exit and returns the final counters.
    ///
    /// A panicking worker is logged and does not take the others down; the
    /// job it held has already been counted as failed.
    pub async fn join(mut self) -> StatsSnapshot {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!("worker exited abnormally: {e}");
            }
        }
        self.stats.snapshot()
    }
}

async fn worker_loop(
    id: usize,
    context: Arc<SignerContext>,
    stats: Arc<StatsTracker>,
    queue: JobReceiver,
    progress_every: u64,
) {
    debug!("worker {id} started");
    while let Some(job) = queue.recv().await {
        let ticket = stats.begin_job();

        let input = job.input_path.clone();
        let task_context = Arc::clone(&context);
        let outcome = tokio::task::spawn_blocking(move || process_job(&task_context, &job))
            .await
            .map_err(JobError::from)
            .and_then(|result| result);

        let completed = match outcome {
            Ok(()) => {
                debug!("signed {}", input.display());
                ticket.succeed()
            }
            Err(e) => {
                error!("error processing {}: {e}", input.display());
                ticket.fail()
            }
        };

        if progress_every > 0 && completed % progress_every == 0 {
            info!("processed {completed} jobs");
        }
    }
    debug!("worker {id} finished");
}

/// Signs one job end to end. The certificate is resolved before the input
/// is touched, so an unknown name never reads or writes anything.
fn process_job(context: &SignerContext, job: &Job) -> Result<(), JobError> {
    let pipeline = context.pipeline();
    let cert = pipeline.resolve(&job.certificate_name)?;

    let document = std::fs::read(&job.input_path).map_err(|source| JobError::Read {
        path: job.input_path.clone(),
        source,
    })?;

    let password = job.password.as_deref().unwrap_or_default();
    let signed = pipeline.sign_with(&cert, context.default_props(), password, document)?;

    write_atomic(&job.output_path, &signed).map_err(|source| JobError::Write {
        path: job.output_path.clone(),
        source,
    })
}

/// Writes to a hidden sibling of `path` and renames it into place, so the
/// output is either absent, the previous file, or the complete new one.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    static STAGED: AtomicU64 = AtomicU64::new(0);

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"))?;
    let mut staging_name = OsString::from(".");
    staging_name.push(file_name);
    staging_name.push(format!(
        ".{}-{}.partial",
        std::process::id(),
        STAGED.fetch_add(1, Ordering::Relaxed)
    ));
    let staging = path.with_file_name(staging_name);

    let result = std::fs::write(&staging, bytes).and_then(|()| std::fs::rename(&staging, path));
    if result.is_err() {
        // Best effort; the write error is what gets reported.
        let _ = std::fs::remove_file(&staging);
    }
    result
}
