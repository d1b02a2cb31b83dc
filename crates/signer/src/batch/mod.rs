//! Bulk signing driven by line-oriented input.
//!
//! Each input line names one job:
//!
//! ```text
//! certificateName|inputPath|outputPath
//! ```
//!
//! A producer feeds parsed jobs into a bounded [`queue`], a fixed
//! [`WorkerPool`] consumes them, and the run ends with a summary once the
//! input is exhausted and every worker has drained the queue.

mod pool;
mod queue;

pub use pool::{DEFAULT_PROGRESS_EVERY, PoolOptions, WorkerPool};
pub use queue::{DEFAULT_CAPACITY, JobReceiver, JobSender, QueueClosed, job_queue};

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::context::SignerContext;
use crate::stats::{StatsSnapshot, StatsTracker};

/// One unit of batch work, consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub certificate_name: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub password: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobLineError {
    #[error("expected 3 fields separated by '|', got {0}")]
    FieldCount(usize),
    #[error("field {0} is empty")]
    EmptyField(usize),
}

impl FromStr for Job {
    type Err = JobLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split('|').collect();
        let &[name, input, output] = fields.as_slice() else {
            return Err(JobLineError::FieldCount(fields.len()));
        };
        if let Some(index) = [name, input, output].iter().position(|f| f.is_empty()) {
            return Err(JobLineError::EmptyField(index + 1));
        }
        Ok(Job {
            certificate_name: name.to_string(),
            input_path: PathBuf::from(input),
            output_path: PathBuf::from(output),
            password: None,
        })
    }
}

/// What the producer did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub accepted: u64,
    pub skipped: u64,
}

/// Reads job lines until end of input and enqueues them.
///
/// Blank lines are ignored. Malformed lines, including ones that are not
/// valid UTF-8, are skipped with a warning. The queue is closed when this
/// returns, because `queue` is consumed.
pub async fn feed_jobs<R>(
    mut input: R,
    queue: JobSender,
    password: Option<Vec<u8>>,
) -> std::io::Result<FeedReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = FeedReport::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(
                "skipping invalid item: {} (not valid UTF-8)",
                String::from_utf8_lossy(&buf).trim()
            );
            report.skipped += 1;
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut job = match line.parse::<Job>() {
            Ok(job) => job,
            Err(e) => {
                warn!("skipping invalid item: {line} ({e})");
                report.skipped += 1;
                continue;
            }
        };
        job.password = password.clone();

        if queue.send(job).await.is_err() {
            warn!("job queue closed early, stopping input");
            break;
        }
        report.accepted += 1;
    }
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub progress_every: u64,
    /// Lock password applied to every job.
    pub password: Option<Vec<u8>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: DEFAULT_CAPACITY,
            progress_every: DEFAULT_PROGRESS_EVERY,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchReport {
    pub stats: StatsSnapshot,
    pub feed: FeedReport,
}

/// Runs a whole batch: spawns the pool, feeds it from `input`, waits for
/// every worker and logs the end-of-run summary.
///
/// Failing to read `input` stops the producer; jobs already queued are
/// still processed before the error is returned.
pub async fn run_batch<R>(
    context: Arc<SignerContext>,
    input: R,
    options: BatchOptions,
) -> std::io::Result<BatchReport>
where
    R: AsyncBufRead + Unpin,
{
    let stats = Arc::new(StatsTracker::new());
    let (sender, receiver) = job_queue(options.queue_capacity);

    info!("starting {} workers", options.workers);
    let pool = WorkerPool::spawn(
        context,
        Arc::clone(&stats),
        receiver,
        PoolOptions {
            workers: options.workers,
            progress_every: options.progress_every,
        },
    );

    info!("waiting for jobs");
    let fed = feed_jobs(input, sender, options.password).await;
    let stats = pool.join().await;

    info!("{} succeeded. {} failed.", stats.succeeded, stats.failed);
    info!(
        "{:.2} seconds. {:.2} / sec",
        stats.elapsed.as_secs_f64(),
        stats.throughput()
    );

    let feed = fed?;
    if feed.skipped > 0 {
        info!("{} invalid lines skipped", feed.skipped);
    }
    Ok(BatchReport { stats, feed })
}
