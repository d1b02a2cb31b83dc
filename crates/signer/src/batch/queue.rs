use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::Job;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Creates a bounded multi-producer, multi-consumer job queue.
///
/// Senders wait while `capacity` jobs are pending. The queue closes once
/// every [`JobSender`] is dropped; receivers then drain what is left and
/// get `None`.
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        JobSender { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

#[derive(Debug, thiserror::Error)]
#[error("job queue is closed")]
pub struct QueueClosed(pub Job);

impl JobSender {
    /// Enqueues a job, waiting for room when the queue is full.
    pub async fn send(&self, job: Job) -> Result<(), QueueClosed> {
        self.tx.send(job).await.map_err(|e| QueueClosed(e.0))
    }
}

/// Consumer half shared by every worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobReceiver {
    /// Waits for the next job. `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}
