use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug)]
struct Counters {
    succeeded: u64,
    /// Confirmed failures plus every job still in flight.
    failed: u64,
    in_flight: u64,
}

/// Job outcome counters shared by every batch worker.
///
/// A job is counted as failed the moment it starts and only flipped to
/// succeeded once it has fully completed. Both transitions happen under the
/// same lock, and snapshots subtract in-flight jobs, so readers only ever
/// see completed jobs.
#[derive(Debug)]
pub struct StatsTracker {
    counters: Mutex<Counters>,
    start_time: DateTime<Utc>,
    started: Instant,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub start_time: DateTime<Utc>,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Completed jobs per second since the tracker was created.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.completed() as f64 / secs } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters {
                succeeded: 0,
                failed: 0,
                in_flight: 0,
            }),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Provisionally counts a job as failed.
    ///
    /// The returned ticket must be settled with [`JobTicket::succeed`] for the
    /// job to count as a success. Dropping it any other way, including while
    /// unwinding, confirms the failure.
    pub fn begin_job(&self) -> JobTicket<'_> {
        let mut counters = self.counters.lock();
        counters.failed += 1;
        counters.in_flight += 1;
        JobTicket {
            stats: self,
            settled: false,
        }
    }

    pub fn record_success(&self) -> u64 {
        self.begin_job().succeed()
    }

    pub fn record_failure(&self) -> u64 {
        self.begin_job().fail()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters.lock();
        StatsSnapshot {
            succeeded: counters.succeeded,
            failed: counters.failed - counters.in_flight,
            in_flight: counters.in_flight,
            start_time: self.start_time,
            elapsed: self.started.elapsed(),
        }
    }

    /// Settles one in-flight job, returning the number of completed jobs.
    fn complete_job(&self, outcome: Outcome) -> u64 {
        let mut counters = self.counters.lock();
        counters.in_flight -= 1;
        if outcome == Outcome::Succeeded {
            counters.failed -= 1;
            counters.succeeded += 1;
        }
        counters.succeeded + counters.failed - counters.in_flight
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A job that has been counted as provisionally failed.
#[must_use = "dropping a ticket immediately counts the job as failed"]
#[derive(Debug)]
pub struct JobTicket<'a> {
    stats: &'a StatsTracker,
    settled: bool,
}

impl JobTicket<'_> {
    /// Reverses the provisional failure. Returns the number of completed jobs.
    pub fn succeed(mut self) -> u64 {
        self.settle(Outcome::Succeeded)
    }

    /// Confirms the failure. Returns the number of completed jobs.
    pub fn fail(mut self) -> u64 {
        self.settle(Outcome::Failed)
    }

    fn settle(&mut self, outcome: Outcome) -> u64 {
        self.settled = true;
        self.stats.complete_job(outcome)
    }
}

impl Drop for JobTicket<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Outcome::Failed);
        }
    }
}
