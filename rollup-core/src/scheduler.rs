use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Work the driver knows how to perform on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Fetch every city and check thresholds.
    Fetch,
    /// Reduce accumulated observations into stored summaries.
    Rollup,
}

#[derive(Debug, Clone)]
struct Job {
    task: Task,
    every: chrono::Duration,
    next_run: DateTime<Utc>,
}

/// Fixed-interval jobs, polled by the driver.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn every(&mut self, every: Duration, task: Task, now: DateTime<Utc>) {
        // Out-of-range intervals effectively never fire.
        let every = chrono::Duration::from_std(every).unwrap_or_else(|_| chrono::Duration::weeks(52 * 1000));
        self.jobs.push(Job {
            task,
            every,
            next_run: now.checked_add_signed(every).unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Due tasks in registration order. Each due job runs once per call,
    /// however many intervals were missed, and is rescheduled from `now`.
    pub fn run_pending(&mut self, now: DateTime<Utc>) -> Vec<Task> {
        let mut due = Vec::new();
        for job in &mut self.jobs {
            if job.next_run <= now {
                job.next_run = now.checked_add_signed(job.every).unwrap_or(DateTime::<Utc>::MAX_UTC);
                debug!(task = ?job.task, next_run = %job.next_run, "Scheduled task due");
                due.push(job.task);
            }
        }
        due
    }
}
