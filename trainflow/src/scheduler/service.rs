//! Triggers pipeline runs on a schedule and keeps their history.

use super::Schedule;
use crate::cancellation::CancellationToken;
use crate::context::PipelineContext;
use crate::core::{PipelineRun, RunTrigger};
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::Pipeline;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest uninterrupted wait before the cancellation token is rechecked.
const CANCEL_POLL: Duration = Duration::from_secs(1);

/// Runs kept in memory unless `with_history_limit` says otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Runs a pipeline manually or on its schedule.
///
/// Runs never overlap: a trigger that arrives while a run is in progress
/// waits for it to finish.
#[derive(Debug)]
pub struct PipelineScheduler {
    pipeline: Arc<Pipeline>,
    schedule: Schedule,
    event_sink: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
    run_lock: tokio::sync::Mutex<()>,
    history: RwLock<Vec<PipelineRun>>,
    history_limit: usize,
}

impl PipelineScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(pipeline: Pipeline, schedule: Schedule) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            schedule,
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
            run_lock: tokio::sync::Mutex::new(()),
            history: RwLock::new(Vec::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Sets the sink every run reports to.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Shares a cancellation token with every run and with the schedule loop.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Caps how many runs `runs` remembers; older runs are dropped first.
    /// A limit of zero keeps no history.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// The scheduled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The schedule.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Token that stops the schedule loop and abandons the current run
    /// before its next stage.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Runs the pipeline once, now.
    pub async fn trigger(&self) -> PipelineRun {
        self.execute(RunTrigger::Manual).await
    }

    /// Fires runs on the schedule until `max_runs` runs have completed or the
    /// cancellation token is set. `None` means no limit.
    ///
    /// `@once` runs immediately, exactly once. Fire times missed while a run
    /// was in progress are skipped, not caught up. Returns the runs started
    /// by this loop.
    pub async fn run(&self, max_runs: Option<usize>) -> Vec<PipelineRun> {
        let mut runs = Vec::new();
        if max_runs == Some(0) {
            return runs;
        }

        info!(pipeline = %self.pipeline.name(), schedule = %self.schedule, "Scheduler started");

        if !self.schedule.is_recurring() {
            if !self.cancellation.is_cancelled() {
                runs.push(self.execute(RunTrigger::Scheduled).await);
            }
            return runs;
        }

        let mut next = self.schedule.next_after(Utc::now());
        while let Some(fire_at) = next {
            if !self.wait_until(fire_at).await {
                break;
            }

            runs.push(self.execute(RunTrigger::Scheduled).await);
            if max_runs.is_some_and(|max| runs.len() >= max) {
                break;
            }

            let now = Utc::now();
            next = self.schedule.next_after(now.max(fire_at));
            if let Some(upcoming) = next {
                let skipped = self.missed_between(fire_at, now);
                if skipped > 0 {
                    warn!(pipeline = %self.pipeline.name(), skipped, next = %upcoming, "Skipped missed fire times");
                }
            }
        }

        info!(pipeline = %self.pipeline.name(), runs = runs.len(), "Scheduler stopped");
        runs
    }

    /// The most recent runs, oldest first, at most the history limit.
    #[must_use]
    pub fn runs(&self) -> Vec<PipelineRun> {
        self.history.read().clone()
    }

    /// The most recent run.
    #[must_use]
    pub fn last_run(&self) -> Option<PipelineRun> {
        self.history.read().last().cloned()
    }

    async fn execute(&self, trigger: RunTrigger) -> PipelineRun {
        let _guard = self.run_lock.lock().await;

        let ctx = Arc::new(
            PipelineContext::new(self.pipeline.name())
                .with_trigger(trigger)
                .with_event_sink(Arc::clone(&self.event_sink))
                .with_cancellation(Arc::clone(&self.cancellation)),
        );
        let run = self.pipeline.run(ctx).await;

        info!(run_id = %run.run_id, state = %run.state, ?trigger, "Run recorded");
        let mut history = self.history.write();
        history.push(run.clone());
        let excess = history.len().saturating_sub(self.history_limit);
        history.drain(..excess);
        drop(history);
        run
    }

    /// Sleeps until `fire_at`, waking periodically to check for cancellation.
    /// Returns false if cancelled.
    async fn wait_until(&self, fire_at: chrono::DateTime<Utc>) -> bool {
        loop {
            if self.cancellation.is_cancelled() {
                return false;
            }
            let remaining = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return true;
            }
            tokio::time::sleep(remaining.min(CANCEL_POLL)).await;
        }
    }

    /// Fire times strictly after `from` and not later than `until`.
    fn missed_between(&self, from: chrono::DateTime<Utc>, until: chrono::DateTime<Utc>) -> usize {
        let mut count = 0;
        let mut cursor = from;
        while let Some(t) = self.schedule.next_after(cursor) {
            if t > until {
                break;
            }
            count += 1;
            cursor = t;
        }
        count
    }
}
