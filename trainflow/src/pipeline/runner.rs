//! Sequential execution of a built pipeline.

use super::{RetryDecision, RetryPolicy, StageSpec};
use crate::context::PipelineContext;
use crate::core::{PipelineRun, RunState, StageResult};
use crate::errors::StageError;
use crate::events::{RUN_COMPLETED, RUN_STARTED, STAGE_FAILED, STAGE_RETRYING, STAGE_STARTED, STAGE_SUCCEEDED};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A validated, ordered chain of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub(crate) fn new(name: String, stages: Vec<StageSpec>, retry: RetryPolicy) -> Self {
        Self { name, stages, retry }
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Pipeline-wide retry policy.
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs every stage in order and returns the finished run record.
    ///
    /// A stage only starts after the previous one succeeded. A failed stage
    /// is retried per its policy; once attempts are exhausted the run ends
    /// `Failed` and later stages stay `Pending`. Cancellation is honoured
    /// before each stage, never during one.
    ///
    /// Stage failures are recorded in the run rather than returned; use
    /// [`PipelineRun::ensure_succeeded`] to turn a failed run into an error.
    pub async fn run(&self, ctx: Arc<PipelineContext>) -> PipelineRun {
        let mut run = PipelineRun::new(
            ctx.run_id(),
            &self.name,
            ctx.trigger(),
            self.stages
                .iter()
                .map(|s| StageResult::pending(&s.name, s.kind))
                .collect(),
        );

        info!(run_id = %run.run_id, pipeline = %self.name, stages = self.stages.len(), "Pipeline run started");
        ctx.emit(
            RUN_STARTED,
            None,
            None,
            json!({"pipeline": self.name, "trigger": run.trigger, "stages": self.stage_names()}),
        )
        .await;

        for (index, spec) in self.stages.iter().enumerate() {
            if ctx.is_cancelled() {
                let reason = ctx.cancellation().reason().unwrap_or_default();
                warn!(run_id = %run.run_id, stage = %spec.name, reason = %reason, "Run abandoned before stage");
                run.stages[index].record_failure(format!("run abandoned: {reason}"));
                return self
                    .finish(&ctx, run, RunState::Failed { stage: spec.name.clone() })
                    .await;
            }

            if !self.run_stage(&ctx, &mut run, index, spec).await {
                return self
                    .finish(&ctx, run, RunState::Failed { stage: spec.name.clone() })
                    .await;
            }
        }

        self.finish(&ctx, run, RunState::Succeeded).await
    }

    /// Runs one stage until it succeeds or its attempts run out.
    async fn run_stage(
        &self,
        ctx: &Arc<PipelineContext>,
        run: &mut PipelineRun,
        index: usize,
        spec: &StageSpec,
    ) -> bool {
        let policy = spec.retry.unwrap_or(self.retry);
        run.state = RunState::Running { stage: spec.name.clone() };

        loop {
            run.stages[index].begin_attempt();
            let attempt = run.stages[index].attempts;
            info!(run_id = %run.run_id, stage = %spec.name, attempt, "Stage started");
            ctx.emit(STAGE_STARTED, Some(&spec.name), Some(attempt), serde_json::Value::Null)
                .await;

            let stage_ctx = ctx.stage_context(&spec.name, attempt);
            match spec.runner.execute(&stage_ctx).await {
                Ok(output) => {
                    info!(run_id = %run.run_id, stage = %spec.name, attempt, "Stage succeeded");
                    ctx.emit(
                        STAGE_SUCCEEDED,
                        Some(&spec.name),
                        Some(attempt),
                        json!({"outputs": output.outputs}),
                    )
                    .await;
                    run.stages[index].succeed(output);
                    return true;
                }
                Err(cause) => {
                    let message = StageError::new(&spec.name, cause).to_string();
                    run.stages[index].record_failure(&message);

                    match policy.decide(attempt) {
                        RetryDecision::Retry(delay) => {
                            warn!(
                                run_id = %run.run_id,
                                stage = %spec.name,
                                attempt,
                                max_attempts = policy.max_attempts,
                                delay_secs = delay.as_secs_f64(),
                                error = %message,
                                "Stage failed, retrying"
                            );
                            run.state = RunState::Retrying {
                                stage: spec.name.clone(),
                                next_attempt: attempt + 1,
                            };
                            ctx.emit(
                                STAGE_RETRYING,
                                Some(&spec.name),
                                Some(attempt),
                                json!({"error": message, "delay_seconds": delay.as_secs_f64()}),
                            )
                            .await;
                            tokio::time::sleep(delay).await;
                            run.state = RunState::Running { stage: spec.name.clone() };
                        }
                        RetryDecision::GiveUp => {
                            error!(
                                run_id = %run.run_id,
                                stage = %spec.name,
                                attempts = attempt,
                                error = %message,
                                "Stage failed, attempts exhausted"
                            );
                            run.stages[index].fail(&message);
                            ctx.emit(STAGE_FAILED, Some(&spec.name), Some(attempt), json!({"error": message}))
                                .await;
                            return false;
                        }
                    }
                }
            }
        }
    }

    async fn finish(&self, ctx: &Arc<PipelineContext>, mut run: PipelineRun, state: RunState) -> PipelineRun {
        run.finish(state);
        info!(
            run_id = %run.run_id,
            pipeline = %self.name,
            state = %run.state,
            attempts = run.total_attempts(),
            "Pipeline run completed"
        );
        ctx.emit(RUN_COMPLETED, None, None, json!({"state": run.state})).await;
        run
    }
}
