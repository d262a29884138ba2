//! Plan executor
//!
//! Drives a plan forward one step at a time, checkpointing after each
//! completed step so a crashed or failed run resumes where it stopped.
//!
//! Step failures never propagate out of [`PlanExecutor::execute`]; they
//! are recorded in the returned [`ExecutionResult`] and in the state's
//! `last_error`. The only error the executor raises is
//! [`Error::CheckpointNotFound`] when the caller names a checkpoint
//! that does not exist.

use crate::checkpoint::{CheckpointId, CheckpointStore, SaveOptions, TriggerKind};
use crate::runner::{NullRunner, StepRunner};
use crate::types::{now, AgentState, LastError, PlanStep, StepResult, StepStatus};
use mooring_core::{Error, Result, SessionId, PLAN_STEPS_COUNT_MAX};
use mooring_storage::SessionKV;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Progress notifications emitted while a plan runs
///
/// Delivery is best-effort; a dropped receiver never stalls execution.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    StepStarted {
        step_index: usize,
        step_id: String,
        description: String,
    },
    StepCompleted {
        step_index: usize,
        step_id: String,
        duration_ms: u64,
    },
    StepSkipped {
        step_index: usize,
        step_id: String,
        missing_dependency: String,
    },
    StepFailed {
        step_index: usize,
        step_id: String,
        message: String,
    },
    CheckpointSaved {
        checkpoint_id: CheckpointId,
        step_number: usize,
    },
    ExecutionFinished {
        success: bool,
    },
}

/// Options controlling a single execution run
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Resume from the session's latest checkpoint if one exists,
    /// falling back to a fresh run from the supplied plan
    pub resume_from_checkpoint: bool,
    /// Resume from this exact checkpoint; raises
    /// [`Error::CheckpointNotFound`] if it does not exist
    pub checkpoint_id: Option<CheckpointId>,
    /// Skip the automatic checkpoint after each completed step
    pub skip_step_checkpoints: bool,
}

impl ExecutionOptions {
    /// Options for a fresh run
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Options that resume from the latest checkpoint
    pub fn resume() -> Self {
        Self {
            resume_from_checkpoint: true,
            ..Default::default()
        }
    }

    /// Options that resume from a specific checkpoint
    pub fn resume_at(checkpoint_id: CheckpointId) -> Self {
        Self {
            checkpoint_id: Some(checkpoint_id),
            ..Default::default()
        }
    }
}

/// Outcome of an execution run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the run reached the end of the plan
    pub success: bool,
    /// Final state; persisted in the run's last checkpoint
    pub state: AgentState,
    /// Failure message when `success` is false
    pub error: Option<String>,
    /// Wall-clock duration of the whole run
    pub total_duration_ms: u64,
    /// Number of steps the runner actually executed this run
    /// (excludes skipped steps and steps completed in earlier runs)
    pub steps_executed: usize,
    /// Whether the run started from a checkpoint
    pub resumed_from_checkpoint: bool,
}

/// Checkpointed plan executor
pub struct PlanExecutor<K: SessionKV> {
    checkpoints: CheckpointStore<K>,
    runner: Arc<dyn StepRunner>,
    events: Option<mpsc::UnboundedSender<ExecutionEvent>>,
}

impl<K: SessionKV> PlanExecutor<K> {
    /// Create an executor with no runner configured
    ///
    /// Every step fails until [`with_runner`](Self::with_runner) is
    /// called, which still exercises the checkpoint-on-error path.
    pub fn new(checkpoints: CheckpointStore<K>) -> Self {
        Self {
            checkpoints,
            runner: Arc::new(NullRunner),
            events: None,
        }
    }

    /// Set the step runner
    pub fn with_runner(mut self, runner: Arc<dyn StepRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Subscribe to progress events for subsequent runs
    ///
    /// Replaces any previous subscription.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// The checkpoint store backing this executor
    pub fn checkpoints(&self) -> &CheckpointStore<K> {
        &self.checkpoints
    }

    /// Execute a plan for a session
    ///
    /// Runs until the plan is exhausted or a step fails. Steps whose
    /// dependencies lack a recorded result are skipped in the same
    /// pass and never revisited. A checkpoint is written after each
    /// completed step, after a failure, and once more at the end of a
    /// successful run.
    #[instrument(skip(self, plan, options), fields(session = %session, plan_len = plan.len()))]
    pub async fn execute(
        &self,
        session: &SessionId,
        query: &str,
        plan: Vec<PlanStep>,
        options: ExecutionOptions,
    ) -> Result<ExecutionResult> {
        assert!(
            plan.len() <= PLAN_STEPS_COUNT_MAX,
            "plan exceeds {} steps",
            PLAN_STEPS_COUNT_MAX
        );

        let run_start = Instant::now();
        let (mut state, resumed) = self.resolve_state(session, query, plan, &options).await?;

        let mut steps_executed = 0usize;
        let mut run_error: Option<String> = None;

        while state.current_step_index < state.plan.len() {
            let index = state.current_step_index;

            // Already done in an earlier run
            if state.plan[index].status == StepStatus::Completed {
                state.current_step_index += 1;
                continue;
            }

            // Dependency check against recorded results; a miss skips
            // the step for good, even if the dependency would have
            // completed later in this same run
            let completed = state.completed_step_ids();
            let missing = state.plan[index]
                .dependencies
                .iter()
                .find(|dep| !completed.contains(dep.as_str()))
                .cloned();
            drop(completed);

            if let Some(missing_dependency) = missing {
                let step_id = state.plan[index].id.clone();
                state.plan[index].status = StepStatus::Skipped;
                warn!(step = %step_id, dependency = %missing_dependency, "skipping step");
                self.emit(ExecutionEvent::StepSkipped {
                    step_index: index,
                    step_id,
                    missing_dependency,
                });
                state.current_step_index += 1;
                continue;
            }

            // Clone so the runner can borrow the state alongside the step
            let step = {
                state.plan[index].status = StepStatus::Running;
                state.plan[index].clone()
            };

            self.emit(ExecutionEvent::StepStarted {
                step_index: index,
                step_id: step.id.clone(),
                description: step.description.clone(),
            });

            let step_start = Instant::now();
            let outcome = self.runner.run(&step, &state).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    state.plan[index].status = StepStatus::Completed;
                    state.results.push(StepResult {
                        step_id: step.id.clone(),
                        output: output.value,
                        completed_at: now(),
                        duration_ms,
                        token_usage: output.token_usage,
                    });
                    state.current_step_index += 1;
                    steps_executed += 1;

                    self.emit(ExecutionEvent::StepCompleted {
                        step_index: index,
                        step_id: step.id.clone(),
                        duration_ms,
                    });

                    if !options.skip_step_checkpoints {
                        if let Err(e) = self
                            .checkpoint_after(
                                session,
                                &state,
                                SaveOptions::auto()
                                    .with_duration_ms(duration_ms)
                                    .with_description(format!("After step '{}'", step.id)),
                            )
                            .await
                        {
                            run_error = Some(e.to_string());
                            break;
                        }
                    }
                }
                Err(e) => {
                    if !e.is_captured() {
                        warn!(step = %step.id, error = %e, "infrastructure error during step");
                    }
                    let message = e.to_string();
                    state.plan[index].status = StepStatus::Failed;
                    state.last_error = Some(LastError {
                        step_index: index,
                        message: message.clone(),
                        timestamp: now(),
                    });

                    self.emit(ExecutionEvent::StepFailed {
                        step_index: index,
                        step_id: step.id.clone(),
                        message: message.clone(),
                    });

                    // Best effort; the failure message wins over any
                    // checkpoint write error
                    if let Err(save_err) = self
                        .checkpoint_after(
                            session,
                            &state,
                            SaveOptions::auto()
                                .with_trigger(TriggerKind::Error)
                                .with_duration_ms(duration_ms)
                                .with_description(format!("Step '{}' failed", step.id)),
                        )
                        .await
                    {
                        warn!(error = %save_err, "failed to write error checkpoint");
                    }

                    run_error = Some(message);
                    break;
                }
            }
        }

        let success = run_error.is_none();
        if success {
            if let Err(e) = self
                .checkpoint_after(
                    session,
                    &state,
                    SaveOptions::auto().with_description("Execution complete"),
                )
                .await
            {
                run_error = Some(e.to_string());
            }
        }

        let success = run_error.is_none();
        self.emit(ExecutionEvent::ExecutionFinished { success });
        info!(
            session = %session,
            success,
            steps_executed,
            resumed,
            "execution finished"
        );

        Ok(ExecutionResult {
            success,
            state,
            error: run_error,
            total_duration_ms: run_start.elapsed().as_millis() as u64,
            steps_executed,
            resumed_from_checkpoint: resumed,
        })
    }

    /// Resume the session from its latest checkpoint
    ///
    /// Completes with an empty successful result if the session has no
    /// checkpoints and therefore nothing to resume.
    pub async fn resume(&self, session: &SessionId) -> Result<ExecutionResult> {
        self.execute(session, "", Vec::new(), ExecutionOptions::resume())
            .await
    }

    /// Resume the session from a specific checkpoint
    pub async fn resume_from(
        &self,
        session: &SessionId,
        checkpoint_id: CheckpointId,
    ) -> Result<ExecutionResult> {
        self.execute(
            session,
            "",
            Vec::new(),
            ExecutionOptions::resume_at(checkpoint_id),
        )
        .await
    }

    async fn resolve_state(
        &self,
        session: &SessionId,
        query: &str,
        plan: Vec<PlanStep>,
        options: &ExecutionOptions,
    ) -> Result<(AgentState, bool)> {
        if let Some(id) = &options.checkpoint_id {
            let checkpoint = self
                .checkpoints
                .load(id)
                .await?
                .ok_or_else(|| Error::checkpoint_not_found(id.to_string()))?;
            info!(checkpoint = %id, step_number = checkpoint.step_number, "resuming from checkpoint");
            return Ok((checkpoint.state, true));
        }

        if options.resume_from_checkpoint {
            if let Some(checkpoint) = self.checkpoints.load_latest(session).await? {
                info!(
                    checkpoint = %checkpoint.id,
                    step_number = checkpoint.step_number,
                    "resuming from latest checkpoint"
                );
                return Ok((checkpoint.state, true));
            }
        }

        Ok((AgentState::new(query, plan), false))
    }

    async fn checkpoint_after(
        &self,
        session: &SessionId,
        state: &AgentState,
        options: SaveOptions,
    ) -> Result<()> {
        let checkpoint = self.checkpoints.save(session, state, options).await?;
        self.emit(ExecutionEvent::CheckpointSaved {
            step_number: checkpoint.step_number,
            checkpoint_id: checkpoint.id,
        });
        Ok(())
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.events {
            // Receiver may be gone; progress events are best-effort
            let _ = tx.send(event);
        }
    }
}
