//! Plan and execution state types
//!
//! The durable data model for a run: an ordered plan of steps, the
//! results appended as steps complete, and the cursor/error bookkeeping
//! that lets a run resume after a crash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Timestamp type for plan operations
///
/// Uses UTC to avoid timezone ambiguity. Serialized through serde so
/// checkpointed timestamps round-trip as real date values.
pub type Timestamp = DateTime<Utc>;

/// Returns the current timestamp
pub fn now() -> Timestamp {
    Utc::now()
}

/// Lifecycle status of a plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet visited by the executor
    Pending,
    /// Currently dispatched to the step runner
    Running,
    /// Finished successfully; a result was appended
    Completed,
    /// The step runner failed; terminal for the run
    Failed,
    /// A declared dependency was unsatisfied when the step was
    /// visited; terminal for the run, never retried
    Skipped,
}

impl StepStatus {
    /// Whether the executor will never visit this step again in the
    /// current run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

/// A single step in an ordered plan
///
/// Authored before a run; mutated only by the executor while the run
/// advances. Lives inside [`AgentState`] and is never deleted on its
/// own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique id within the plan
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Opaque operation name resolved by the step runner
    pub action: String,
    /// Parameters passed to the step runner
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Current lifecycle status
    pub status: StepStatus,
    /// Ids of steps whose results must exist before this step runs
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PlanStep {
    /// Create a pending step
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action: action.into(),
            parameters: HashMap::new(),
            status: StepStatus::Pending,
            dependencies: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Declare a dependency on another step's result
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }
}

/// The recorded outcome of a completed step
///
/// Appended exactly once per successfully completed step; the results
/// list is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Id of the completed step
    pub step_id: String,
    /// Output value returned by the step runner
    pub output: Value,
    /// When the step completed
    pub completed_at: Timestamp,
    /// Wall-clock duration of the runner invocation
    pub duration_ms: u64,
    /// Token usage reported by the runner, if any
    pub token_usage: Option<u64>,
}

/// The error that stopped a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastError {
    /// Index of the failing step in the plan
    pub step_index: usize,
    /// Failure message from the step runner
    pub message: String,
    /// When the failure occurred
    pub timestamp: Timestamp,
}

/// Full execution state of an agent run
///
/// Invariants:
/// - `results` only ever contains entries for steps whose status is
///   [`StepStatus::Completed`]
/// - `current_step_index` is monotonically non-decreasing within one
///   execution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// The query or goal this run is serving
    pub query: String,
    /// Ordered plan of steps
    pub plan: Vec<PlanStep>,
    /// Cursor into the plan
    pub current_step_index: usize,
    /// Results of completed steps, append-only
    pub results: Vec<StepResult>,
    /// Free-form context shared across steps
    #[serde(default)]
    pub context: HashMap<String, Value>,
    /// The error that stopped the last run, if any
    pub last_error: Option<LastError>,
}

impl AgentState {
    /// Initialize fresh state from an authored plan
    ///
    /// Steps keep whatever status the author flagged them with, except
    /// that a stale `Running` marker is reset to `Pending`; nothing
    /// can be mid-flight in a fresh run.
    pub fn new(query: impl Into<String>, mut plan: Vec<PlanStep>) -> Self {
        for step in &mut plan {
            if step.status == StepStatus::Running {
                step.status = StepStatus::Pending;
            }
        }

        Self {
            query: query.into(),
            plan,
            current_step_index: 0,
            results: Vec::new(),
            context: HashMap::new(),
            last_error: None,
        }
    }

    /// Ids of steps that have a recorded result
    pub fn completed_step_ids(&self) -> HashSet<&str> {
        self.results.iter().map(|r| r.step_id.as_str()).collect()
    }
}
