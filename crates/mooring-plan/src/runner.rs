//! Step runners
//!
//! A [`StepRunner`] turns one [`PlanStep`] into an output value. The
//! executor treats the runner as an opaque async callback; the
//! [`ActionRegistry`] is the batteries-included runner that dispatches
//! on the step's action name.

use crate::types::{AgentState, PlanStep};
use async_trait::async_trait;
use mooring_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Output of a single step invocation
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The value recorded in the step's result
    pub value: Value,
    /// Token usage attributed to this step, if the runner tracks it
    pub token_usage: Option<u64>,
}

impl StepOutput {
    /// Create an output with no token accounting
    pub fn new(value: Value) -> Self {
        Self {
            value,
            token_usage: None,
        }
    }

    /// Attach a token usage figure
    pub fn with_token_usage(mut self, token_usage: u64) -> Self {
        self.token_usage = Some(token_usage);
        self
    }
}

impl From<Value> for StepOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Executes a single plan step
///
/// A failed run returns `Err`; the executor records the failure in the
/// state rather than propagating it.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run one step against the current state
    ///
    /// `state` is read-only here; outputs flow back through the
    /// returned [`StepOutput`] and the executor does the bookkeeping.
    async fn run(&self, step: &PlanStep, state: &AgentState) -> Result<StepOutput>;
}

/// Runner used when no runner has been configured
///
/// Fails every step with [`Error::NoRunnerConfigured`], which the
/// executor captures into the run result like any other step failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRunner;

#[async_trait]
impl StepRunner for NullRunner {
    async fn run(&self, _step: &PlanStep, _state: &AgentState) -> Result<StepOutput> {
        Err(Error::NoRunnerConfigured)
    }
}

/// Handles one named action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action with the step's parameters
    async fn handle(
        &self,
        parameters: &HashMap<String, Value>,
        state: &AgentState,
    ) -> Result<StepOutput>;
}

/// Dispatches steps to handlers by action name
///
/// Built once before execution starts and then only read, so plain
/// HashMap lookup with no locking.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an action name
    ///
    /// Re-registering a name replaces the previous handler.
    pub fn register(mut self, action: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        let action = action.into();
        assert!(!action.is_empty(), "action name cannot be empty");
        debug!(action = %action, "registered action handler");
        self.handlers.insert(action, handler);
        self
    }

    /// Register a closure as a handler
    pub fn register_fn<F>(self, action: impl Into<String>, f: F) -> Self
    where
        F: Fn(&HashMap<String, Value>, &AgentState) -> Result<StepOutput>
            + Send
            + Sync
            + 'static,
    {
        self.register(action, Arc::new(FnHandler { f }))
    }

    /// Names of all registered actions
    pub fn actions(&self) -> Vec<&str> {
        self.handlers.keys().map(|k| k.as_str()).collect()
    }

    /// Whether an action is registered
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }
}

#[async_trait]
impl StepRunner for ActionRegistry {
    async fn run(&self, step: &PlanStep, state: &AgentState) -> Result<StepOutput> {
        let handler = self
            .handlers
            .get(&step.action)
            .ok_or_else(|| Error::unknown_action(&step.action))?;

        handler.handle(&step.parameters, state).await
    }
}

/// Adapts a synchronous closure to [`ActionHandler`]
struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&HashMap<String, Value>, &AgentState) -> Result<StepOutput> + Send + Sync,
{
    async fn handle(
        &self,
        parameters: &HashMap<String, Value>,
        state: &AgentState,
    ) -> Result<StepOutput> {
        (self.f)(parameters, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> AgentState {
        AgentState::new("q", vec![])
    }

    #[tokio::test]
    async fn test_null_runner_fails() {
        let step = PlanStep::new("s1", "d", "anything");
        let err = NullRunner.run(&step, &state()).await.unwrap_err();
        assert!(matches!(err, Error::NoRunnerConfigured));
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let registry = ActionRegistry::new().register_fn("echo", |params, _state| {
            Ok(StepOutput::new(params["message"].clone()))
        });

        let step = PlanStep::new("s1", "echo back", "echo").with_param("message", "hello");
        let output = registry.run(&step, &state()).await.unwrap();
        assert_eq!(output.value, json!("hello"));
    }

    #[tokio::test]
    async fn test_registry_unknown_action() {
        let registry = ActionRegistry::new();
        let step = PlanStep::new("s1", "d", "missing");

        let err = registry.run(&step, &state()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownAction { .. }));
    }

    #[tokio::test]
    async fn test_registry_replaces_handler() {
        let registry = ActionRegistry::new()
            .register_fn("act", |_, _| Ok(StepOutput::new(json!(1))))
            .register_fn("act", |_, _| Ok(StepOutput::new(json!(2))));

        let step = PlanStep::new("s1", "d", "act");
        let output = registry.run(&step, &state()).await.unwrap();
        assert_eq!(output.value, json!(2));
    }

    #[tokio::test]
    async fn test_step_output_token_usage() {
        let registry = ActionRegistry::new().register_fn("count", |_, _| {
            Ok(StepOutput::new(json!("done")).with_token_usage(128))
        });

        let step = PlanStep::new("s1", "d", "count");
        let output = registry.run(&step, &state()).await.unwrap();
        assert_eq!(output.token_usage, Some(128));
    }
}
