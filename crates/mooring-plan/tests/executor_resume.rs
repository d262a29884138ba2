//! End-to-end crash/resume scenario
//!
//! Runs a multi-step plan that fails midway, then resumes the session
//! against the same storage and verifies earlier results and the
//! cursor survive the round trip.

use mooring_core::{ProjectId, SessionId};
use mooring_plan::{
    ActionRegistry, CheckpointConfig, CheckpointStore, ExecutionOptions, PlanExecutor, PlanStep,
    SaveOptions, StepOutput, StepStatus,
};
use mooring_storage::MemoryKV;
use serde_json::json;
use std::sync::Arc;

fn registry() -> ActionRegistry {
    ActionRegistry::new()
        .register_fn("read_file", |params, _| {
            Ok(StepOutput::new(json!({
                "path": params["path"],
                "content": "fn main() {}",
            }))
            .with_token_usage(12))
        })
        .register_fn("apply_patch", |_, state| {
            if state.context.contains_key("patch_fixed") {
                Ok(StepOutput::new(json!({"applied": true})))
            } else {
                Err(mooring_core::Error::step_failed(
                    "apply",
                    "patch does not apply cleanly",
                ))
            }
        })
        .register_fn("run_tests", |_, _| {
            Ok(StepOutput::new(json!({"passed": 42, "failed": 0})))
        })
}

fn plan() -> Vec<PlanStep> {
    vec![
        PlanStep::new("read", "read the target file", "read_file")
            .with_param("path", "src/main.rs"),
        PlanStep::new("apply", "apply the patch", "apply_patch").depends_on("read"),
        PlanStep::new("verify", "run the test suite", "run_tests").depends_on("apply"),
    ]
}

fn executor(kv: Arc<MemoryKV>) -> PlanExecutor<MemoryKV> {
    let store = CheckpointStore::new(
        kv,
        ProjectId::new("webapp").unwrap(),
        CheckpointConfig::new(),
    );
    PlanExecutor::new(store).with_runner(Arc::new(registry()))
}

#[tokio::test]
async fn test_fail_midway_then_resume() {
    let kv = Arc::new(MemoryKV::new());
    let session = SessionId::new("fix-build-123").unwrap();

    // First run: read succeeds, apply fails, verify never starts
    let first = executor(kv.clone())
        .execute(
            &session,
            "fix the build",
            plan(),
            ExecutionOptions::fresh(),
        )
        .await
        .unwrap();

    assert!(!first.success);
    assert_eq!(first.steps_executed, 1);
    assert!(first
        .error
        .as_ref()
        .unwrap()
        .contains("patch does not apply cleanly"));
    assert_eq!(first.state.plan[1].status, StepStatus::Failed);

    // A fresh executor over the same storage sees the error checkpoint
    let resumer = executor(kv.clone());
    let latest = resumer
        .checkpoints()
        .load_latest(&session)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.state.results.len(), 1);
    assert_eq!(latest.state.results[0].step_id, "read");
    assert_eq!(latest.state.results[0].token_usage, Some(12));
    assert!(latest.state.last_error.is_some());

    // Caller fixes the failed step before resuming
    let mut patched = latest.state.clone();
    patched.plan[1].status = StepStatus::Pending;
    patched.context.insert("patch_fixed".into(), json!(true));
    resumer
        .checkpoints()
        .save(&session, &patched, SaveOptions::manual("patch regenerated"))
        .await
        .unwrap();

    // Second run picks up at the failed step; read is not re-executed
    let second = resumer.resume(&session).await.unwrap();

    assert!(second.success);
    assert!(second.resumed_from_checkpoint);
    assert_eq!(second.steps_executed, 2);
    assert_eq!(second.state.results.len(), 3);
    assert_eq!(second.state.results[0].step_id, "read");
    assert_eq!(second.state.results[2].step_id, "verify");
    assert!(second
        .state
        .plan
        .iter()
        .all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn test_resume_from_specific_checkpoint() {
    let kv = Arc::new(MemoryKV::new());
    let session = SessionId::new("fix-build-456").unwrap();

    let runner = executor(kv.clone());
    let plan = vec![
        PlanStep::new("read", "read the target file", "read_file").with_param("path", "lib.rs"),
        PlanStep::new("verify", "run the test suite", "run_tests"),
    ];
    runner
        .execute(&session, "verify the fix", plan, ExecutionOptions::fresh())
        .await
        .unwrap();

    // Resume from the checkpoint written after the first step
    let summaries = runner.checkpoints().list(&session).await.unwrap();
    let after_read = summaries
        .iter()
        .find(|s| s.description.as_deref() == Some("After step 'read'"))
        .unwrap();

    let replay = runner
        .resume_from(&session, after_read.id.clone())
        .await
        .unwrap();

    assert!(replay.success);
    assert!(replay.resumed_from_checkpoint);
    // Only the second step re-runs
    assert_eq!(replay.steps_executed, 1);
    assert_eq!(replay.state.results.len(), 2);
}
