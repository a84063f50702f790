//! End-to-end campaign lifecycle against the public crate API, with a
//! SQLite store on disk and a stubbed inference executor.

use anyhow::{anyhow, Result};
use modelsweep::config::{ModelCatalog, SweepConfig};
use modelsweep::dispatch::{DispatchState, Dispatcher};
use modelsweep::engine::CaseExecutor;
use modelsweep::orchestrator::Orchestrator;
use modelsweep::storage::{ExecutionStatus, SqliteStore};
use modelsweep::sweep::TestCase;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct StubExecutor;

#[async_trait::async_trait]
impl CaseExecutor for StubExecutor {
    async fn run(&self, case: &TestCase, _timeout: Duration) -> Result<String> {
        if case.question.contains("broken") {
            Err(anyhow!("stubbed inference failure"))
        } else {
            Ok(format!("stub answer for {}", case.question))
        }
    }
}

struct NullDispatcher;

#[async_trait::async_trait]
impl Dispatcher for NullDispatcher {
    async fn enqueue(&self, _id: Uuid, _config: &SweepConfig, _workers: u32) -> Result<String> {
        Err(anyhow!("dispatch not available in this test"))
    }

    async fn status(&self, _handle: &str) -> Result<DispatchState> {
        Ok(DispatchState::Unknown)
    }

    async fn cancel(&self, _handle: &str) -> Result<bool> {
        Ok(false)
    }
}

fn config(questions: &[&str]) -> SweepConfig {
    SweepConfig {
        name: "lifecycle".to_string(),
        description: "integration sweep".to_string(),
        models: vec!["gemini-2.5-flash".to_string()],
        user_types: vec!["business".to_string(), "technical".to_string()],
        think_mode_options: vec![false, true],
        questions: questions.iter().map(|q| q.to_string()).collect(),
        iterations: 1,
        delay_between_cases_secs: 0.0,
        case_timeout_secs: 5,
        questions_per_combination: None,
        shuffle: false,
        seed: None,
    }
}

#[tokio::test]
async fn test_campaign_survives_restart_of_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lifecycle.db");
    let db_path = db_path.to_str().unwrap();

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(SqliteStore::open(db_path).unwrap()),
        Arc::new(StubExecutor),
        Arc::new(NullDispatcher),
        ModelCatalog::default(),
    ));

    // 2 user types x 2 think modes x 2 questions = 8 cases, one of which
    // fails in every combination it appears in.
    let receipt = orchestrator
        .start(config(&["q-ok", "q-broken"]))
        .await
        .unwrap();
    assert_eq!(receipt.total_cases, 8);

    let mut done = None;
    for _ in 0..300 {
        let execution = orchestrator.status(receipt.execution_id).await.unwrap();
        if execution.status.is_terminal() {
            done = Some(execution);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let done = done.expect("campaign never finished");
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.completed_cases, 4);
    assert_eq!(done.failed_cases, 4);

    // A fresh process over the same database sees the finished campaign.
    let reopened = Arc::new(Orchestrator::new(
        Arc::new(SqliteStore::open(db_path).unwrap()),
        Arc::new(StubExecutor),
        Arc::new(NullDispatcher),
        ModelCatalog::default(),
    ));

    let reloaded = reopened.status(receipt.execution_id).await.unwrap();
    assert_eq!(reloaded.status, ExecutionStatus::Completed);
    assert_eq!(reloaded.completed_cases, 4);

    let results = reopened.results(receipt.execution_id).await.unwrap();
    assert_eq!(results.len(), 8);

    let analysis = reopened.analyze(receipt.execution_id).await.unwrap();
    assert_eq!(analysis.total_cases, 8);
    assert!((analysis.success_rate - 0.5).abs() < f64::EPSILON);

    // Cleanup path: delete the finished campaign.
    assert!(reopened.delete(receipt.execution_id).await.unwrap());
    assert!(reopened.status(receipt.execution_id).await.is_err());
}
