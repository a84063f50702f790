//! Batch execution engine -- runs one batch of cases sequentially against
//! the remote inference collaborator.

pub mod executor;

pub use self::executor::{CaseExecutor, HttpCaseExecutor};

use crate::sweep::{Batch, TestCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, observed at case boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one executed case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub case: TestCase,
    pub response: String,
    pub elapsed_secs: f64,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CaseResult {
    fn failed(case: &TestCase, elapsed_secs: f64, error: impl Into<String>) -> Self {
        Self {
            case: case.clone(),
            response: String::new(),
            elapsed_secs,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate counts for one executed batch. `completed + failed == total`
/// always holds, even for cancelled or aborted batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub worker_index: u32,
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
    pub duration_secs: f64,
}

impl BatchSummary {
    /// Summary for a batch that never ran: every case counts as failed.
    pub fn all_failed(batch: &Batch) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            worker_index: batch.worker_index,
            completed: 0,
            failed: batch.cases.len() as u32,
            total: batch.cases.len() as u32,
            duration_secs: 0.0,
        }
    }
}

/// Runs batches strictly in case order. No retries: a failed case is
/// recorded and execution moves on.
pub struct ExecutionEngine {
    executor: Arc<dyn CaseExecutor>,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<dyn CaseExecutor>) -> Self {
        Self { executor }
    }

    /// Execute one batch. Sleeps `delay` between cases (skipped when zero).
    /// Cancellation is observed between cases; cases not reached are marked
    /// failed so the summary still covers the whole batch.
    pub async fn run_batch(
        &self,
        batch: &Batch,
        delay: Duration,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> (Vec<CaseResult>, BatchSummary) {
        let started = Instant::now();
        let total = batch.cases.len();
        let mut results = Vec::with_capacity(total);

        info!(batch = %batch.batch_id, worker = batch.worker_index, cases = total, "executing batch");

        for (i, case) in batch.cases.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(batch = %batch.batch_id, remaining = total - i, "batch cancelled, marking remaining cases failed");
                for skipped in &batch.cases[i..] {
                    results.push(CaseResult::failed(skipped, 0.0, "cancelled before execution"));
                }
                break;
            }

            results.push(self.run_case(case, timeout).await);

            if !delay.is_zero() && i + 1 < total {
                tokio::time::sleep(delay).await;
            }
        }

        let completed = results.iter().filter(|r| r.success).count() as u32;
        let failed = results.len() as u32 - completed;

        let summary = BatchSummary {
            batch_id: batch.batch_id.clone(),
            worker_index: batch.worker_index,
            completed,
            failed,
            total: total as u32,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            batch = %batch.batch_id,
            completed,
            failed,
            duration_secs = summary.duration_secs,
            "batch finished"
        );

        (results, summary)
    }

    async fn run_case(&self, case: &TestCase, timeout: Duration) -> CaseResult {
        let start = Instant::now();
        match self.executor.run(case, timeout).await {
            Ok(response) => {
                let elapsed = start.elapsed().as_secs_f64();
                debug!(model = %case.model, elapsed_secs = elapsed, "case succeeded");
                CaseResult {
                    case: case.clone(),
                    response,
                    elapsed_secs: elapsed,
                    success: true,
                    error: None,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!(model = %case.model, error = %e, "case failed");
                CaseResult::failed(case, elapsed, format!("{:#}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Scripted executor: fails every case whose question contains "fail".
    struct ScriptedExecutor {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CaseExecutor for ScriptedExecutor {
        async fn run(&self, case: &TestCase, _timeout: Duration) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(case.question.clone());
            if case.question.contains("fail") {
                Err(anyhow!("remote call rejected"))
            } else {
                Ok(format!("answer to {}", case.question))
            }
        }
    }

    fn batch(questions: &[&str]) -> Batch {
        Batch {
            batch_id: "batch_0".to_string(),
            worker_index: 0,
            cases: questions
                .iter()
                .map(|q| TestCase {
                    model: "model-a".to_string(),
                    user_type: "business".to_string(),
                    think_mode: false,
                    question: q.to_string(),
                    iteration: 0,
                })
                .collect(),
            estimated_minutes: 5,
        }
    }

    #[tokio::test]
    async fn test_batch_runs_in_order_and_counts_failures() {
        let executor = ScriptedExecutor::new();
        let engine = ExecutionEngine::new(executor.clone());
        let b = batch(&["q1", "q2-fail", "q3"]);

        let (results, summary) = engine
            .run_batch(&b, Duration::ZERO, Duration::from_secs(5), &CancelToken::default())
            .await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed + summary.failed, summary.total);

        // Strict case order, both in invocation and in recorded results.
        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["q1", "q2-fail", "q3"]);
        assert_eq!(results[1].case.question, "q2-fail");
        assert!(!results[1].success);
        assert!(results[1].error.is_some());
        assert!(results[0].success);
        assert!(results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_failed_case_does_not_abort_batch() {
        let executor = ScriptedExecutor::new();
        let engine = ExecutionEngine::new(executor);
        let b = batch(&["fail-1", "fail-2", "fail-3"]);

        let (results, summary) = engine
            .run_batch(&b, Duration::ZERO, Duration::from_secs(5), &CancelToken::default())
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 3);
        assert!(results.iter().all(|r| r.error.is_some()));
    }

    #[tokio::test]
    async fn test_cancellation_marks_remaining_failed() {
        let executor = ScriptedExecutor::new();
        let engine = ExecutionEngine::new(executor.clone());
        let b = batch(&["q1", "q2", "q3"]);

        let cancel = CancelToken::default();
        cancel.cancel();

        let (results, summary) = engine
            .run_batch(&b, Duration::ZERO, Duration::from_secs(5), &cancel)
            .await;

        // Cancelled before the first case: nothing invoked, all failed.
        assert!(executor.calls.lock().unwrap().is_empty());
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.total, 3);
        assert!(results
            .iter()
            .all(|r| r.error.as_deref() == Some("cancelled before execution")));
    }

    #[tokio::test]
    async fn test_all_failed_summary_covers_whole_batch() {
        let b = batch(&["q1", "q2"]);
        let summary = BatchSummary::all_failed(&b);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total, 2);
    }
}
