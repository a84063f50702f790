//! Persistence layer -- the `PersistenceStore` trait and the durable
//! `Execution` record, plus two interchangeable implementations.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use crate::engine::{BatchSummary, CaseResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of one campaign run. Transitions are monotonic toward a
/// terminal state; `Completed`, `Failed`, and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Stopped
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ExecutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "queued" => Ok(ExecutionStatus::Queued),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "stopped" => Ok(ExecutionStatus::Stopped),
            other => anyhow::bail!("unknown execution status: {}", other),
        }
    }
}

/// The durable record tracking one campaign's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub config_name: String,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_cases: u32,
    pub completed_cases: u32,
    pub failed_cases: u32,
    /// Pointer to the stored case results, set at finalize time.
    pub results_ref: Option<String>,
    pub error_message: Option<String>,
    /// Handle returned by the dispatcher for distributed executions.
    pub dispatch_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(config_name: &str, total_cases: u32) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            config_name: config_name.to_string(),
            status: ExecutionStatus::Pending,
            start_time: None,
            end_time: None,
            total_cases,
            completed_cases: 0,
            failed_cases: 0,
            results_ref: None,
            error_message: None,
            dispatch_handle: None,
            created_at: Utc::now(),
        }
    }
}

/// Abstract durable store for executions, per-batch summaries, and case
/// results. One implementation is selected at process start; the
/// orchestrator only sees this trait.
#[async_trait::async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Insert or replace the full execution record.
    async fn save_execution(&self, execution: &Execution) -> Result<()>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>>;

    /// Most recent first.
    async fn list_executions(&self, limit: usize) -> Result<Vec<Execution>>;

    /// Transition status. Sets `start_time` when entering `Running` and
    /// `end_time` when entering a terminal state. `error` overwrites the
    /// error detail when present.
    async fn update_status(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Atomically overwrite the case counters. Touches nothing else, so a
    /// concurrent status transition can never be undone by a counts refresh.
    async fn update_counts(&self, id: Uuid, completed: u32, failed: u32) -> Result<()>;

    /// Record the dispatcher's handle. Touches nothing else.
    async fn set_dispatch_handle(&self, id: Uuid, handle: &str) -> Result<()>;

    /// Remove the execution and all of its artifacts (summaries, results).
    /// Returns false if the execution does not exist.
    async fn delete_execution(&self, id: Uuid) -> Result<bool>;

    /// Record one batch summary keyed by (execution_id, batch_id).
    /// Idempotent: returns false (and stores nothing) when the batch id was
    /// already recorded for this execution.
    async fn record_batch_summary(&self, id: Uuid, summary: &BatchSummary) -> Result<bool>;

    async fn batch_summaries(&self, id: Uuid) -> Result<Vec<BatchSummary>>;

    async fn append_case_results(&self, id: Uuid, results: &[CaseResult]) -> Result<()>;

    async fn case_results(&self, id: Uuid) -> Result<Vec<CaseResult>>;

    /// Delete executions (and artifacts) older than `days`. Returns how many
    /// executions were removed.
    async fn cleanup_older_than(&self, days: i64) -> Result<usize>;
}
