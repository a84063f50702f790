//! Dispatch layer -- hands distributed executions to an external runner.
//!
//! Two backends: a workflow engine that drives the whole fan-out itself,
//! and a task queue that receives one task per worker. Both speak plain
//! HTTP; the orchestrator only sees the `Dispatcher` trait and the opaque
//! handle it returns.

pub mod tasks;
pub mod workflow;

pub use self::tasks::TaskQueueDispatcher;
pub use self::workflow::WorkflowDispatcher;

use crate::config::SweepConfig;
use crate::settings::DispatcherSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Remote state of a dispatched execution, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// The backend answered but we could not map its state.
    Unknown,
}

/// Hands an execution to an external runner and tracks it by handle.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Submit the execution for remote fan-out. Returns an opaque handle
    /// usable with `status` and `cancel`.
    async fn enqueue(
        &self,
        execution_id: Uuid,
        config: &SweepConfig,
        worker_count: u32,
    ) -> Result<String>;

    async fn status(&self, handle: &str) -> Result<DispatchState>;

    /// Best-effort remote cancellation. Returns false when the backend
    /// reports the work already finished.
    async fn cancel(&self, handle: &str) -> Result<bool>;
}

/// Build the dispatcher selected in settings.
pub fn from_settings(settings: &DispatcherSettings) -> Result<Arc<dyn Dispatcher>> {
    match settings.kind.as_str() {
        "workflow" => Ok(Arc::new(WorkflowDispatcher::new(
            &settings.base_url,
            &settings.name,
        ))),
        "tasks" => Ok(Arc::new(TaskQueueDispatcher::new(
            &settings.base_url,
            &settings.name,
            &settings.worker_url,
        ))),
        other => anyhow::bail!("unknown dispatcher kind: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_backend() {
        let mut settings = DispatcherSettings::default();
        settings.kind = "workflow".to_string();
        assert!(from_settings(&settings).is_ok());

        settings.kind = "tasks".to_string();
        assert!(from_settings(&settings).is_ok());

        settings.kind = "carrier-pigeon".to_string();
        assert!(from_settings(&settings).is_err());
    }
}
