//! Workflow-engine dispatcher. The engine receives the whole campaign in
//! one call and drives prepare / execute-batch / finalize against our
//! worker endpoints on its own schedule.

use super::{DispatchState, Dispatcher};
use crate::config::SweepConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

pub struct WorkflowDispatcher {
    client: Client,
    base_url: String,
    workflow_name: String,
}

impl WorkflowDispatcher {
    pub fn new(base_url: impl Into<String>, workflow_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            workflow_name: workflow_name.into(),
        }
    }

    fn map_state(state: &str) -> DispatchState {
        match state.to_ascii_uppercase().as_str() {
            "QUEUED" | "PENDING" => DispatchState::Queued,
            "ACTIVE" | "RUNNING" => DispatchState::Running,
            "SUCCEEDED" => DispatchState::Succeeded,
            "FAILED" => DispatchState::Failed,
            "CANCELLED" => DispatchState::Cancelled,
            _ => DispatchState::Unknown,
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for WorkflowDispatcher {
    async fn enqueue(
        &self,
        execution_id: Uuid,
        config: &SweepConfig,
        worker_count: u32,
    ) -> Result<String> {
        let payload = json!({
            "argument": {
                "execution_id": execution_id,
                "config": config,
                "worker_count": worker_count,
            }
        });

        let reply = self
            .client
            .post(format!(
                "{}/workflows/{}/executions",
                self.base_url, self.workflow_name
            ))
            .json(&payload)
            .send()
            .await
            .context("workflow enqueue request failed")?
            .error_for_status()
            .context("workflow engine rejected the execution")?;

        let body: serde_json::Value = reply
            .json()
            .await
            .context("failed to decode workflow enqueue response")?;

        body.get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .context("workflow enqueue response missing execution name")
    }

    async fn status(&self, handle: &str) -> Result<DispatchState> {
        let reply = self
            .client
            .get(format!("{}/executions/{}", self.base_url, handle))
            .send()
            .await
            .context("workflow status request failed")?
            .error_for_status()
            .context("workflow engine rejected the status query")?;

        let body: serde_json::Value = reply
            .json()
            .await
            .context("failed to decode workflow status response")?;

        Ok(body
            .get("state")
            .and_then(|v| v.as_str())
            .map(Self::map_state)
            .unwrap_or(DispatchState::Unknown))
    }

    async fn cancel(&self, handle: &str) -> Result<bool> {
        let reply = self
            .client
            .post(format!("{}/executions/{}/cancel", self.base_url, handle))
            .send()
            .await
            .context("workflow cancel request failed")?;

        // 409 means the workflow already reached a terminal state.
        if reply.status() == reqwest::StatusCode::CONFLICT {
            return Ok(false);
        }
        reply
            .error_for_status()
            .context("workflow engine rejected the cancellation")?;
        Ok(true)
    }
}
