//! Task-queue dispatcher. Enqueues one task that calls back into our
//! worker endpoints; the queue retries on transient failure, which is why
//! batch-summary recording has to stay idempotent.

use super::{DispatchState, Dispatcher};
use crate::config::SweepConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

pub struct TaskQueueDispatcher {
    client: Client,
    base_url: String,
    queue_name: String,
    /// Public URL of our own worker API, baked into each task.
    worker_url: String,
}

impl TaskQueueDispatcher {
    pub fn new(
        base_url: impl Into<String>,
        queue_name: impl Into<String>,
        worker_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            queue_name: queue_name.into(),
            worker_url: worker_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for TaskQueueDispatcher {
    async fn enqueue(
        &self,
        execution_id: Uuid,
        config: &SweepConfig,
        worker_count: u32,
    ) -> Result<String> {
        let task_name = format!("sweep-{}", execution_id);
        let payload = json!({
            "task": {
                "name": task_name,
                "target_url": format!("{}/api/v1/worker/run", self.worker_url),
                "body": {
                    "execution_id": execution_id,
                    "config": config,
                    "worker_count": worker_count,
                },
            }
        });

        let reply = self
            .client
            .post(format!(
                "{}/queues/{}/tasks",
                self.base_url, self.queue_name
            ))
            .json(&payload)
            .send()
            .await
            .context("task enqueue request failed")?
            .error_for_status()
            .context("task queue rejected the task")?;

        let body: serde_json::Value = reply
            .json()
            .await
            .context("failed to decode task enqueue response")?;

        Ok(body
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(&task_name)
            .to_string())
    }

    async fn status(&self, handle: &str) -> Result<DispatchState> {
        let reply = self
            .client
            .get(format!(
                "{}/queues/{}/tasks/{}",
                self.base_url, self.queue_name, handle
            ))
            .send()
            .await
            .context("task status request failed")?;

        // A consumed task disappears from the queue; treat that as running,
        // the durable execution record is the source of truth from there.
        if reply.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(DispatchState::Running);
        }
        reply
            .error_for_status()
            .context("task queue rejected the status query")?;
        Ok(DispatchState::Queued)
    }

    async fn cancel(&self, handle: &str) -> Result<bool> {
        let reply = self
            .client
            .delete(format!(
                "{}/queues/{}/tasks/{}",
                self.base_url, self.queue_name, handle
            ))
            .send()
            .await
            .context("task cancel request failed")?;

        // Already consumed: nothing left to cancel on the queue side.
        if reply.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        reply
            .error_for_status()
            .context("task queue rejected the cancellation")?;
        Ok(true)
    }
}
