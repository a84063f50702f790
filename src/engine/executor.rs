//! Remote inference collaborator -- one trait, one HTTP implementation.

use crate::sweep::TestCase;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Executes a single test case against the remote inference service.
#[async_trait::async_trait]
pub trait CaseExecutor: Send + Sync {
    /// Run one case and return the response payload. Errors (timeouts,
    /// transport failures, non-2xx statuses) are recorded by the engine as
    /// failed cases; they never abort a batch.
    async fn run(&self, case: &TestCase, timeout: Duration) -> Result<String>;
}

/// Posts cases to the inference service's chat endpoint.
pub struct HttpCaseExecutor {
    client: Client,
    base_url: String,
}

impl HttpCaseExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl CaseExecutor for HttpCaseExecutor {
    async fn run(&self, case: &TestCase, timeout: Duration) -> Result<String> {
        let payload = json!({
            "message": case.question,
            "response_style": case.user_type,
            "session_id": format!("sweep_{}", uuid::Uuid::new_v4()),
            "model": case.model,
            "think_mode": case.think_mode,
        });

        let reply = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .context("inference request failed")?
            .error_for_status()
            .context("inference service returned an error status")?;

        let body: serde_json::Value = reply
            .json()
            .await
            .context("failed to decode inference response")?;

        Ok(body
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
