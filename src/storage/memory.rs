//! In-memory persistence store. Document-store shaped: everything keyed by
//! execution id, no relational schema. Used for ephemeral deployments and
//! as the test double throughout the crate.

use super::{Execution, ExecutionStatus, PersistenceStore};
use crate::engine::{BatchSummary, CaseResult};
use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    executions: HashMap<Uuid, Execution>,
    // BTreeMap so summaries come back in stable batch-id order.
    summaries: HashMap<Uuid, BTreeMap<String, BatchSummary>>,
    results: HashMap<Uuid, Vec<CaseResult>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceStore for MemoryStore {
    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .executions
            .insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.executions.get(&id).cloned())
    }

    async fn list_executions(&self, limit: usize) -> Result<Vec<Execution>> {
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<Execution> = inner.executions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let execution = inner
            .executions
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("execution {} not found", id))?;

        execution.status = status;
        if status == ExecutionStatus::Running && execution.start_time.is_none() {
            execution.start_time = Some(Utc::now());
        }
        if status.is_terminal() {
            execution.end_time = Some(Utc::now());
        }
        if let Some(e) = error {
            execution.error_message = Some(e.to_string());
        }
        Ok(())
    }

    async fn update_counts(&self, id: Uuid, completed: u32, failed: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let execution = inner
            .executions
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("execution {} not found", id))?;
        execution.completed_cases = completed;
        execution.failed_cases = failed;
        Ok(())
    }

    async fn set_dispatch_handle(&self, id: Uuid, handle: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let execution = inner
            .executions
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("execution {} not found", id))?;
        execution.dispatch_handle = Some(handle.to_string());
        Ok(())
    }

    async fn delete_execution(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.summaries.remove(&id);
        inner.results.remove(&id);
        Ok(inner.executions.remove(&id).is_some())
    }

    async fn record_batch_summary(&self, id: Uuid, summary: &BatchSummary) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let batches = inner.summaries.entry(id).or_default();
        if batches.contains_key(&summary.batch_id) {
            return Ok(false);
        }
        batches.insert(summary.batch_id.clone(), summary.clone());
        Ok(true)
    }

    async fn batch_summaries(&self, id: Uuid) -> Result<Vec<BatchSummary>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .summaries
            .get(&id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn append_case_results(&self, id: Uuid, results: &[CaseResult]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .results
            .entry(id)
            .or_default()
            .extend(results.iter().cloned());
        Ok(())
    }

    async fn case_results(&self, id: Uuid) -> Result<Vec<CaseResult>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.results.get(&id).cloned().unwrap_or_default())
    }

    async fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut inner = self.inner.lock().unwrap();

        let stale: Vec<Uuid> = inner
            .executions
            .values()
            .filter(|e| e.created_at < cutoff)
            .map(|e| e.execution_id)
            .collect();

        for id in &stale {
            inner.executions.remove(id);
            inner.summaries.remove(id);
            inner.results.remove(id);
        }
        Ok(stale.len())
    }
}
