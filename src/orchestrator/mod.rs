//! Campaign orchestrator -- owns the execution lifecycle from config
//! validation through planning, dispatch, aggregation, and finalization.
//!
//! Local sweeps run on an in-process worker pool bounded by a semaphore.
//! Distributed sweeps are handed to the dispatcher, which calls back into
//! the worker operations (`prepare_batches`, `execute_batch`, `finalize`).

use crate::analysis::{self, Analysis};
use crate::config::{ModelCatalog, SweepConfig};
use crate::dispatch::Dispatcher;
use crate::engine::{BatchSummary, CancelToken, CaseExecutor, CaseResult, ExecutionEngine};
use crate::error::{Error, Result};
use crate::storage::{Execution, ExecutionStatus, PersistenceStore};
use crate::sweep::{self, Batch, ExecutionMode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Concurrent local sweeps. Matches the worker pool of the inference
/// service we drive; more would just queue on its side.
pub const LOCAL_POOL_SIZE: usize = 3;

/// What `start` decided and recorded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartReceipt {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub total_cases: u32,
    pub estimated_minutes: u64,
    /// Number of distributed workers, absent for local runs.
    pub workers: Option<u32>,
}

struct LocalRun {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

pub struct Orchestrator {
    store: Arc<dyn PersistenceStore>,
    engine: Arc<ExecutionEngine>,
    dispatcher: Arc<dyn Dispatcher>,
    catalog: ModelCatalog,
    pool: Arc<Semaphore>,
    registry: Mutex<HashMap<Uuid, LocalRun>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        executor: Arc<dyn CaseExecutor>,
        dispatcher: Arc<dyn Dispatcher>,
        catalog: ModelCatalog,
    ) -> Self {
        Self {
            store,
            engine: Arc::new(ExecutionEngine::new(executor)),
            dispatcher,
            catalog,
            pool: Arc::new(Semaphore::new(LOCAL_POOL_SIZE)),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, plan, persist, and launch a campaign.
    ///
    /// Local sweeps are spawned onto the in-process pool and the receipt
    /// comes back with status `pending` (the run flips itself to `running`
    /// once a pool slot frees up). Distributed sweeps are enqueued with the
    /// dispatcher before the receipt is returned; a rejected enqueue marks
    /// the execution `failed` and surfaces as a dispatch error.
    pub async fn start(self: &Arc<Self>, config: SweepConfig) -> Result<StartReceipt> {
        let cases = sweep::expand(&config, &self.catalog)?;
        if cases.is_empty() {
            return Err(Error::InvalidConfiguration(
                "expansion produced no test cases".to_string(),
            ));
        }

        let estimated_minutes =
            sweep::estimate_minutes(cases.len(), config.delay_between_cases_secs);
        let mode = sweep::plan(estimated_minutes, config.models.len());

        let execution = Execution::new(&config.name, cases.len() as u32);
        let id = execution.execution_id;
        self.store
            .save_execution(&execution)
            .await
            .map_err(Error::persistence)?;

        info!(
            execution = %id,
            config = %config.name,
            cases = cases.len(),
            estimated_minutes,
            ?mode,
            "campaign planned"
        );

        match mode {
            ExecutionMode::Local => {
                let cancel = CancelToken::default();
                let task = {
                    let orchestrator = self.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        orchestrator
                            .run_local(id, config, cases, estimated_minutes, cancel)
                            .await;
                    })
                };
                self.registry
                    .lock()
                    .unwrap()
                    .insert(id, LocalRun { cancel, handle: task });

                Ok(StartReceipt {
                    execution_id: id,
                    status: ExecutionStatus::Pending,
                    total_cases: execution.total_cases,
                    estimated_minutes,
                    workers: None,
                })
            }
            ExecutionMode::Distributed { workers } => {
                match self.dispatcher.enqueue(id, &config, workers).await {
                    Ok(handle) => {
                        self.store
                            .set_dispatch_handle(id, &handle)
                            .await
                            .map_err(Error::persistence)?;
                        self.store
                            .update_status(id, ExecutionStatus::Queued, None)
                            .await
                            .map_err(Error::persistence)?;

                        Ok(StartReceipt {
                            execution_id: id,
                            status: ExecutionStatus::Queued,
                            total_cases: execution.total_cases,
                            estimated_minutes,
                            workers: Some(workers),
                        })
                    }
                    Err(e) => {
                        let detail = format!("{:#}", e);
                        if let Err(se) = self
                            .store
                            .update_status(id, ExecutionStatus::Failed, Some(&detail))
                            .await
                        {
                            error!(execution = %id, error = %se, "failed to record dispatch failure");
                        }
                        Err(Error::Dispatch(detail))
                    }
                }
            }
        }
    }

    /// Body of a local run. Owns the registry entry for its lifetime.
    async fn run_local(
        self: Arc<Self>,
        id: Uuid,
        config: SweepConfig,
        cases: Vec<sweep::TestCase>,
        estimated_minutes: u64,
        cancel: CancelToken,
    ) {
        if let Err(e) = self
            .run_local_inner(id, &config, cases, estimated_minutes, &cancel)
            .await
        {
            error!(execution = %id, error = %e, "local run failed");
            if let Err(se) = self
                .store
                .update_status(id, ExecutionStatus::Failed, Some(&e.to_string()))
                .await
            {
                error!(execution = %id, error = %se, "failed to mark execution failed");
            }
        }
        self.registry.lock().unwrap().remove(&id);
    }

    async fn run_local_inner(
        &self,
        id: Uuid,
        config: &SweepConfig,
        cases: Vec<sweep::TestCase>,
        estimated_minutes: u64,
        cancel: &CancelToken,
    ) -> Result<()> {
        let _permit = self
            .pool
            .clone()
            .acquire_owned()
            .await
            .map_err(Error::persistence)?;

        self.store
            .update_status(id, ExecutionStatus::Running, None)
            .await
            .map_err(Error::persistence)?;

        let batch = Batch {
            batch_id: "batch_0".to_string(),
            worker_index: 0,
            cases,
            estimated_minutes,
        };

        let (results, summary) = self
            .engine
            .run_batch(
                &batch,
                Duration::from_secs_f64(config.delay_between_cases_secs.max(0.0)),
                Duration::from_secs(config.case_timeout_secs),
                cancel,
            )
            .await;

        self.store
            .append_case_results(id, &results)
            .await
            .map_err(Error::persistence)?;
        self.aggregate(id, &summary).await?;

        let outcome = if cancel.is_cancelled() {
            ExecutionStatus::Stopped
        } else {
            ExecutionStatus::Completed
        };
        self.finalize(id, outcome, None).await?;
        Ok(())
    }

    /// Record a batch summary and refresh the execution's counts.
    ///
    /// Idempotent under redelivery: a batch id already recorded for this
    /// execution changes nothing, and the counts are always recomputed from
    /// the durable summaries rather than incremented in place. Only the
    /// counter columns are written; batches land concurrently, and a
    /// full-record save here could resurrect a status that `stop` or
    /// `finalize` changed underneath us.
    pub async fn aggregate(&self, id: Uuid, summary: &BatchSummary) -> Result<()> {
        let fresh = self
            .store
            .record_batch_summary(id, summary)
            .await
            .map_err(Error::persistence)?;
        if !fresh {
            debug!(execution = %id, batch = %summary.batch_id, "duplicate batch summary ignored");
        }

        let summaries = self
            .store
            .batch_summaries(id)
            .await
            .map_err(Error::persistence)?;
        let completed: u32 = summaries.iter().map(|s| s.completed).sum();
        let failed: u32 = summaries.iter().map(|s| s.failed).sum();

        self.store
            .update_counts(id, completed, failed)
            .await
            .map_err(Error::persistence)?;
        Ok(())
    }

    /// Fold a set of batch summaries into the execution and return the
    /// resulting (completed, failed) totals. Order and duplicates don't
    /// matter; `aggregate` dedupes by batch id.
    pub async fn aggregate_batches(
        &self,
        id: Uuid,
        summaries: &[BatchSummary],
    ) -> Result<(u32, u32)> {
        for summary in summaries {
            self.aggregate(id, summary).await?;
        }
        let execution = self.load(id).await?;
        Ok((execution.completed_cases, execution.failed_cases))
    }

    /// Close out an execution. Totals are recomputed from the durable batch
    /// summaries, never trusted from in-memory state. A second finalize (a
    /// retried workflow step, say) is a no-op against a terminal record.
    pub async fn finalize(
        &self,
        id: Uuid,
        outcome: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<Execution> {
        if !outcome.is_terminal() {
            return Err(Error::InvalidConfiguration(format!(
                "finalize requires a terminal status, got {}",
                outcome
            )));
        }

        let mut execution = self.load(id).await?;
        if execution.status.is_terminal() {
            debug!(execution = %id, status = %execution.status, "finalize on terminal execution ignored");
            return Ok(execution);
        }

        let summaries = self
            .store
            .batch_summaries(id)
            .await
            .map_err(Error::persistence)?;
        execution.completed_cases = summaries.iter().map(|s| s.completed).sum();
        execution.failed_cases = summaries.iter().map(|s| s.failed).sum();
        if execution.completed_cases + execution.failed_cases > 0 {
            execution.results_ref = Some(format!("case_results:{}", id));
        }
        execution.status = outcome;
        execution.end_time = Some(chrono::Utc::now());
        if let Some(detail) = error {
            execution.error_message = Some(detail.to_string());
        }

        self.store
            .save_execution(&execution)
            .await
            .map_err(Error::persistence)?;

        info!(
            execution = %id,
            status = %execution.status,
            completed = execution.completed_cases,
            failed = execution.failed_cases,
            "campaign finalized"
        );
        Ok(execution)
    }

    /// Request a stop. Returns false when there is nothing to stop (unknown
    /// or already-terminal execution).
    pub async fn stop(&self, id: Uuid) -> Result<bool> {
        {
            let mut registry = self.registry.lock().unwrap();
            if let Some(run) = registry.get(&id) {
                if run.handle.is_finished() {
                    // The run exited before removing itself; fall through to
                    // the durable record.
                    registry.remove(&id);
                } else {
                    run.cancel.cancel();
                    info!(execution = %id, "stop requested for local run");
                    return Ok(true);
                }
            }
        }

        let execution = match self
            .store
            .get_execution(id)
            .await
            .map_err(Error::persistence)?
        {
            Some(e) => e,
            None => return Ok(false),
        };
        if execution.status.is_terminal() {
            return Ok(false);
        }

        if let Some(handle) = &execution.dispatch_handle {
            match self.dispatcher.cancel(handle).await {
                Ok(cancelled) => {
                    debug!(execution = %id, cancelled, "dispatcher cancellation requested")
                }
                Err(e) => {
                    warn!(execution = %id, error = %e, "dispatcher cancellation failed, stopping record anyway")
                }
            }
        }

        self.store
            .update_status(id, ExecutionStatus::Stopped, None)
            .await
            .map_err(Error::persistence)?;
        Ok(true)
    }

    /// Delete an execution and its artifacts. Refused while the campaign is
    /// queued or running; stop it first.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let execution = match self
            .store
            .get_execution(id)
            .await
            .map_err(Error::persistence)?
        {
            Some(e) => e,
            None => return Ok(false),
        };
        if matches!(
            execution.status,
            ExecutionStatus::Running | ExecutionStatus::Queued
        ) {
            warn!(execution = %id, status = %execution.status, "delete refused on active execution");
            return Ok(false);
        }

        if let Some(run) = self.registry.lock().unwrap().remove(&id) {
            run.handle.abort();
        }

        self.store
            .delete_execution(id)
            .await
            .map_err(Error::persistence)
    }

    pub async fn status(&self, id: Uuid) -> Result<Execution> {
        self.load(id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Execution>> {
        self.store
            .list_executions(limit)
            .await
            .map_err(Error::persistence)
    }

    pub async fn results(&self, id: Uuid) -> Result<Vec<CaseResult>> {
        self.load(id).await?;
        self.store
            .case_results(id)
            .await
            .map_err(Error::persistence)
    }

    pub async fn analyze(&self, id: Uuid) -> Result<Analysis> {
        let results = self.results(id).await?;
        Ok(analysis::analyze(id, &results))
    }

    pub async fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        self.store
            .cleanup_older_than(days)
            .await
            .map_err(Error::persistence)
    }

    /// Worker operation: expand the config and split it for `worker_count`
    /// workers, flipping the execution to running. Called by the dispatch
    /// backend at the start of a distributed fan-out.
    pub async fn prepare_batches(
        &self,
        id: Uuid,
        config: &SweepConfig,
        worker_count: u32,
    ) -> Result<Vec<Batch>> {
        self.load(id).await?;
        let cases = sweep::expand(config, &self.catalog)?;
        let batches = sweep::split_batches(&cases, worker_count, config.delay_between_cases_secs);

        self.store
            .update_status(id, ExecutionStatus::Running, None)
            .await
            .map_err(Error::persistence)?;

        info!(execution = %id, batches = batches.len(), "batches prepared for distributed run");
        Ok(batches)
    }

    /// Worker operation: execute one batch, persist its results, and fold
    /// its summary into the execution. A panic inside the batch is absorbed
    /// and reported as a fully-failed batch so aggregation still closes.
    pub async fn execute_batch(
        &self,
        id: Uuid,
        batch: Batch,
        delay_secs: f64,
        timeout_secs: u64,
    ) -> Result<BatchSummary> {
        self.load(id).await?;

        let engine = self.engine.clone();
        let task_batch = batch.clone();
        let outcome = tokio::spawn(async move {
            engine
                .run_batch(
                    &task_batch,
                    Duration::from_secs_f64(delay_secs.max(0.0)),
                    Duration::from_secs(timeout_secs),
                    &CancelToken::default(),
                )
                .await
        })
        .await;

        let (results, summary) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                error!(execution = %id, batch = %batch.batch_id, error = %e, "batch task aborted");
                (Vec::new(), BatchSummary::all_failed(&batch))
            }
        };

        if !results.is_empty() {
            self.store
                .append_case_results(id, &results)
                .await
                .map_err(Error::persistence)?;
        }
        self.aggregate(id, &summary).await?;
        Ok(summary)
    }

    /// Worker operation: run an entire distributed execution in-process,
    /// batches in parallel. This is the task-queue entry point; the workflow
    /// backend calls the finer-grained operations itself.
    pub async fn run_dispatched(
        &self,
        id: Uuid,
        config: &SweepConfig,
        worker_count: u32,
    ) -> Result<Execution> {
        let batches = self.prepare_batches(id, config, worker_count).await?;
        let outcomes = futures::future::join_all(batches.into_iter().map(|batch| {
            self.execute_batch(
                id,
                batch,
                config.delay_between_cases_secs,
                config.case_timeout_secs,
            )
        }))
        .await;
        for outcome in outcomes {
            outcome?;
        }
        self.finalize(id, ExecutionStatus::Completed, None).await
    }

    async fn load(&self, id: Uuid) -> Result<Execution> {
        self.store
            .get_execution(id)
            .await
            .map_err(Error::persistence)?
            .ok_or(Error::NotFound(id))
    }
}
