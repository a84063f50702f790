//! SQLite implementation of the persistence store (r2d2 pool, WAL).

use super::schema;
use super::{Execution, ExecutionStatus, PersistenceStore};
use crate::engine::{BatchSummary, CaseResult};
use crate::sweep::TestCase;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use uuid::Uuid;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Relational store backed by a local SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            pool: open_pool(path)?,
        })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

fn parse_time(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    Ok(match s {
        Some(s) => Some(
            DateTime::parse_from_rfc3339(&s)
                .context("invalid timestamp in executions row")?
                .with_timezone(&Utc),
        ),
        None => None,
    })
}

fn read_execution(row: &Row<'_>) -> rusqlite::Result<(String, String, RawTimes, Counts, RawRefs)> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(2)?,
        RawTimes {
            start: row.get(3)?,
            end: row.get(4)?,
            created: row.get(11)?,
        },
        Counts {
            total: row.get(5)?,
            completed: row.get(6)?,
            failed: row.get(7)?,
        },
        RawRefs {
            config_name: row.get(1)?,
            results_ref: row.get(8)?,
            error_message: row.get(9)?,
            dispatch_handle: row.get(10)?,
        },
    ))
}

struct RawTimes {
    start: Option<String>,
    end: Option<String>,
    created: String,
}

struct Counts {
    total: u32,
    completed: u32,
    failed: u32,
}

struct RawRefs {
    config_name: String,
    results_ref: Option<String>,
    error_message: Option<String>,
    dispatch_handle: Option<String>,
}

fn into_execution(raw: (String, String, RawTimes, Counts, RawRefs)) -> Result<Execution> {
    let (id, status, times, counts, refs) = raw;
    Ok(Execution {
        execution_id: Uuid::parse_str(&id).context("invalid execution id in row")?,
        config_name: refs.config_name,
        status: status.parse()?,
        start_time: parse_time(times.start)?,
        end_time: parse_time(times.end)?,
        total_cases: counts.total,
        completed_cases: counts.completed,
        failed_cases: counts.failed,
        results_ref: refs.results_ref,
        error_message: refs.error_message,
        dispatch_handle: refs.dispatch_handle,
        created_at: DateTime::parse_from_rfc3339(&times.created)
            .context("invalid created_at in row")?
            .with_timezone(&Utc),
    })
}

const EXECUTION_COLUMNS: &str = "execution_id, config_name, status, start_time, end_time, \
     total_cases, completed_cases, failed_cases, results_ref, error_message, \
     dispatch_handle, created_at";

#[async_trait::async_trait]
impl PersistenceStore for SqliteStore {
    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO executions
             (execution_id, config_name, status, start_time, end_time,
              total_cases, completed_cases, failed_cases, results_ref,
              error_message, dispatch_handle, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                execution.execution_id.to_string(),
                execution.config_name,
                execution.status.to_string(),
                execution.start_time.map(|t| t.to_rfc3339()),
                execution.end_time.map(|t| t.to_rfc3339()),
                execution.total_cases,
                execution.completed_cases,
                execution.failed_cases,
                execution.results_ref,
                execution.error_message,
                execution.dispatch_handle,
                execution.created_at.to_rfc3339(),
            ],
        )
        .context("failed to save execution")?;
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM executions WHERE execution_id = ?1",
            EXECUTION_COLUMNS
        ))?;

        let mut rows = stmt.query_map(params![id.to_string()], read_execution)?;
        match rows.next() {
            Some(raw) => Ok(Some(into_execution(raw?)?)),
            None => Ok(None),
        }
    }

    async fn list_executions(&self, limit: usize) -> Result<Vec<Execution>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM executions ORDER BY created_at DESC LIMIT ?1",
            EXECUTION_COLUMNS
        ))?;

        let rows = stmt.query_map(params![limit as i64], read_execution)?;
        let mut executions = Vec::new();
        for raw in rows {
            executions.push(into_execution(raw?)?);
        }
        Ok(executions)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        let now = Utc::now().to_rfc3339();

        let changed = if status.is_terminal() {
            conn.execute(
                "UPDATE executions
                 SET status = ?1, end_time = ?2,
                     error_message = COALESCE(?3, error_message)
                 WHERE execution_id = ?4",
                params![status.to_string(), now, error, id.to_string()],
            )?
        } else if status == ExecutionStatus::Running {
            conn.execute(
                "UPDATE executions
                 SET status = ?1, start_time = COALESCE(start_time, ?2),
                     error_message = COALESCE(?3, error_message)
                 WHERE execution_id = ?4",
                params![status.to_string(), now, error, id.to_string()],
            )?
        } else {
            conn.execute(
                "UPDATE executions
                 SET status = ?1, error_message = COALESCE(?2, error_message)
                 WHERE execution_id = ?3",
                params![status.to_string(), error, id.to_string()],
            )?
        };

        if changed == 0 {
            anyhow::bail!("execution {} not found", id);
        }
        Ok(())
    }

    async fn update_counts(&self, id: Uuid, completed: u32, failed: u32) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE executions SET completed_cases = ?1, failed_cases = ?2
             WHERE execution_id = ?3",
            params![completed, failed, id.to_string()],
        )?;
        if changed == 0 {
            anyhow::bail!("execution {} not found", id);
        }
        Ok(())
    }

    async fn set_dispatch_handle(&self, id: Uuid, handle: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE executions SET dispatch_handle = ?1 WHERE execution_id = ?2",
            params![handle, id.to_string()],
        )?;
        if changed == 0 {
            anyhow::bail!("execution {} not found", id);
        }
        Ok(())
    }

    async fn delete_execution(&self, id: Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let key = id.to_string();
        conn.execute(
            "DELETE FROM case_results WHERE execution_id = ?1",
            params![key],
        )?;
        conn.execute(
            "DELETE FROM batch_summaries WHERE execution_id = ?1",
            params![key],
        )?;
        let changed = conn.execute(
            "DELETE FROM executions WHERE execution_id = ?1",
            params![key],
        )?;
        Ok(changed > 0)
    }

    async fn record_batch_summary(&self, id: Uuid, summary: &BatchSummary) -> Result<bool> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO batch_summaries
             (execution_id, batch_id, worker_index, completed, failed, total, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                summary.batch_id,
                summary.worker_index,
                summary.completed,
                summary.failed,
                summary.total,
                summary.duration_secs,
            ],
        )
        .context("failed to record batch summary")?;
        Ok(changed == 1)
    }

    async fn batch_summaries(&self, id: Uuid) -> Result<Vec<BatchSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, worker_index, completed, failed, total, duration_secs
             FROM batch_summaries WHERE execution_id = ?1 ORDER BY worker_index",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok(BatchSummary {
                batch_id: row.get(0)?,
                worker_index: row.get(1)?,
                completed: row.get(2)?,
                failed: row.get(3)?,
                total: row.get(4)?,
                duration_secs: row.get(5)?,
            })
        })?;

        let mut summaries = Vec::new();
        for r in rows {
            summaries.push(r?);
        }
        Ok(summaries)
    }

    async fn append_case_results(&self, id: Uuid, results: &[CaseResult]) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO case_results
                 (execution_id, model, user_type, think_mode, question, iteration,
                  response, elapsed_secs, success, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for r in results {
                stmt.execute(params![
                    id.to_string(),
                    r.case.model,
                    r.case.user_type,
                    r.case.think_mode as i64,
                    r.case.question,
                    r.case.iteration,
                    r.response,
                    r.elapsed_secs,
                    r.success as i64,
                    r.error,
                    r.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit().context("failed to append case results")?;
        Ok(())
    }

    async fn case_results(&self, id: Uuid) -> Result<Vec<CaseResult>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT model, user_type, think_mode, question, iteration,
                    response, elapsed_secs, success, error, created_at
             FROM case_results WHERE execution_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                TestCase {
                    model: row.get(0)?,
                    user_type: row.get(1)?,
                    think_mode: row.get::<_, i64>(2)? != 0,
                    question: row.get(3)?,
                    iteration: row.get(4)?,
                },
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, i64>(7)? != 0,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut results = Vec::new();
        for r in rows {
            let (case, response, elapsed_secs, success, error, created_at) = r?;
            results.push(CaseResult {
                case,
                response,
                elapsed_secs,
                success,
                error,
                timestamp: DateTime::parse_from_rfc3339(&created_at)
                    .context("invalid created_at in case_results row")?
                    .with_timezone(&Utc),
            });
        }
        Ok(results)
    }

    async fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();

        let mut stmt =
            conn.prepare("SELECT execution_id FROM executions WHERE created_at < ?1")?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;

        let mut removed = 0;
        for r in rows {
            let key = r?;
            conn.execute(
                "DELETE FROM case_results WHERE execution_id = ?1",
                params![key],
            )?;
            conn.execute(
                "DELETE FROM batch_summaries WHERE execution_id = ?1",
                params![key],
            )?;
            conn.execute(
                "DELETE FROM executions WHERE execution_id = ?1",
                params![key],
            )?;
            removed += 1;
        }

        Ok(removed)
    }
}
