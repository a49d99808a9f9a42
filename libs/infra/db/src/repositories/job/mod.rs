pub mod chunk_math;
pub mod queries;

pub use chunk_math::{compute_chunk_length, ChunkSizingInput};
pub use queries::{PresetJobRepository, WorkflowRepository};

use crate::errors::DbError;
use krakenhashes_models::{JobExecution, JobExecutionStatus, JobTask, TaskStatus};
use libsql::{params, Connection};
use tracing::{instrument, warn};

/// JobExecution/JobTask persistence plus the chunk scheduler's
/// allocate-under-lock and zombie-recovery operations.
///
/// `job_executions.keyspace_processed` tracks keyspace *assigned*, not
/// completed: a task's chunk range is reserved the moment it is handed
/// out, and a zombie recovery re-issues the same range rather than
/// reopening the execution's remaining keyspace. This keeps allocation a
/// single transaction against one row instead of needing a separate
/// reservation column.
pub struct JobRepository {
    connection: Connection,
}

impl JobRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn create_execution(&self, preset_job_id: i64, hashlist_id: i64, priority: i32, keyspace_total: i64) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO job_executions (preset_job_id, hashlist_id, priority, status, keyspace_total, keyspace_processed, created_at) \
                 VALUES (?1, ?2, ?3, 'pending', ?4, 0, ?5)",
                params![preset_job_id, hashlist_id, priority, keyspace_total, chrono::Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    #[instrument(skip(self))]
    pub async fn get_execution(&self, id: i64) -> Result<JobExecution, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, preset_job_id, hashlist_id, priority, status, keyspace_total, keyspace_processed, \
                 created_at, completed_at, error_message FROM job_executions WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_execution(&row),
            None => Err(DbError::JobExecutionNotFound),
        }
    }

    /// Picks the highest-priority execution with remaining keyspace that
    /// isn't paused, completed, or failed. Runs outside the allocation
    /// transaction since it only reads.
    #[instrument(skip(self))]
    pub async fn next_runnable_execution(&self) -> Result<Option<JobExecution>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, preset_job_id, hashlist_id, priority, status, keyspace_total, keyspace_processed, \
                 created_at, completed_at, error_message FROM job_executions \
                 WHERE status IN ('pending', 'running') AND keyspace_processed < keyspace_total \
                 ORDER BY priority DESC, created_at ASC LIMIT 1",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_execution(&row)?)),
            None => Ok(None),
        }
    }

    /// Reserves a chunk of `execution_id`'s remaining keyspace for
    /// `agent_id` inside one transaction, so two agents racing the same
    /// execution can never be handed overlapping ranges.
    #[instrument(skip(self))]
    pub async fn allocate_chunk(&self, execution_id: i64, agent_id: i64, chunk_length: i64) -> Result<JobTask, DbError> {
        if chunk_length <= 0 {
            return Err(DbError::ChunkClaimConflict);
        }
        let tx = self.connection.transaction().await?;

        let mut rows = tx
            .query(
                "SELECT keyspace_total, keyspace_processed FROM job_executions WHERE id = ?1",
                params![execution_id],
            )
            .await?;
        let (total, processed): (i64, i64) = match rows.next().await? {
            Some(row) => (row.get(0)?, row.get(1)?),
            None => return Err(DbError::JobExecutionNotFound),
        };
        drop(rows);

        let remaining = (total - processed).max(0);
        if remaining == 0 {
            return Err(DbError::ChunkClaimConflict);
        }
        let length = chunk_length.min(remaining);
        let chunk_start = processed;

        tx.execute(
            "UPDATE job_executions SET keyspace_processed = keyspace_processed + ?1, status = 'running' WHERE id = ?2",
            params![length, execution_id],
        )
        .await?;

        tx.execute(
            "INSERT INTO job_tasks (job_execution_id, agent_id, chunk_start, chunk_length, status, progress_percent, hashes_per_second, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'in_progress', 0.0, 0, ?5)",
            params![execution_id, agent_id, chunk_start, length, chrono::Utc::now().to_rfc3339()],
        )
        .await?;
        let task_id = tx.last_insert_rowid();
        tx.commit().await?;

        Ok(JobTask {
            id: task_id,
            job_execution_id: execution_id,
            agent_id: Some(agent_id),
            chunk_start,
            chunk_length: length,
            status: TaskStatus::InProgress,
            progress_percent: 0.0,
            hashes_per_second: 0,
            error_message: None,
            updated_at: chrono::Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_task_progress(&self, task_id: i64, progress_percent: f32, hashes_per_second: i64) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                "UPDATE job_tasks SET progress_percent = ?1, hashes_per_second = ?2, updated_at = ?3 WHERE id = ?4",
                params![progress_percent as f64, hashes_per_second, chrono::Utc::now().to_rfc3339(), task_id],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn complete_task(&self, task_id: i64) -> Result<(), DbError> {
        self.connection
            .execute(
                "UPDATE job_tasks SET status = 'completed', progress_percent = 100.0, updated_at = ?1 WHERE id = ?2",
                params![chrono::Utc::now().to_rfc3339(), task_id],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fail_task(&self, task_id: i64, error_message: &str) -> Result<(), DbError> {
        self.connection
            .execute(
                "UPDATE job_tasks SET status = 'failed', error_message = ?1, updated_at = ?2 WHERE id = ?3",
                params![error_message, chrono::Utc::now().to_rfc3339(), task_id],
            )
            .await?;
        Ok(())
    }

    /// Finds tasks still `in_progress` whose owning agent has gone quiet
    /// past `stale_after`, and resets them to `pending`/unassigned so the
    /// scheduler re-issues the same chunk range to a live agent.
    #[instrument(skip(self))]
    pub async fn recover_zombie_tasks(&self, stale_after: chrono::Duration) -> Result<Vec<i64>, DbError> {
        let cutoff = (chrono::Utc::now() - stale_after).to_rfc3339();
        let mut rows = self
            .connection
            .query("SELECT id FROM job_tasks WHERE status = 'in_progress' AND updated_at < ?1", params![cutoff])
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        for id in &ids {
            warn!(task_id = id, "recovering zombie task");
            self.connection
                .execute(
                    "UPDATE job_tasks SET status = 'pending', agent_id = NULL, updated_at = ?1 WHERE id = ?2",
                    params![chrono::Utc::now().to_rfc3339(), id],
                )
                .await?;
        }
        Ok(ids)
    }

    #[instrument(skip(self))]
    pub async fn set_execution_status(&self, id: i64, status: JobExecutionStatus) -> Result<(), DbError> {
        let completed_at = matches!(status, JobExecutionStatus::Completed | JobExecutionStatus::Failed)
            .then(|| chrono::Utc::now().to_rfc3339());
        self.connection
            .execute(
                "UPDATE job_executions SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![execution_status_to_str(status), completed_at, id],
            )
            .await?;
        Ok(())
    }
}

fn execution_status_to_str(status: JobExecutionStatus) -> &'static str {
    match status {
        JobExecutionStatus::Pending => "pending",
        JobExecutionStatus::Running => "running",
        JobExecutionStatus::Paused => "paused",
        JobExecutionStatus::Completed => "completed",
        JobExecutionStatus::Failed => "failed",
        JobExecutionStatus::Interrupted => "interrupted",
    }
}

fn execution_status_from_str(value: &str) -> Result<JobExecutionStatus, DbError> {
    match value {
        "pending" => Ok(JobExecutionStatus::Pending),
        "running" => Ok(JobExecutionStatus::Running),
        "paused" => Ok(JobExecutionStatus::Paused),
        "completed" => Ok(JobExecutionStatus::Completed),
        "failed" => Ok(JobExecutionStatus::Failed),
        "interrupted" => Ok(JobExecutionStatus::Interrupted),
        other => Err(DbError::MappingError(format!("unknown job execution status: {other}"))),
    }
}

fn map_execution(row: &libsql::Row) -> Result<JobExecution, DbError> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    let completed_at: Option<String> = row.get(8)?;
    Ok(JobExecution {
        id: row.get(0)?,
        preset_job_id: row.get(1)?,
        hashlist_id: row.get(2)?,
        priority: row.get(3)?,
        status: execution_status_from_str(&status)?,
        keyspace_total: row.get(5)?,
        keyspace_processed: row.get(6)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        completed_at: completed_at
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        error_message: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::apply_schema;
    use libsql::Builder;

    async fn memory_connection() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        apply_schema(&conn).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn allocate_chunk_never_overruns_keyspace() {
        let conn = memory_connection().await;
        let repository = JobRepository::new(conn);
        let execution_id = repository.create_execution(1, 1, 0, 100).await.unwrap();

        let first = repository.allocate_chunk(execution_id, 1, 80).await.unwrap();
        assert_eq!(first.chunk_start, 0);
        assert_eq!(first.chunk_length, 80);

        let second = repository.allocate_chunk(execution_id, 2, 80).await.unwrap();
        assert_eq!(second.chunk_start, 80);
        assert_eq!(second.chunk_length, 20, "clamped to the remaining keyspace");

        assert!(matches!(repository.allocate_chunk(execution_id, 3, 10).await, Err(DbError::ChunkClaimConflict)));
    }

    #[tokio::test]
    async fn zombie_recovery_reclaims_stale_tasks() {
        let conn = memory_connection().await;
        let repository = JobRepository::new(conn);
        let execution_id = repository.create_execution(1, 1, 0, 100).await.unwrap();
        let task = repository.allocate_chunk(execution_id, 1, 50).await.unwrap();

        repository
            .connection
            .execute(
                "UPDATE job_tasks SET updated_at = ?1 WHERE id = ?2",
                params![(chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339(), task.id],
            )
            .await
            .unwrap();

        let recovered = repository.recover_zombie_tasks(chrono::Duration::minutes(30)).await.unwrap();
        assert_eq!(recovered, vec![task.id]);
    }
}
