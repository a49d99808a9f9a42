use crate::errors::DbError;
use krakenhashes_models::{AttackMode, PresetJob, Workflow};
use libsql::{params, Connection};

pub(super) fn attack_mode_to_str(mode: AttackMode) -> &'static str {
    match mode {
        AttackMode::Straight => "straight",
        AttackMode::Combination => "combination",
        AttackMode::BruteForceMask => "brute_force_mask",
        AttackMode::HybridWlMask => "hybrid_wl_mask",
        AttackMode::HybridMaskWl => "hybrid_mask_wl",
    }
}

pub(super) fn attack_mode_from_str(value: &str) -> Result<AttackMode, DbError> {
    match value {
        "straight" => Ok(AttackMode::Straight),
        "combination" => Ok(AttackMode::Combination),
        "brute_force_mask" => Ok(AttackMode::BruteForceMask),
        "hybrid_wl_mask" => Ok(AttackMode::HybridWlMask),
        "hybrid_mask_wl" => Ok(AttackMode::HybridMaskWl),
        other => Err(DbError::MappingError(format!("unknown attack mode: {other}"))),
    }
}

pub struct PresetJobRepository {
    connection: Connection,
}

impl PresetJobRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn create(&self, job: &PresetJob) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO preset_jobs (name, attack_mode, wordlist_ids, rule_ids, mask, binary_id, priority, \
                 chunk_duration_seconds, small_job, allow_high_priority_override, status_updates) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    job.name.clone(),
                    attack_mode_to_str(job.attack_mode),
                    serde_json::to_string(&job.wordlist_ids).unwrap_or_else(|_| "[]".into()),
                    serde_json::to_string(&job.rule_ids).unwrap_or_else(|_| "[]".into()),
                    job.mask.clone(),
                    job.binary_id,
                    job.priority,
                    job.chunk_duration_seconds,
                    job.small_job as i64,
                    job.allow_high_priority_override as i64,
                    job.status_updates as i64,
                ],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<PresetJob, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, attack_mode, wordlist_ids, rule_ids, mask, binary_id, priority, \
                 chunk_duration_seconds, small_job, allow_high_priority_override, status_updates FROM preset_jobs WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_preset_job(&row),
            None => Err(DbError::MappingError("preset job not found".into())),
        }
    }

    pub async fn list(&self) -> Result<Vec<PresetJob>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, attack_mode, wordlist_ids, rule_ids, mask, binary_id, priority, \
                 chunk_duration_seconds, small_job, allow_high_priority_override, status_updates FROM preset_jobs ORDER BY name",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_preset_job(&row)?);
        }
        Ok(out)
    }
}

fn map_preset_job(row: &libsql::Row) -> Result<PresetJob, DbError> {
    let attack_mode: String = row.get(2)?;
    let wordlist_ids: String = row.get(3)?;
    let rule_ids: String = row.get(4)?;
    Ok(PresetJob {
        id: row.get(0)?,
        name: row.get(1)?,
        attack_mode: attack_mode_from_str(&attack_mode)?,
        wordlist_ids: serde_json::from_str(&wordlist_ids).unwrap_or_default(),
        rule_ids: serde_json::from_str(&rule_ids).unwrap_or_default(),
        mask: row.get(5)?,
        binary_id: row.get(6)?,
        priority: row.get(7)?,
        chunk_duration_seconds: row.get(8)?,
        small_job: row.get::<i64>(9)? != 0,
        allow_high_priority_override: row.get::<i64>(10)? != 0,
        status_updates: row.get::<i64>(11)? != 0,
    })
}

pub struct WorkflowRepository {
    connection: Connection,
}

impl WorkflowRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn create(&self, workflow: &Workflow) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO workflows (name, preset_job_ids) VALUES (?1, ?2)",
                params![workflow.name.clone(), serde_json::to_string(&workflow.preset_job_ids).unwrap_or_else(|_| "[]".into())],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Workflow, DbError> {
        let mut rows = self
            .connection
            .query("SELECT id, name, preset_job_ids FROM workflows WHERE id = ?1", params![id])
            .await?;
        match rows.next().await? {
            Some(row) => {
                let preset_job_ids: String = row.get(2)?;
                Ok(Workflow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    preset_job_ids: serde_json::from_str(&preset_job_ids).unwrap_or_default(),
                })
            }
            None => Err(DbError::MappingError("workflow not found".into())),
        }
    }
}
