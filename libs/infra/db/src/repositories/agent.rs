use crate::errors::DbError;
use krakenhashes_models::{Agent, AgentStatus, Benchmark, ClaimVoucher};
use libsql::{params, Connection};
use tracing::instrument;

pub struct AgentRepository {
    connection: Connection,
}

impl AgentRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, agent))]
    pub async fn create(&self, agent: &Agent) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO agents (name, status, api_key, cert_fingerprint, hardware_json, version, last_heartbeat, schedule_json, metadata_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    agent.name.clone(),
                    status_to_str(agent.status),
                    agent.api_key.clone(),
                    agent.cert_fingerprint.clone(),
                    serde_json::to_string(&agent.hardware).unwrap_or_else(|_| "[]".into()),
                    agent.version.clone(),
                    agent.last_heartbeat.map(|t| t.to_rfc3339()),
                    agent.schedule.as_ref().map(|s| serde_json::to_string(s).unwrap_or_else(|_| "null".into())),
                    serde_json::to_string(&agent.metadata).unwrap_or_else(|_| "{}".into()),
                ],
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE") {
                    DbError::DuplicateName(agent.name.clone())
                } else {
                    DbError::QueryError(e)
                }
            })?;
        Ok(self.connection.last_insert_rowid())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Agent, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, status, api_key, cert_fingerprint, hardware_json, version, last_heartbeat, schedule_json, metadata_json \
                 FROM agents WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_agent(&row),
            None => Err(DbError::AgentNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Agent, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, status, api_key, cert_fingerprint, hardware_json, version, last_heartbeat, schedule_json, metadata_json \
                 FROM agents WHERE api_key = ?1",
                params![api_key],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_agent(&row),
            None => Err(DbError::AgentNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Agent>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, status, api_key, cert_fingerprint, hardware_json, version, last_heartbeat, schedule_json, metadata_json \
                 FROM agents WHERE status = 'active' ORDER BY name",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_agent(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn record_heartbeat(&self, id: i64, hardware_json: &str) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                "UPDATE agents SET last_heartbeat = ?1, hardware_json = ?2, status = 'active' WHERE id = ?3",
                params![chrono::Utc::now().to_rfc3339(), hardware_json, id],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::AgentNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: i64, status: AgentStatus) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute("UPDATE agents SET status = ?1 WHERE id = ?2", params![status_to_str(status), id])
            .await?;
        if affected == 0 {
            return Err(DbError::AgentNotFound);
        }
        Ok(())
    }

    /// Flags every agent whose last heartbeat is older than `pong_wait` as
    /// `inactive`, so the registry's status column reflects liveness
    /// without requiring a live connection scan.
    #[instrument(skip(self))]
    pub async fn mark_stale_inactive(&self, pong_wait: chrono::Duration) -> Result<u64, DbError> {
        let cutoff = (chrono::Utc::now() - pong_wait).to_rfc3339();
        let affected = self
            .connection
            .execute(
                "UPDATE agents SET status = 'inactive' WHERE status = 'active' AND (last_heartbeat IS NULL OR last_heartbeat < ?1)",
                params![cutoff],
            )
            .await?;
        Ok(affected)
    }

    #[instrument(skip(self))]
    pub async fn record_benchmark(&self, benchmark: &Benchmark) -> Result<(), DbError> {
        self.connection
            .execute(
                "INSERT INTO benchmarks (agent_id, attack_mode, hash_type_id, hashes_per_second, measured_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(agent_id, attack_mode, hash_type_id) DO UPDATE SET \
                 hashes_per_second = excluded.hashes_per_second, measured_at = excluded.measured_at",
                params![
                    benchmark.agent_id,
                    attack_mode_to_str(benchmark.attack_mode),
                    benchmark.hash_type_id,
                    benchmark.hashes_per_second,
                    benchmark.measured_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_benchmark(
        &self,
        agent_id: i64,
        attack_mode: krakenhashes_models::AttackMode,
        hash_type_id: i32,
    ) -> Result<Option<Benchmark>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT agent_id, attack_mode, hash_type_id, hashes_per_second, measured_at FROM benchmarks \
                 WHERE agent_id = ?1 AND attack_mode = ?2 AND hash_type_id = ?3",
                params![agent_id, attack_mode_to_str(attack_mode), hash_type_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_benchmark(&row)?)),
            None => Ok(None),
        }
    }
}

pub struct ClaimVoucherRepository {
    connection: Connection,
}

impl ClaimVoucherRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, code: &str, is_continuous: bool, expires_at: Option<chrono::DateTime<chrono::Utc>>) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO claim_vouchers (code, is_active, is_continuous, expires_at) VALUES (?1, 1, ?2, ?3)",
                params![code, is_continuous as i64, expires_at.map(|t| t.to_rfc3339())],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    /// Validates and, for single-use vouchers, atomically consumes the
    /// code in one statement so two concurrent registrations cannot both
    /// succeed against the same one-time voucher.
    #[instrument(skip(self))]
    pub async fn redeem(&self, code: &str, agent_id: i64) -> Result<ClaimVoucher, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, code, is_active, is_continuous, expires_at, used_by_agent_id FROM claim_vouchers WHERE code = ?1",
                params![code],
            )
            .await?;
        let voucher = match rows.next().await? {
            Some(row) => map_voucher(&row)?,
            None => return Err(DbError::VoucherInvalid),
        };
        drop(rows);

        if !voucher.authorizes_registration(chrono::Utc::now()) {
            return Err(DbError::VoucherInvalid);
        }

        if voucher.is_continuous {
            return Ok(voucher);
        }

        let affected = self
            .connection
            .execute(
                "UPDATE claim_vouchers SET is_active = 0, used_by_agent_id = ?1 WHERE code = ?2 AND is_active = 1",
                params![agent_id, code],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::VoucherInvalid);
        }
        Ok(voucher)
    }
}

fn status_to_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Pending => "pending",
        AgentStatus::Active => "active",
        AgentStatus::Inactive => "inactive",
        AgentStatus::Error => "error",
        AgentStatus::Disabled => "disabled",
    }
}

fn status_from_str(value: &str) -> Result<AgentStatus, DbError> {
    match value {
        "pending" => Ok(AgentStatus::Pending),
        "active" => Ok(AgentStatus::Active),
        "inactive" => Ok(AgentStatus::Inactive),
        "error" => Ok(AgentStatus::Error),
        "disabled" => Ok(AgentStatus::Disabled),
        other => Err(DbError::MappingError(format!("unknown agent status: {other}"))),
    }
}

fn attack_mode_to_str(mode: krakenhashes_models::AttackMode) -> &'static str {
    use krakenhashes_models::AttackMode;
    match mode {
        AttackMode::Straight => "straight",
        AttackMode::Combination => "combination",
        AttackMode::BruteForceMask => "brute_force_mask",
        AttackMode::HybridWlMask => "hybrid_wl_mask",
        AttackMode::HybridMaskWl => "hybrid_mask_wl",
    }
}

fn attack_mode_from_str(value: &str) -> Result<krakenhashes_models::AttackMode, DbError> {
    use krakenhashes_models::AttackMode;
    match value {
        "straight" => Ok(AttackMode::Straight),
        "combination" => Ok(AttackMode::Combination),
        "brute_force_mask" => Ok(AttackMode::BruteForceMask),
        "hybrid_wl_mask" => Ok(AttackMode::HybridWlMask),
        "hybrid_mask_wl" => Ok(AttackMode::HybridMaskWl),
        other => Err(DbError::MappingError(format!("unknown attack mode: {other}"))),
    }
}

fn map_agent(row: &libsql::Row) -> Result<Agent, DbError> {
    let status: String = row.get(2)?;
    let hardware_json: String = row.get(5)?;
    let last_heartbeat: Option<String> = row.get(7)?;
    let schedule_json: Option<String> = row.get(8)?;
    let metadata_json: String = row.get(9)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        status: status_from_str(&status)?,
        api_key: row.get(3)?,
        cert_fingerprint: row.get(4)?,
        hardware: serde_json::from_str(&hardware_json).unwrap_or_default(),
        version: row.get(6)?,
        last_heartbeat: last_heartbeat
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        schedule: schedule_json.and_then(|s| serde_json::from_str(&s).ok()),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
    })
}

fn map_voucher(row: &libsql::Row) -> Result<ClaimVoucher, DbError> {
    let expires_at: Option<String> = row.get(4)?;
    Ok(ClaimVoucher {
        id: row.get(0)?,
        code: row.get(1)?,
        is_active: row.get::<i64>(2)? != 0,
        is_continuous: row.get::<i64>(3)? != 0,
        expires_at: expires_at
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        used_by_agent_id: row.get(5)?,
    })
}

fn map_benchmark(row: &libsql::Row) -> Result<Benchmark, DbError> {
    let attack_mode: String = row.get(1)?;
    let measured_at: String = row.get(4)?;
    Ok(Benchmark {
        agent_id: row.get(0)?,
        attack_mode: attack_mode_from_str(&attack_mode)?,
        hash_type_id: row.get(2)?,
        hashes_per_second: row.get(3)?,
        measured_at: chrono::DateTime::parse_from_rfc3339(&measured_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
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
    async fn single_use_voucher_cannot_be_redeemed_twice() {
        let conn = memory_connection().await;
        let vouchers = ClaimVoucherRepository::new(conn.clone());
        let agents = AgentRepository::new(conn);

        vouchers.create("ONETIME", false, None).await.unwrap();
        let agent = Agent {
            id: 0,
            name: "rig-1".into(),
            status: AgentStatus::Pending,
            api_key: "key-1".into(),
            cert_fingerprint: None,
            hardware: vec![],
            version: "1.0.0".into(),
            last_heartbeat: None,
            schedule: None,
            metadata: Default::default(),
        };
        let agent_id = agents.create(&agent).await.unwrap();

        vouchers.redeem("ONETIME", agent_id).await.unwrap();
        assert!(matches!(vouchers.redeem("ONETIME", agent_id).await, Err(DbError::VoucherInvalid)));
    }
}
