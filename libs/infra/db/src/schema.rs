use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/// Base table definitions. Staged ahead of `EVOLUTIONARY_COLUMNS` so a
/// table can start minimal and grow columns in the next stage, matching
/// how this schema has evolved release to release.
const BASE_TABLES: &[(&str, &str)] = &[
    ("TABLE_HASH_TYPES", r#"
        CREATE TABLE IF NOT EXISTS hash_types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            needs_processing INTEGER NOT NULL DEFAULT 0,
            is_salted INTEGER NOT NULL DEFAULT 0,
            performance_class TEXT NOT NULL DEFAULT 'fast'
        );
    "#),
    ("TABLE_HASHES", r#"
        CREATE TABLE IF NOT EXISTS hashes (
            id TEXT PRIMARY KEY,
            hash_value TEXT NOT NULL,
            original_hash TEXT NOT NULL,
            hash_type_id INTEGER NOT NULL,
            username TEXT,
            domain TEXT,
            is_cracked INTEGER NOT NULL DEFAULT 0,
            password TEXT,
            last_updated DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CLIENTS", r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            data_retention_months INTEGER
        );
    "#),
    ("TABLE_HASHLISTS", r#"
        CREATE TABLE IF NOT EXISTS hashlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            client_id TEXT,
            hash_type_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'uploading',
            total_hashes INTEGER NOT NULL DEFAULT 0,
            cracked_hashes INTEGER NOT NULL DEFAULT 0,
            exclude_from_potfile INTEGER NOT NULL DEFAULT 0,
            file_path TEXT NOT NULL,
            error_message TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_HASHLIST_HASHES", r#"
        CREATE TABLE IF NOT EXISTS hashlist_hashes (
            hashlist_id INTEGER NOT NULL,
            hash_id TEXT NOT NULL
        );
    "#),
    ("TABLE_FILES", r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            md5_hash TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            file_type TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'general',
            verification_status TEXT NOT NULL DEFAULT 'pending',
            line_count INTEGER,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PRESET_JOBS", r#"
        CREATE TABLE IF NOT EXISTS preset_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            attack_mode TEXT NOT NULL,
            wordlist_ids TEXT NOT NULL DEFAULT '[]',
            rule_ids TEXT NOT NULL DEFAULT '[]',
            mask TEXT,
            binary_id INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            chunk_duration_seconds INTEGER NOT NULL DEFAULT 1200,
            small_job INTEGER NOT NULL DEFAULT 0,
            allow_high_priority_override INTEGER NOT NULL DEFAULT 0,
            status_updates INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("TABLE_WORKFLOWS", r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            preset_job_ids TEXT NOT NULL DEFAULT '[]'
        );
    "#),
    ("TABLE_JOB_EXECUTIONS", r#"
        CREATE TABLE IF NOT EXISTS job_executions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            preset_job_id INTEGER NOT NULL,
            hashlist_id INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            keyspace_total INTEGER NOT NULL DEFAULT 0,
            keyspace_processed INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            completed_at DATETIME,
            error_message TEXT
        );
    "#),
    ("TABLE_JOB_TASKS", r#"
        CREATE TABLE IF NOT EXISTS job_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_execution_id INTEGER NOT NULL,
            agent_id INTEGER,
            chunk_start INTEGER NOT NULL,
            chunk_length INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            progress_percent REAL NOT NULL DEFAULT 0.0,
            hashes_per_second INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            api_key TEXT NOT NULL,
            cert_fingerprint TEXT,
            hardware_json TEXT NOT NULL DEFAULT '[]',
            version TEXT NOT NULL DEFAULT '',
            last_heartbeat DATETIME,
            schedule_json TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}'
        );
    "#),
    ("TABLE_CLAIM_VOUCHERS", r#"
        CREATE TABLE IF NOT EXISTS claim_vouchers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_continuous INTEGER NOT NULL DEFAULT 0,
            expires_at DATETIME,
            used_by_agent_id INTEGER
        );
    "#),
    ("TABLE_BENCHMARKS", r#"
        CREATE TABLE IF NOT EXISTS benchmarks (
            agent_id INTEGER NOT NULL,
            attack_mode TEXT NOT NULL,
            hash_type_id INTEGER NOT NULL,
            hashes_per_second INTEGER NOT NULL,
            measured_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (agent_id, attack_mode, hash_type_id)
        );
    "#),
    ("TABLE_SYSTEM_SETTINGS", r#"
        CREATE TABLE IF NOT EXISTS system_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    "#),
];

/// Column additions layered onto the base tables. Tolerant of "duplicate
/// column name" errors so re-running the migration against an
/// already-evolved database is a no-op.
const EVOLUTIONARY_COLUMNS: &[(&str, &str)] = &[
    ("HASHLISTS_CLIENT_REQUIRED", "ALTER TABLE hashlists ADD COLUMN client_required INTEGER NOT NULL DEFAULT 0"),
];

/// Acceleration indexes required by the external interfaces section.
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_HASHES_VALUE_TYPE", "CREATE INDEX IF NOT EXISTS idx_hashes_value_type ON hashes(hash_value, hash_type_id);"),
    ("IDX_HASHLIST_HASHES", "CREATE INDEX IF NOT EXISTS idx_hashlist_hashes ON hashlist_hashes(hashlist_id, hash_id);"),
    ("IDX_JOB_TASKS_EXECUTION_STATUS", "CREATE INDEX IF NOT EXISTS idx_job_tasks_execution_status ON job_tasks(job_execution_id, status);"),
    ("IDX_JOB_TASKS_AGENT_STATUS", "CREATE INDEX IF NOT EXISTS idx_job_tasks_agent_status ON job_tasks(agent_id, status);"),
    ("IDX_AGENTS_STATUS", "CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);"),
    ("IDX_AGENTS_HEARTBEAT", "CREATE INDEX IF NOT EXISTS idx_agents_heartbeat ON agents(last_heartbeat);"),
    ("IDX_BENCHMARKS_LOOKUP", "CREATE INDEX IF NOT EXISTS idx_benchmarks_lookup ON benchmarks(agent_id, attack_mode, hash_type_id);"),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<()> {
    info!("applying coordinator database schema");

    create_base_tables(connection).await?;
    apply_evolutionary_columns(connection).await?;
    create_indexes(connection).await?;

    info!("schema applied");
    Ok(())
}

async fn create_base_tables(db: &Connection) -> Result<()> {
    for (identifier, sql) in BASE_TABLES {
        debug!("creating table: {identifier}");
        db.execute(*sql, ())
            .await
            .with_context(|| format!("failed to create table: {identifier}"))?;
    }
    Ok(())
}

async fn apply_evolutionary_columns(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_COLUMNS {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("applied column migration: {identifier}"),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("column migration already applied: {identifier}");
                } else {
                    warn!("column migration {identifier} failed: {message}");
                }
            }
        }
    }
    Ok(())
}

async fn create_indexes(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("creating index: {identifier}");
        db.execute(*sql, ())
            .await
            .with_context(|| format!("failed to create index: {identifier}"))?;
    }
    Ok(())
}
