use thiserror::Error;

/// Error catalog for the persistence layer, matching the error kinds
/// distinguished in the coordinator's error handling design: transient-IO,
/// conflict, and not-found are all surfaced as structured values here
/// rather than unwinding past a request boundary.
#[derive(Error, Debug)]
pub enum DbError {
    /// Transient-IO: connection or network failure against the database.
    #[error("database connection error: {0}")]
    ConnectionError(String),

    /// Misconfiguration, e.g. a missing auth token for a remote URL.
    #[error("database configuration error: {0}")]
    ConfigurationError(String),

    /// Transient-IO: a query was rejected by the engine.
    #[error("query error: {0}")]
    QueryError(#[from] libsql::Error),

    /// Row data failed to map onto a domain type.
    #[error("data mapping error: {0}")]
    MappingError(String),

    #[error("transaction failed to commit")]
    TransactionError,

    /// Transient-IO: schema migration failed.
    #[error("schema migration error: {0}")]
    SchemaError(#[from] anyhow::Error),

    // --- Hash store / hashlist ---
    #[error("hashlist not found")]
    HashlistNotFound,

    #[error("hash not found")]
    HashNotFound,

    // --- Job / scheduler ---
    #[error("job execution not found")]
    JobExecutionNotFound,

    #[error("task not found")]
    TaskNotFound,

    /// Conflict: a chunk-allocation attempt raced another and lost.
    #[error("concurrent chunk claim conflict")]
    ChunkClaimConflict,

    // --- Agent registry ---
    #[error("agent not found")]
    AgentNotFound,

    /// Conflict: duplicate agent or client name.
    #[error("name already in use: {0}")]
    DuplicateName(String),

    /// Auth-denied: invalid, expired, or already-used voucher.
    #[error("voucher is not valid for registration")]
    VoucherInvalid,

    #[error("file registry entry not found")]
    FileNotFound,

    #[error("client not found")]
    ClientNotFound,

    #[error("hash type not found")]
    HashTypeNotFound,
}
