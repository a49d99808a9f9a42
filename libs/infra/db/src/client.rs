use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Thin wrapper over a libsql `Database`, handling the local-file,
/// in-memory, and remote (Turso) connection modes.
///
/// For `:memory:` databases libsql drops all state once every connection
/// is closed, so this wrapper anchors one persistent connection for the
/// lifetime of the process and applies the schema against it before
/// handing out further connections.
#[derive(Clone)]
pub struct CoordinatorDb {
    database_driver: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl CoordinatorDb {
    #[instrument(skip(auth_token))]
    pub async fn connect(connection_url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if connection_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is empty".into()));
        }

        info!("connecting to coordinator database at {connection_url}");

        let is_remote = connection_url.starts_with("libsql://") || connection_url.starts_with("https://");
        let is_memory = connection_url.contains(":memory:") || connection_url.contains("mode=memory");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| DbError::ConfigurationError("remote database URL requires TURSO_AUTH_TOKEN".into()))?;
            Builder::new_remote(connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(connection_url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let database = Arc::new(database);
        let memory_anchor = if is_memory {
            let anchor = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&anchor).await?;
            info!("in-memory database anchored and schema applied");
            Some(Arc::new(anchor))
        } else {
            let bootstrap = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&bootstrap).await?;
            None
        };

        Ok(Self {
            database_driver: database,
            _memory_anchor: memory_anchor,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.database_driver.connect().map_err(|e| {
            error!("failed to allocate a connection: {e}");
            DbError::ConnectionError(e.to_string())
        })
    }
}
