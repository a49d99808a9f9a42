use crate::errors::DbError;
use krakenhashes_models::SystemSettings;
use libsql::{params, Connection};
use tracing::instrument;

/// Key/value settings store. Unknown rows are ignored on load and
/// untouched keys keep their struct default, so adding a new setting
/// never requires a migration against existing rows.
pub struct SettingsRepository {
    connection: Connection,
}

impl SettingsRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<SystemSettings, DbError> {
        let mut settings = SystemSettings::default();
        let mut rows = self.connection.query("SELECT key, value FROM system_settings", ()).await?;
        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            settings.apply_raw(&key, &value);
        }
        Ok(settings)
    }

    #[instrument(skip(self))]
    pub async fn set(&self, key: &str, value: &str) -> Result<(), DbError> {
        if !SystemSettings::KEYS.contains(&key) {
            return Err(DbError::MappingError(format!("unknown system setting: {key}")));
        }
        self.connection
            .execute(
                "INSERT INTO system_settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .await?;
        Ok(())
    }
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
    async fn unset_keys_keep_struct_defaults() {
        let conn = memory_connection().await;
        let repository = SettingsRepository::new(conn);
        repository.set("max_priority", "500").await.unwrap();

        let settings = repository.load().await.unwrap();
        assert_eq!(settings.max_priority, 500);
        assert_eq!(settings.chunk_fluctuation_percentage, 20);
    }

    #[tokio::test]
    async fn rejects_unknown_key() {
        let conn = memory_connection().await;
        let repository = SettingsRepository::new(conn);
        assert!(repository.set("not_a_real_key", "1").await.is_err());
    }
}
