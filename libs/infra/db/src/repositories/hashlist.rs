use crate::errors::DbError;
use krakenhashes_models::{Client, Hashlist, HashlistStatus};
use libsql::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

pub struct HashlistRepository {
    connection: Connection,
}

impl HashlistRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, hashlist: &Hashlist) -> Result<i64, DbError> {
        self.connection
            .execute(
                "INSERT INTO hashlists (user_id, client_id, hash_type_id, status, total_hashes, cracked_hashes, exclude_from_potfile, file_path, error_message, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    hashlist.user_id,
                    hashlist.client_id.map(|id| id.to_string()),
                    hashlist.hash_type_id,
                    status_to_str(hashlist.status),
                    hashlist.total_hashes,
                    hashlist.cracked_hashes,
                    hashlist.exclude_from_potfile as i64,
                    hashlist.file_path.clone(),
                    hashlist.error_message.clone(),
                    hashlist.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Hashlist, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, user_id, client_id, hash_type_id, status, total_hashes, cracked_hashes, \
                 exclude_from_potfile, file_path, error_message, created_at FROM hashlists WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::HashlistNotFound),
        }
    }

    /// Moves a hashlist from `uploading` to `processing`, the transition
    /// the hashlist processor performs once the upload stream closes.
    #[instrument(skip(self))]
    pub async fn mark_processing(&self, id: i64) -> Result<(), DbError> {
        self.set_status(id, HashlistStatus::Processing).await
    }

    /// Records final processing counts and the status implied by them
    /// (`ready`, `ready_with_errors`, or `error`), and rewrites
    /// `file_path` to the generated `<id>.hash` file.
    #[instrument(skip(self))]
    pub async fn finish_processing(
        &self,
        id: i64,
        total_hashes: i64,
        status: HashlistStatus,
        generated_file_path: &str,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        self.connection
            .execute(
                "UPDATE hashlists SET total_hashes = ?1, status = ?2, file_path = ?3, error_message = ?4 WHERE id = ?5",
                params![total_hashes, status_to_str(status), generated_file_path, error_message, id],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: i64, status: HashlistStatus) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute("UPDATE hashlists SET status = ?1 WHERE id = ?2", params![status_to_str(status), id])
            .await?;
        if affected == 0 {
            return Err(DbError::HashlistNotFound);
        }
        Ok(())
    }

    /// Increments the cracked-count tally; called once per newly-cracked
    /// hash as crack events stream in from agents.
    #[instrument(skip(self))]
    pub async fn increment_cracked(&self, id: i64, by: i64) -> Result<(), DbError> {
        self.connection
            .execute("UPDATE hashlists SET cracked_hashes = cracked_hashes + ?1 WHERE id = ?2", params![by, id])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Hashlist>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, user_id, client_id, hash_type_id, status, total_hashes, cracked_hashes, \
                 exclude_from_potfile, file_path, error_message, created_at FROM hashlists WHERE user_id = ?1 ORDER BY id DESC",
                params![user_id],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}

pub struct ClientRepository {
    connection: Connection,
}

impl ClientRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, client: &Client) -> Result<(), DbError> {
        self.connection
            .execute(
                "INSERT INTO clients (id, name, data_retention_months) VALUES (?1, ?2, ?3)",
                params![client.id.to_string(), client.name.clone(), client.data_retention_months],
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE") {
                    DbError::DuplicateName(client.name.clone())
                } else {
                    DbError::QueryError(e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Client, DbError> {
        let mut rows = self
            .connection
            .query("SELECT id, name, data_retention_months FROM clients WHERE id = ?1", params![id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Client {
                id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| DbError::MappingError(e.to_string()))?,
                name: row.get(1)?,
                data_retention_months: row.get(2)?,
            }),
            None => Err(DbError::ClientNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Client>, DbError> {
        let mut rows = self.connection.query("SELECT id, name, data_retention_months FROM clients ORDER BY name", ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Client {
                id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| DbError::MappingError(e.to_string()))?,
                name: row.get(1)?,
                data_retention_months: row.get(2)?,
            });
        }
        Ok(out)
    }
}

fn status_to_str(status: HashlistStatus) -> &'static str {
    match status {
        HashlistStatus::Uploading => "uploading",
        HashlistStatus::Processing => "processing",
        HashlistStatus::Ready => "ready",
        HashlistStatus::ReadyWithErrors => "ready_with_errors",
        HashlistStatus::Error => "error",
    }
}

fn status_from_str(value: &str) -> Result<HashlistStatus, DbError> {
    match value {
        "uploading" => Ok(HashlistStatus::Uploading),
        "processing" => Ok(HashlistStatus::Processing),
        "ready" => Ok(HashlistStatus::Ready),
        "ready_with_errors" => Ok(HashlistStatus::ReadyWithErrors),
        "error" => Ok(HashlistStatus::Error),
        other => Err(DbError::MappingError(format!("unknown hashlist status: {other}"))),
    }
}

fn map_row(row: &libsql::Row) -> Result<Hashlist, DbError> {
    let client_id: Option<String> = row.get(2)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(10)?;
    Ok(Hashlist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        client_id: client_id.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| DbError::MappingError(e.to_string()))?,
        hash_type_id: row.get(3)?,
        status: status_from_str(&status)?,
        total_hashes: row.get(5)?,
        cracked_hashes: row.get(6)?,
        exclude_from_potfile: row.get::<i64>(7)? != 0,
        file_path: row.get(8)?,
        error_message: row.get(9)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
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
    async fn create_and_transition_status() {
        let conn = memory_connection().await;
        let repository = HashlistRepository::new(conn);
        let id = repository
            .create(&Hashlist::new_uploading(0, 1, 1000, "/data/uploads/pending.txt".into()))
            .await
            .unwrap();

        repository.mark_processing(id).await.unwrap();
        let loaded = repository.get(id).await.unwrap();
        assert_eq!(loaded.status, HashlistStatus::Processing);

        repository
            .finish_processing(id, 42, HashlistStatus::Ready, "/data/hashlists/1.hash", None)
            .await
            .unwrap();
        let loaded = repository.get(id).await.unwrap();
        assert_eq!(loaded.status, HashlistStatus::Ready);
        assert_eq!(loaded.total_hashes, 42);
        assert_eq!(loaded.file_path, "/data/hashlists/1.hash");
    }
}
