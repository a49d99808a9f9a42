use crate::errors::DbError;
use krakenhashes_models::Hash;
use libsql::{params, Connection};
use tracing::instrument;

/// The globally deduplicated hash store: `lookup_by_values` /
/// `create_batch` / `update_batch` / `add_associations_batch` / `search` /
/// `uncracked_values_for_hashlist`.
pub struct HashStoreRepository {
    connection: Connection,
}

impl HashStoreRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Batch point-lookup by normalized `hash_value`, scoped to a hash
    /// type since the logical key is `(hash_value, hash_type_id)`.
    #[instrument(skip(self, values))]
    pub async fn lookup_by_values(&self, hash_type_id: i32, values: &[String]) -> Result<Vec<Hash>, DbError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, hash_value, original_hash, hash_type_id, username, domain, is_cracked, password, last_updated \
             FROM hashes WHERE hash_type_id = ? AND hash_value IN ({placeholders})"
        );
        let mut query_params: Vec<libsql::Value> = vec![hash_type_id.into()];
        query_params.extend(values.iter().map(|v| libsql::Value::from(v.as_str())));

        let mut rows = self.connection.query(&sql, query_params).await?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            result.push(map_row_to_hash(&row)?);
        }
        Ok(result)
    }

    /// Inserts pre-assigned-id hashes atomically in one batch, so the
    /// write is idempotent under retry.
    #[instrument(skip(self, hashes))]
    pub async fn create_batch(&self, hashes: &[Hash]) -> Result<(), DbError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let tx = self.connection.transaction().await?;
        for hash in hashes {
            tx.execute(
                "INSERT INTO hashes (id, hash_value, original_hash, hash_type_id, username, domain, is_cracked, password, last_updated) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    hash.id.to_string(),
                    hash.hash_value.clone(),
                    hash.original_hash.clone(),
                    hash.hash_type_id,
                    hash.username.clone(),
                    hash.domain.clone(),
                    hash.is_cracked as i64,
                    hash.password.clone(),
                    hash.last_updated.to_rfc3339(),
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Applies monotonic updates (cracked-flip, username fill-in). Never
    /// un-cracks: the SQL guards on `is_cracked = 0` for the crack flip.
    #[instrument(skip(self, hashes))]
    pub async fn update_batch(&self, hashes: &[Hash]) -> Result<(), DbError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let tx = self.connection.transaction().await?;
        for hash in hashes {
            tx.execute(
                "UPDATE hashes SET \
                    is_cracked = CASE WHEN is_cracked = 1 THEN 1 ELSE ?1 END, \
                    password = CASE WHEN is_cracked = 1 THEN password ELSE ?2 END, \
                    username = COALESCE(username, ?3), \
                    domain = COALESCE(domain, ?4), \
                    last_updated = ?5 \
                 WHERE id = ?6",
                params![
                    hash.is_cracked as i64,
                    hash.password.clone(),
                    hash.username.clone(),
                    hash.domain.clone(),
                    hash.last_updated.to_rfc3339(),
                    hash.id.to_string(),
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Inserts hashlist<->hash association rows; duplicates of
    /// `(hashlist_id, hash_id)` are permitted, they count repeated
    /// occurrences of a value in the input.
    #[instrument(skip(self, links))]
    pub async fn add_associations_batch(&self, links: &[(i64, uuid::Uuid)]) -> Result<(), DbError> {
        if links.is_empty() {
            return Ok(());
        }
        let tx = self.connection.transaction().await?;
        for (hashlist_id, hash_id) in links {
            tx.execute(
                "INSERT INTO hashlist_hashes (hashlist_id, hash_id) VALUES (?1, ?2)",
                params![*hashlist_id, hash_id.to_string()],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Reverse lookup: for each value, which of the caller's hashlists
    /// reference it and its crack state.
    #[instrument(skip(self, values))]
    pub async fn search(&self, user_id: i64, values: &[String]) -> Result<Vec<(i64, Hash)>, DbError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT hl.id, h.id, h.hash_value, h.original_hash, h.hash_type_id, h.username, h.domain, h.is_cracked, h.password, h.last_updated \
             FROM hashes h \
             JOIN hashlist_hashes hh ON hh.hash_id = h.id \
             JOIN hashlists hl ON hl.id = hh.hashlist_id AND hl.user_id = ?1 \
             WHERE h.hash_value IN ({placeholders})"
        );
        let mut query_params: Vec<libsql::Value> = vec![user_id.into()];
        query_params.extend(values.iter().map(|v| libsql::Value::from(v.as_str())));

        let mut rows = self.connection.query(&sql, query_params).await?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            let hashlist_id: i64 = row.get(0)?;
            let hash = map_row_to_hash_offset(&row, 1)?;
            result.push((hashlist_id, hash));
        }
        Ok(result)
    }

    /// For a set of hash ids that just got cracked, how many of each
    /// belong to each hashlist that references them — used to keep
    /// `hashlists.cracked_hashes` in sync as cracks stream in, counting
    /// each distinct hash once per hashlist regardless of how many
    /// duplicate-value lines it occurred on.
    #[instrument(skip(self, hash_ids))]
    pub async fn cracked_counts_by_hashlist(&self, hash_ids: &[uuid::Uuid]) -> Result<Vec<(i64, i64)>, DbError> {
        if hash_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = hash_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT hashlist_id, COUNT(DISTINCT hash_id) FROM hashlist_hashes \
             WHERE hash_id IN ({placeholders}) GROUP BY hashlist_id"
        );
        let query_params: Vec<libsql::Value> = hash_ids.iter().map(|id| libsql::Value::from(id.to_string())).collect();
        let mut rows = self.connection.query(&sql, query_params).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get(0)?, row.get(1)?));
        }
        Ok(out)
    }

    /// Streaming iterator of values still needing work, used to generate
    /// the agent-facing `<id>.hash` file.
    #[instrument(skip(self))]
    pub async fn uncracked_values_for_hashlist(&self, hashlist_id: i64) -> Result<Vec<String>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT DISTINCT h.hash_value FROM hashes h \
                 JOIN hashlist_hashes hh ON hh.hash_id = h.id \
                 WHERE hh.hashlist_id = ?1 AND h.is_cracked = 0",
                params![hashlist_id],
            )
            .await?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().await? {
            values.push(row.get::<String>(0)?);
        }
        Ok(values)
    }
}

fn map_row_to_hash(row: &libsql::Row) -> Result<Hash, DbError> {
    map_row_to_hash_offset(row, 0)
}

fn map_row_to_hash_offset(row: &libsql::Row, offset: i32) -> Result<Hash, DbError> {
    let id_text: String = row.get(offset)?;
    let is_cracked: i64 = row.get(offset + 6)?;
    let last_updated_text: String = row.get(offset + 8)?;
    Ok(Hash {
        id: uuid::Uuid::parse_str(&id_text).map_err(|e| DbError::MappingError(e.to_string()))?,
        hash_value: row.get(offset + 1)?,
        original_hash: row.get(offset + 2)?,
        hash_type_id: row.get(offset + 3)?,
        username: row.get(offset + 4)?,
        domain: row.get(offset + 5)?,
        is_cracked: is_cracked != 0,
        password: row.get(offset + 7)?,
        last_updated: chrono::DateTime::parse_from_rfc3339(&last_updated_text)
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
    async fn create_then_lookup_round_trips() {
        let conn = memory_connection().await;
        let repository = HashStoreRepository::new(conn);
        let hash = Hash::new_uncracked(
            uuid::Uuid::new_v4(),
            "8846f7eaee8fb117ad06bdd830b7586c".into(),
            "bob:1002:aad3:8846f7eaee8fb117ad06bdd830b7586c:::".into(),
            1000,
            Some("bob".into()),
            None,
        );
        repository.create_batch(&[hash.clone()]).await.unwrap();

        let found = repository
            .lookup_by_values(1000, &["8846f7eaee8fb117ad06bdd830b7586c".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn update_batch_never_uncracks() {
        let conn = memory_connection().await;
        let repository = HashStoreRepository::new(conn);
        let mut hash = Hash::new_uncracked(
            uuid::Uuid::new_v4(),
            "5f4dcc3b5aa765d61d8327deb882cf99".into(),
            "5f4dcc3b5aa765d61d8327deb882cf99:password".into(),
            0,
            None,
            None,
        );
        repository.create_batch(&[hash.clone()]).await.unwrap();
        hash.apply_crack("password");
        repository.update_batch(&[hash.clone()]).await.unwrap();

        // A later "un-crack" attempt (is_cracked=false) must not revert the row.
        let mut stale = hash.clone();
        stale.is_cracked = false;
        stale.password = None;
        repository.update_batch(&[stale]).await.unwrap();

        let found = repository
            .lookup_by_values(0, &["5f4dcc3b5aa765d61d8327deb882cf99".into()])
            .await
            .unwrap();
        assert!(found[0].is_cracked);
        assert_eq!(found[0].password.as_deref(), Some("password"));
    }
}
