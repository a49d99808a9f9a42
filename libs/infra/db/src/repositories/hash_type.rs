use crate::errors::DbError;
use krakenhashes_models::{HashType, PerformanceClass};
use libsql::{params, Connection};
use tracing::instrument;

/// Read access to the hash-type dictionary seeded by `bin/seed.rs`. The
/// hashlist processor consults `needs_processing` here before deciding
/// whether a raw line needs per-type normalization.
pub struct HashTypeRepository {
    connection: Connection,
}

impl HashTypeRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<HashType, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, needs_processing, is_salted, performance_class FROM hash_types WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::HashTypeNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<HashType>, DbError> {
        let mut rows = self
            .connection
            .query("SELECT id, name, needs_processing, is_salted, performance_class FROM hash_types ORDER BY id", ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}

fn performance_class_from_str(v: &str) -> Result<PerformanceClass, DbError> {
    match v {
        "fast" => Ok(PerformanceClass::Fast),
        "slow" => Ok(PerformanceClass::Slow),
        other => Err(DbError::MappingError(format!("unknown performance class: {other}"))),
    }
}

fn map_row(row: &libsql::Row) -> Result<HashType, DbError> {
    let needs_processing: i64 = row.get(2)?;
    let is_salted: i64 = row.get(3)?;
    let performance_class: String = row.get(4)?;
    Ok(HashType {
        id: row.get(0)?,
        name: row.get(1)?,
        needs_processing: needs_processing != 0,
        is_salted: is_salted != 0,
        performance_class: performance_class_from_str(&performance_class)?,
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
    async fn get_missing_hash_type_errors() {
        let repository = HashTypeRepository::new(memory_connection().await);
        assert!(matches!(repository.get(1000).await, Err(DbError::HashTypeNotFound)));
    }

    #[tokio::test]
    async fn get_returns_seeded_row() {
        let conn = memory_connection().await;
        conn.execute(
            "INSERT INTO hash_types (id, name, needs_processing, is_salted, performance_class) VALUES (1000, 'NTLM', 1, 0, 'fast')",
            (),
        )
        .await
        .unwrap();

        let hash_type = HashTypeRepository::new(conn).get(1000).await.unwrap();
        assert_eq!(hash_type.name, "NTLM");
        assert!(hash_type.needs_processing);
        assert_eq!(hash_type.performance_class, PerformanceClass::Fast);
    }
}
