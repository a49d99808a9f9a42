use crate::errors::DbError;
use krakenhashes_models::{File, FileCategory, FileType, VerificationStatus};
use libsql::{params, Connection};
use tracing::instrument;

/// Registry of syncable artifacts (wordlists, rules, engine binaries),
/// keyed by `relative_path`. An upload landing at a path already in the
/// registry dedups against it: an identical hash is a no-op, a changed
/// hash updates the row in place. A hash matching some other file at a
/// different path is not deduped against it — identical content filed
/// under two names stays two rows, since jobs reference a path, not a hash.
pub struct FileRegistryRepository {
    connection: Connection,
}

impl FileRegistryRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, file))]
    pub async fn upsert_by_path(&self, file: &File) -> Result<i64, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, md5_hash FROM files WHERE relative_path = ?1",
                params![file.relative_path.clone()],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            let existing_hash: String = row.get(1)?;
            if existing_hash == file.md5_hash {
                return Ok(id);
            }
            self.connection
                .execute(
                    "UPDATE files SET name = ?1, md5_hash = ?2, size_bytes = ?3, file_type = ?4, category = ?5, \
                     verification_status = ?6, line_count = ?7, updated_at = ?8 WHERE id = ?9",
                    params![
                        file.name.clone(),
                        file.md5_hash.clone(),
                        file.size_bytes,
                        file_type_to_str(file.file_type),
                        category_to_str(file.category),
                        verification_to_str(file.verification_status),
                        file.line_count,
                        file.updated_at.to_rfc3339(),
                        id,
                    ],
                )
                .await?;
            return Ok(id);
        }

        self.connection
            .execute(
                "INSERT INTO files (name, relative_path, md5_hash, size_bytes, file_type, category, verification_status, line_count, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    file.name.clone(),
                    file.relative_path.clone(),
                    file.md5_hash.clone(),
                    file.size_bytes,
                    file_type_to_str(file.file_type),
                    category_to_str(file.category),
                    verification_to_str(file.verification_status),
                    file.line_count,
                    file.updated_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(self.connection.last_insert_rowid())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<File, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, relative_path, md5_hash, size_bytes, file_type, category, verification_status, line_count, updated_at \
                 FROM files WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::FileNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_by_type(&self, file_type: FileType) -> Result<Vec<File>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, name, relative_path, md5_hash, size_bytes, file_type, category, verification_status, line_count, updated_at \
                 FROM files WHERE file_type = ?1 ORDER BY name",
                params![file_type_to_str(file_type)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Used by the agent-sync protocol to tell a requesting agent whether
    /// its locally-cached copy is already current.
    #[instrument(skip(self))]
    pub async fn find_by_hash(&self, relative_path: &str, md5_hash: &str) -> Result<bool, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT 1 FROM files WHERE relative_path = ?1 AND md5_hash = ?2",
                params![relative_path, md5_hash],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    #[instrument(skip(self))]
    pub async fn mark_verification(&self, id: i64, status: VerificationStatus) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                "UPDATE files SET verification_status = ?1 WHERE id = ?2",
                params![verification_to_str(status), id],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::FileNotFound);
        }
        Ok(())
    }
}

fn file_type_to_str(t: FileType) -> &'static str {
    match t {
        FileType::Wordlist => "wordlist",
        FileType::Rule => "rule",
        FileType::Binary => "binary",
    }
}

fn file_type_from_str(v: &str) -> Result<FileType, DbError> {
    match v {
        "wordlist" => Ok(FileType::Wordlist),
        "rule" => Ok(FileType::Rule),
        "binary" => Ok(FileType::Binary),
        other => Err(DbError::MappingError(format!("unknown file type: {other}"))),
    }
}

fn category_to_str(c: FileCategory) -> &'static str {
    match c {
        FileCategory::General => "general",
        FileCategory::Specialized => "specialized",
        FileCategory::Targeted => "targeted",
        FileCategory::Custom => "custom",
    }
}

fn category_from_str(v: &str) -> Result<FileCategory, DbError> {
    match v {
        "general" => Ok(FileCategory::General),
        "specialized" => Ok(FileCategory::Specialized),
        "targeted" => Ok(FileCategory::Targeted),
        "custom" => Ok(FileCategory::Custom),
        other => Err(DbError::MappingError(format!("unknown file category: {other}"))),
    }
}

fn verification_to_str(v: VerificationStatus) -> &'static str {
    match v {
        VerificationStatus::Pending => "pending",
        VerificationStatus::Verified => "verified",
        VerificationStatus::Failed => "failed",
    }
}

fn verification_from_str(v: &str) -> Result<VerificationStatus, DbError> {
    match v {
        "pending" => Ok(VerificationStatus::Pending),
        "verified" => Ok(VerificationStatus::Verified),
        "failed" => Ok(VerificationStatus::Failed),
        other => Err(DbError::MappingError(format!("unknown verification status: {other}"))),
    }
}

fn map_row(row: &libsql::Row) -> Result<File, DbError> {
    let file_type: String = row.get(5)?;
    let category: String = row.get(6)?;
    let verification: String = row.get(7)?;
    let updated_at: String = row.get(9)?;
    Ok(File {
        id: row.get(0)?,
        name: row.get(1)?,
        relative_path: row.get(2)?,
        md5_hash: row.get(3)?,
        size_bytes: row.get(4)?,
        file_type: file_type_from_str(&file_type)?,
        category: category_from_str(&category)?,
        verification_status: verification_from_str(&verification)?,
        line_count: row.get(8)?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
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
    async fn upsert_by_path_updates_existing_row() {
        let conn = memory_connection().await;
        let repository = FileRegistryRepository::new(conn);
        let file = File {
            id: 0,
            name: "rockyou.txt".into(),
            relative_path: "wordlists/rockyou.txt".into(),
            md5_hash: "aaa".into(),
            size_bytes: 100,
            file_type: FileType::Wordlist,
            category: FileCategory::General,
            verification_status: VerificationStatus::Pending,
            line_count: None,
            updated_at: chrono::Utc::now(),
        };
        let id = repository.upsert_by_path(&file).await.unwrap();

        let mut updated = file.clone();
        updated.md5_hash = "bbb".into();
        updated.size_bytes = 200;
        let id2 = repository.upsert_by_path(&updated).await.unwrap();
        assert_eq!(id, id2);

        let loaded = repository.get(id).await.unwrap();
        assert_eq!(loaded.md5_hash, "bbb");
        assert_eq!(loaded.size_bytes, 200);
    }

    #[tokio::test]
    async fn upsert_by_path_is_a_no_op_for_an_unchanged_hash() {
        let conn = memory_connection().await;
        let repository = FileRegistryRepository::new(conn);
        let file = File {
            id: 0,
            name: "rockyou.txt".into(),
            relative_path: "wordlists/rockyou.txt".into(),
            md5_hash: "aaa".into(),
            size_bytes: 100,
            file_type: FileType::Wordlist,
            category: FileCategory::General,
            verification_status: VerificationStatus::Verified,
            line_count: Some(14_000_000),
            updated_at: chrono::Utc::now(),
        };
        let id = repository.upsert_by_path(&file).await.unwrap();

        let mut resubmitted = file.clone();
        resubmitted.verification_status = VerificationStatus::Pending;
        resubmitted.line_count = None;
        let id2 = repository.upsert_by_path(&resubmitted).await.unwrap();
        assert_eq!(id, id2);

        let loaded = repository.get(id).await.unwrap();
        assert_eq!(loaded.verification_status, VerificationStatus::Verified);
        assert_eq!(loaded.line_count, Some(14_000_000));
    }

    #[tokio::test]
    async fn same_hash_under_a_different_path_is_a_separate_record() {
        let conn = memory_connection().await;
        let repository = FileRegistryRepository::new(conn);
        let first = File {
            id: 0,
            name: "best64.rule".into(),
            relative_path: "rules/best64.rule".into(),
            md5_hash: "shared".into(),
            size_bytes: 500,
            file_type: FileType::Rule,
            category: FileCategory::General,
            verification_status: VerificationStatus::Pending,
            line_count: Some(64),
            updated_at: chrono::Utc::now(),
        };
        let mut second = first.clone();
        second.relative_path = "rules/best64-copy.rule".into();
        second.name = "best64-copy.rule".into();

        let first_id = repository.upsert_by_path(&first).await.unwrap();
        let second_id = repository.upsert_by_path(&second).await.unwrap();
        assert_ne!(first_id, second_id);
    }
}
