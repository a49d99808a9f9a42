use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashlistStatus {
    Uploading,
    Processing,
    Ready,
    ReadyWithErrors,
    Error,
}

/// A user-uploaded set of hashes of a single type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashlist {
    pub id: i64,
    pub user_id: i64,
    pub client_id: Option<Uuid>,
    pub hash_type_id: i32,
    pub status: HashlistStatus,
    pub total_hashes: i64,
    pub cracked_hashes: i64,
    pub exclude_from_potfile: bool,
    /// Initially the uploaded file; rewritten once to the generated
    /// `<id>.hash` file after processing.
    pub file_path: String,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Hashlist {
    pub fn new_uploading(id: i64, user_id: i64, hash_type_id: i32, file_path: String) -> Self {
        Self {
            id,
            user_id,
            client_id: None,
            hash_type_id,
            status: HashlistStatus::Uploading,
            total_hashes: 0,
            cracked_hashes: 0,
            exclude_from_potfile: false,
            file_path,
            error_message: None,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Association row between a hashlist and a hash row. Duplicate values
/// within a single upload produce multiple associations to the same
/// hash id, one per occurrence in the source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashlistHash {
    pub hashlist_id: i64,
    pub hash_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    /// `None` means "inherit the system default retention".
    pub data_retention_months: Option<i32>,
}

impl Client {
    /// Effective retention in months, given the system default.
    pub fn effective_retention_months(&self, system_default: Option<i32>) -> Option<i32> {
        self.data_retention_months.or(system_default)
    }
}
