use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Wordlist,
    Rule,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    General,
    Specialized,
    Targeted,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

/// A syncable artifact (wordlist, rule file, or engine binary archive)
/// registered from the filesystem watcher or an admin upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub relative_path: String,
    pub md5_hash: String,
    pub size_bytes: i64,
    pub file_type: FileType,
    pub category: FileCategory,
    pub verification_status: VerificationStatus,
    /// Word or rule count, populated for wordlists/rules when counted.
    pub line_count: Option<i64>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
