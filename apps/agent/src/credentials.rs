//! Persists the API key issued at registration so the agent doesn't
//! need a fresh voucher on every restart.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub agent_id: i64,
    pub api_key: String,
}

pub async fn load(path: &Path) -> Option<StoredCredentials> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&contents).ok()
}

pub async fn save(path: &Path, credentials: &StoredCredentials) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_string_pretty(credentials).expect("credentials always serialize");
    tokio::fs::write(path, contents).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/agent.json");
        let credentials = StoredCredentials { agent_id: 7, api_key: "secret".to_string() };

        save(&path, &credentials).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded.agent_id, 7);
        assert_eq!(loaded.api_key, "secret");
    }

    #[tokio::test]
    async fn missing_file_returns_none() {
        assert!(load(Path::new("/nonexistent/agent.json")).await.is_none());
    }
}
