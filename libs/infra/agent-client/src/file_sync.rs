use crate::errors::AgentClientError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};

/// One file the coordinator has told this agent it needs, with the
/// hash the agent's local copy must match to be considered current.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub relative_path: String,
    pub md5_hash: String,
    pub size_bytes: u64,
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Downloads the files directory from the coordinator in parallel,
/// verifying content hashes and skipping files whose local copy
/// already matches.
pub struct FileSyncClient {
    http: Client,
    base_url: String,
    local_root: PathBuf,
}

impl FileSyncClient {
    pub fn new(base_url: String, local_root: PathBuf) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(600))
                .build()
                .expect("failed to build the file sync HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            local_root,
        }
    }

    /// Syncs every target concurrently; one target's exhausted retries
    /// does not stop the others, but the overall result is an error if
    /// any target could not be synced.
    #[instrument(skip(self, targets))]
    pub async fn sync_all(&self, targets: &[SyncTarget]) -> Result<(), AgentClientError> {
        let downloads = targets.iter().map(|target| self.sync_one(target));
        let results = futures::future::join_all(downloads).await;

        let failures: Vec<String> = results
            .into_iter()
            .zip(targets.iter())
            .filter_map(|(result, target)| result.err().map(|_| target.relative_path.clone()))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentClientError::SyncExhausted { path: failures.join(", ") })
        }
    }

    #[instrument(skip(self, target))]
    async fn sync_one(&self, target: &SyncTarget) -> Result<(), AgentClientError> {
        let local_path = self.local_root.join(&target.relative_path);

        if let Some(existing_hash) = hash_file_if_present(&local_path).await? {
            if existing_hash == target.md5_hash {
                return Ok(());
            }
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.download_once(target, &local_path).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("sync attempt {} for {} failed: {e}", attempt + 1, target.relative_path);
                    last_error = Some(e);
                    tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt)).await;
                }
            }
        }

        Err(last_error.unwrap_or(AgentClientError::SyncExhausted { path: target.relative_path.clone() }))
    }

    /// Fetches whichever of the listed coordinator-relative paths this
    /// agent does not already have on disk, without a hash to verify
    /// against. Used to gate running a task assignment on the files it
    /// references actually being present, independent of the periodic
    /// `FileSyncCommand` push which carries the hashes.
    #[instrument(skip(self, relative_paths))]
    pub async fn ensure_present(&self, relative_paths: &[String]) -> Result<(), AgentClientError> {
        for path in relative_paths {
            let local_path = self.local_root.join(path);
            if fs::try_exists(&local_path).await.unwrap_or(false) {
                continue;
            }
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let url = format!("{}/api/v1/files/download/{}", self.base_url, path);
            let response = self.http.get(&url).send().await?;
            let bytes = response.bytes().await?;
            let tmp_path = local_path.with_extension("part");
            fs::write(&tmp_path, &bytes).await?;
            fs::rename(&tmp_path, &local_path).await?;
            info!("fetched {path} ({} bytes) ahead of a task assignment", bytes.len());
        }
        Ok(())
    }

    async fn download_once(&self, target: &SyncTarget, local_path: &Path) -> Result<(), AgentClientError> {
        let url = format!("{}/api/v1/files/download/{}", self.base_url, target.relative_path);
        let response = self.http.get(&url).send().await?;
        let bytes = response.bytes().await?;

        let actual_hash = format!("{:x}", md5::compute(&bytes));
        if actual_hash != target.md5_hash {
            return Err(AgentClientError::HashMismatch {
                path: target.relative_path.clone(),
                expected: target.md5_hash.clone(),
                actual: actual_hash,
            });
        }

        let tmp_path = local_path.with_extension("part");
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, local_path).await?;
        info!("synced {} ({} bytes)", target.relative_path, bytes.len());
        Ok(())
    }
}

async fn hash_file_if_present(path: &Path) -> Result<Option<String>, AgentClientError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(format!("{:x}", md5::compute(&bytes)))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn already_current_file_is_skipped_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"rockyou-sample";
        let path = dir.path().join("wordlists/sample.txt");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, content).await.unwrap();

        let expected_hash = format!("{:x}", md5::compute(content));
        let hash = hash_file_if_present(&path).await.unwrap();
        assert_eq!(hash, Some(expected_hash));
    }
}
