use crate::state::AppState;
use krakenhashes_db::FileRegistryRepository;
use krakenhashes_models::{ControlMessage, FileType, LocalFileEntry, MessagePayload, RemoteFileTarget};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument};

const SYNC_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const SYNCED_TYPES: [FileType; 3] = [FileType::Wordlist, FileType::Rule, FileType::Binary];

/// Background daemon mirroring `spawn_reaper`'s shape: on the same 6-hour
/// cadence the agent side caches benchmarks for, nudges every connected
/// agent to report what it already has so drift gets caught even when no
/// agent ever reconnects.
pub fn spawn_file_sync_daemon(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(SYNC_INTERVAL);
        loop {
            ticker.tick().await;
            for agent_id in state.agents.connected_agent_ids().await {
                request_sync(&state, agent_id).await;
            }
        }
    });
}

/// Asks a single agent to report the wordlists/rules/binaries it already
/// has locally. Called both from the periodic sweep and right after an
/// agent's control channel comes up.
#[instrument(skip(state))]
pub async fn request_sync(state: &AppState, agent_id: i64) {
    let types = SYNCED_TYPES.iter().map(file_type_wire).map(str::to_string).collect();
    state.agents.send_to(agent_id, ControlMessage::new(MessagePayload::FileSyncRequest { types })).await;
}

/// Diffs an agent's reported local files against the registry and pushes
/// down whatever it's missing or has a stale copy of.
#[instrument(skip(state, reported))]
pub async fn reconcile(state: &AppState, agent_id: i64, reported: Vec<LocalFileEntry>) -> anyhow::Result<()> {
    let connection = state.database.get_connection()?;
    let file_registry = FileRegistryRepository::new(connection);

    let current: HashSet<(String, String)> =
        reported.into_iter().map(|f| (f.name, f.md5_hash)).collect();

    let mut missing = Vec::new();
    for file_type in SYNCED_TYPES {
        for file in file_registry.list_by_type(file_type).await? {
            if !current.contains(&(file.name.clone(), file.md5_hash.clone())) {
                missing.push(RemoteFileTarget {
                    file_id: file.id,
                    name: file.name,
                    file_type: file_type_wire(&file_type).to_string(),
                    download_url: format!("/api/v1/files/download/{}", file.relative_path),
                    md5_hash: file.md5_hash,
                });
            }
        }
    }

    if missing.is_empty() {
        info!("agent {agent_id} is already current on every synced file");
        return Ok(());
    }

    info!("agent {agent_id} is missing {} file(s), pushing a sync command", missing.len());
    state
        .agents
        .send_to(agent_id, ControlMessage::new(MessagePayload::FileSyncCommand { files: missing }))
        .await;
    Ok(())
}

fn file_type_wire(t: &FileType) -> &'static str {
    match t {
        FileType::Wordlist => "wordlist",
        FileType::Rule => "rule",
        FileType::Binary => "binary",
    }
}
