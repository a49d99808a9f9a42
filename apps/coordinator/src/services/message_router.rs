use crate::state::AppState;
use krakenhashes_db::{AgentRepository, HashStoreRepository, HashlistRepository};
use krakenhashes_models::{message::benchmark_from_result, ControlMessage, MessagePayload, RealTimeEvent, TaskStatus};
use tracing::{info, instrument, warn};

/// Interprets one inbound `ControlMessage` from a connected agent and
/// applies its effect to the database, the event bus, and the scheduler.
#[instrument(skip(state, message), fields(agent_id))]
pub async fn route_message(state: &AppState, agent_id: i64, message: ControlMessage) -> anyhow::Result<()> {
    match message.payload {
        MessagePayload::HardwareReport { devices, agent_version } => {
            handle_hardware_report(state, agent_id, devices, agent_version).await
        }
        MessagePayload::TaskProgress { task_id, progress_percent, hashes_per_second, status, .. } => {
            handle_task_progress(state, agent_id, task_id, progress_percent, hashes_per_second, status).await
        }
        MessagePayload::CrackFound { cracks } => handle_crack_found(state, agent_id, cracks).await,
        MessagePayload::BenchmarkResult { attack_mode, hash_type_id, hashes_per_second } => {
            let connection = state.database.get_connection()?;
            let benchmark = benchmark_from_result(agent_id, attack_mode, hash_type_id, hashes_per_second);
            AgentRepository::new(connection).record_benchmark(&benchmark).await?;
            Ok(())
        }
        MessagePayload::BenchmarkFailed { attack_mode, hash_type_id, error } => {
            warn!("agent {agent_id} benchmark failed for {attack_mode:?}/{hash_type_id}: {error}");
            Ok(())
        }
        MessagePayload::FileSyncResponse { files } => {
            info!("agent {agent_id} reports {} local files", files.len());
            crate::services::file_sync::reconcile(state, agent_id, files).await
        }
        MessagePayload::FileSyncStatus { name, bytes_downloaded, total_bytes, complete, error } => {
            if let Some(error) = error {
                warn!("agent {agent_id} failed syncing {name}: {error}");
            } else if complete {
                info!("agent {agent_id} finished syncing {name} ({total_bytes} bytes)");
            } else {
                info!("agent {agent_id} syncing {name}: {bytes_downloaded}/{total_bytes}");
            }
            Ok(())
        }
        other => {
            warn!("agent {agent_id} sent a coordinator-bound message it should never originate: {other:?}");
            Ok(())
        }
    }
}

async fn handle_hardware_report(
    state: &AppState,
    agent_id: i64,
    devices: Vec<krakenhashes_models::AgentDevice>,
    agent_version: String,
) -> anyhow::Result<()> {
    let connection = state.database.get_connection()?;
    let hardware_json = serde_json::to_string(&devices)?;
    AgentRepository::new(connection).record_heartbeat(agent_id, &hardware_json).await?;
    info!("agent {agent_id} reported hardware (version {agent_version})");
    state.notify_scheduler(agent_id).await;
    Ok(())
}

async fn handle_task_progress(
    state: &AppState,
    agent_id: i64,
    task_id: i64,
    progress_percent: f32,
    hashes_per_second: i64,
    status: TaskStatus,
) -> anyhow::Result<()> {
    let connection = state.database.get_connection()?;
    let job = krakenhashes_db::JobRepository::new(connection);
    job.update_task_progress(task_id, progress_percent, hashes_per_second).await?;

    match status {
        TaskStatus::Completed => {
            job.complete_task(task_id).await?;
            state.event_bus.publish(RealTimeEvent::TaskCompleted { task_id });
            state.notify_scheduler(agent_id).await;
        }
        TaskStatus::Failed => {
            job.fail_task(task_id, "agent reported task failure").await?;
            state.event_bus.publish(RealTimeEvent::TaskInterrupted { task_id, reason: "engine failure".into() });
            state.notify_scheduler(agent_id).await;
        }
        TaskStatus::InProgress | TaskStatus::Pending => {
            state.event_bus.publish(RealTimeEvent::TaskProgress { task_id, progress_percent });
        }
    }
    Ok(())
}

async fn handle_crack_found(
    state: &AppState,
    agent_id: i64,
    cracks: Vec<krakenhashes_models::message::CrackedPair>,
) -> anyhow::Result<()> {
    let Some(hash_type_id) = state.agents.current_hash_type(agent_id).await else {
        warn!("agent {agent_id} reported cracks with no known active hash type, dropping the report");
        return Ok(());
    };

    let connection = state.database.get_connection()?;
    let hash_store = HashStoreRepository::new(connection);
    let values: Vec<String> = cracks.iter().map(|c| c.hash_value.clone()).collect();
    let mut hashes = hash_store.lookup_by_values(hash_type_id, &values).await?;

    let mut newly_cracked_ids = Vec::new();
    for crack in &cracks {
        if let Some(hash) = hashes.iter_mut().find(|h| h.hash_value == crack.hash_value) {
            if hash.apply_crack(&crack.plaintext) {
                newly_cracked_ids.push(hash.id);
            }
        }
    }
    hash_store.update_batch(&hashes).await?;

    let counts = hash_store.cracked_counts_by_hashlist(&newly_cracked_ids).await?;
    if !counts.is_empty() {
        let connection = state.database.get_connection()?;
        let hashlists = HashlistRepository::new(connection);
        for (hashlist_id, count) in counts {
            hashlists.increment_cracked(hashlist_id, count).await?;
        }
    }

    for crack in &cracks {
        state.event_bus.publish(RealTimeEvent::CrackFound { hash_value: crack.hash_value.clone() });
    }
    info!("agent {agent_id} reported {} cracks, {} new", cracks.len(), newly_cracked_ids.len());
    Ok(())
}
