use crate::state::{AppState, SchedulerSignal};
use krakenhashes_db::repositories::job::chunk_math::{compute_chunk_length, ChunkSizingInput};
use krakenhashes_db::{AgentRepository, DbError, FileRegistryRepository, HashlistRepository, JobRepository, PresetJobRepository};
use krakenhashes_models::{AgentStatus, ControlMessage, Hashlist, MessagePayload, PresetJob, RealTimeEvent};
use libsql::Connection;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, instrument, warn};

const STATUS_INTERVAL_SECONDS: u32 = 5;
/// Idle agents are re-offered work on this cadence even without a fresh
/// `AgentIdle` signal, so work queued after an agent went idle still reaches it.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Dispatch daemon: reacts to `SchedulerSignal::AgentIdle` by trying to
/// hand the named agent the next runnable chunk, and sweeps every
/// connected agent on a fixed interval as a backstop.
pub fn spawn_scheduler(state: AppState, mut signals: mpsc::UnboundedReceiver<SchedulerSignal>) {
    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                signal = signals.recv() => {
                    match signal {
                        Some(SchedulerSignal::AgentIdle(agent_id)) => dispatch_to_agent(&state, agent_id).await,
                        None => break,
                    }
                }
                _ = sweep.tick() => {
                    for agent_id in state.agents.connected_agent_ids().await {
                        dispatch_to_agent(&state, agent_id).await;
                    }
                }
            }
        }
    });
}

#[instrument(skip(state))]
async fn dispatch_to_agent(state: &AppState, agent_id: i64) {
    if let Err(e) = try_dispatch(state, agent_id).await {
        warn!("scheduler pass for agent {agent_id} did not assign work: {e}");
    }
}

async fn try_dispatch(state: &AppState, agent_id: i64) -> Result<(), DbError> {
    let connection = state.database.get_connection()?;

    let agent = AgentRepository::new(connection.clone()).get(agent_id).await?;
    if agent.status != AgentStatus::Active {
        return Ok(());
    }

    let Some(execution) = JobRepository::new(connection.clone()).next_runnable_execution().await? else {
        return Ok(());
    };

    let preset = PresetJobRepository::new(connection.clone()).get(execution.preset_job_id).await?;
    let hashlist = HashlistRepository::new(connection.clone()).get(execution.hashlist_id).await?;

    let settings = state.settings.read().await.clone();
    let cache_duration = chrono::Duration::hours(settings.benchmark_cache_duration_hours);
    let benchmark = AgentRepository::new(connection.clone())
        .find_benchmark(agent_id, preset.attack_mode, hashlist.hash_type_id)
        .await?
        .filter(|b| b.is_valid(chrono::Utc::now(), cache_duration));

    let Some(benchmark) = benchmark else {
        request_benchmark(state, &connection, agent_id, &preset, &hashlist, settings.speedtest_timeout_seconds).await?;
        return Ok(());
    };
    let agent_speed = benchmark.hashes_per_second;

    let fluctuation_percentage = settings.chunk_fluctuation_percentage;
    let chunk_length = compute_chunk_length(&ChunkSizingInput {
        agent_speed,
        target_duration_seconds: preset.chunk_duration_seconds,
        remaining_keyspace: execution.remaining_keyspace(),
        fluctuation_percentage,
        attack_mode: preset.attack_mode,
    });
    if chunk_length == 0 {
        return Ok(());
    }

    let task = JobRepository::new(connection.clone())
        .allocate_chunk(execution.id, agent_id, chunk_length)
        .await?;

    let file_registry = FileRegistryRepository::new(connection);
    let binary_path = file_registry.get(preset.binary_id).await?.relative_path;
    let mut wordlist_paths = Vec::with_capacity(preset.wordlist_ids.len());
    for id in &preset.wordlist_ids {
        wordlist_paths.push(file_registry.get(*id).await?.relative_path);
    }
    let mut rule_paths = Vec::with_capacity(preset.rule_ids.len());
    for id in &preset.rule_ids {
        rule_paths.push(file_registry.get(*id).await?.relative_path);
    }

    let assignment = MessagePayload::TaskAssignment {
        task_id: task.id,
        job_execution_id: execution.id,
        attack_mode: preset.attack_mode,
        hash_type_id: hashlist.hash_type_id,
        binary_path,
        wordlist_paths,
        rule_paths,
        mask: preset.mask.clone(),
        hashlist_path: hashlist.file_path,
        chunk_start: task.chunk_start,
        chunk_length: task.chunk_length,
        status_interval_seconds: STATUS_INTERVAL_SECONDS,
    };

    state.agents.set_current_hash_type(agent_id, hashlist.hash_type_id).await;
    if !state.agents.send_to(agent_id, ControlMessage::new(assignment)).await {
        error!("agent {agent_id} accepted a task claim but is no longer connected; it will be reclaimed by the reaper");
        return Ok(());
    }

    state.event_bus.publish(RealTimeEvent::TaskAssigned { task_id: task.id, agent_id });
    Ok(())
}

/// No fresh benchmark for this (agent, attack_mode, hash_type) triple: ask
/// the agent to measure one instead of assigning work against a guessed
/// speed. The scheduler's next sweep will pick the agent back up once the
/// `BenchmarkResult` lands.
async fn request_benchmark(
    state: &AppState,
    connection: &Connection,
    agent_id: i64,
    preset: &PresetJob,
    hashlist: &Hashlist,
    test_duration_seconds: i64,
) -> Result<(), DbError> {
    let file_registry = FileRegistryRepository::new(connection.clone());
    let binary_path = file_registry.get(preset.binary_id).await?.relative_path;
    let mut wordlist_paths = Vec::with_capacity(preset.wordlist_ids.len());
    for id in &preset.wordlist_ids {
        wordlist_paths.push(file_registry.get(*id).await?.relative_path);
    }
    let mut rule_paths = Vec::with_capacity(preset.rule_ids.len());
    for id in &preset.rule_ids {
        rule_paths.push(file_registry.get(*id).await?.relative_path);
    }

    let request = MessagePayload::BenchmarkRequest {
        attack_mode: preset.attack_mode,
        hash_type_id: hashlist.hash_type_id,
        binary_path,
        wordlist_paths,
        rule_paths,
        mask: preset.mask.clone(),
        test_duration_seconds: test_duration_seconds.max(1) as u32,
    };

    if !state.agents.send_to(agent_id, ControlMessage::new(request)).await {
        warn!("agent {agent_id} went idle but disconnected before its benchmark request went out");
    }
    Ok(())
}
