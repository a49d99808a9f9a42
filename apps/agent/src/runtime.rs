//! Orchestrates the agent's lifecycle: register (or reuse a persisted
//! API key), open the control channel, report hardware, and dispatch
//! whatever the coordinator sends down the wire.
//!
//! The engine runs a chunk on a background task so `task_stop` stays
//! responsive while it's working; the task reports back over an
//! internal channel that the control-channel loop forwards upstream,
//! the same split the control socket itself uses on the coordinator side.

use crate::config::AgentConfig;
use crate::credentials::{self, StoredCredentials};
use crate::engine::{self, ChunkAssignment, EngineProgress};
use crate::hardware;
use krakenhashes_agent_client::{ControlChannel, CoordinatorClient, FileSyncClient, RegistrationRequest, SyncTarget};
use krakenhashes_models::{ControlMessage, CrackedPair, LocalFileEntry, MessagePayload, RemoteFileTarget, TaskStatus};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the background chunk task reports back to the control loop.
enum ChunkEvent {
    Progress(EngineProgress),
    Done(Result<Vec<CrackedPair>, String>),
}

struct RunningChunk {
    task_id: i64,
    progress: Option<mpsc::UnboundedReceiver<EngineProgress>>,
    done: Option<tokio::sync::oneshot::Receiver<Result<Vec<CrackedPair>, String>>>,
    handle: JoinHandle<()>,
}

pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Runs forever: on any control channel failure, waits and reconnects.
    pub async fn run(self) -> anyhow::Result<()> {
        for subdir in ["wordlists", "rules", "binaries", "hashlists"] {
            tokio::fs::create_dir_all(self.config.data_dir.join(subdir)).await?;
        }

        let coordinator = CoordinatorClient::new(self.config.coordinator_url.clone());
        let credentials = self.ensure_registered(&coordinator).await?;

        loop {
            match self.serve_once(&coordinator, &credentials).await {
                Ok(()) => info!("control channel closed cleanly, reconnecting"),
                Err(e) => warn!("control channel session ended: {e}"),
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    }

    async fn ensure_registered(&self, coordinator: &CoordinatorClient) -> anyhow::Result<StoredCredentials> {
        if let Some(existing) = credentials::load(&self.config.credentials_path()).await {
            return Ok(existing);
        }

        let voucher_code = self
            .config
            .voucher_code
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no persisted credentials and no voucher code was provided"))?;

        let response = coordinator
            .register(&RegistrationRequest {
                voucher_code,
                hostname: self.config.resolved_hostname(),
                hardware: hardware::detect_devices(),
                version: AGENT_VERSION.to_string(),
            })
            .await?;

        let stored = StoredCredentials { agent_id: response.agent_id, api_key: response.api_key };
        credentials::save(&self.config.credentials_path(), &stored).await?;
        info!(agent_id = stored.agent_id, "registered with coordinator");
        Ok(stored)
    }

    #[instrument(skip_all)]
    async fn serve_once(&self, coordinator: &CoordinatorClient, credentials: &StoredCredentials) -> anyhow::Result<()> {
        let mut channel = coordinator.connect_control_channel(&credentials.api_key).await?;

        channel
            .send(&ControlMessage::new(MessagePayload::HardwareReport {
                devices: hardware::detect_devices(),
                agent_version: AGENT_VERSION.to_string(),
            }))
            .await?;

        let mut running: Option<RunningChunk> = None;

        loop {
            tokio::select! {
                incoming = channel.recv() => {
                    let message = incoming?;
                    self.handle_message(&mut channel, &mut running, message).await?;
                }
                event = recv_running(&mut running), if running.is_some() => {
                    if let Some(event) = event {
                        self.handle_chunk_event(&mut channel, &mut running, event).await?;
                    }
                }
            }
        }
    }

    async fn handle_message(
        &self,
        channel: &mut ControlChannel,
        running: &mut Option<RunningChunk>,
        message: ControlMessage,
    ) -> anyhow::Result<()> {
        match message.payload {
            MessagePayload::TaskAssignment {
                task_id,
                job_execution_id: _,
                attack_mode,
                hash_type_id,
                binary_path,
                wordlist_paths,
                rule_paths,
                mask,
                hashlist_path,
                chunk_start,
                chunk_length,
                status_interval_seconds,
            } => {
                if let Some(previous) = running.take() {
                    previous.handle.abort();
                }

                let referenced: Vec<String> = std::iter::once(binary_path.clone())
                    .chain(wordlist_paths.iter().cloned())
                    .chain(rule_paths.iter().cloned())
                    .collect();
                let sync_client = FileSyncClient::new(self.config.coordinator_url.clone(), self.config.data_dir.clone());
                if let Err(e) = sync_client.ensure_present(&referenced).await {
                    warn!(task_id, "could not sync files referenced by task assignment: {e}");
                    channel
                        .send(&ControlMessage::new(MessagePayload::TaskProgress {
                            task_id,
                            progress_percent: 0.0,
                            hashes_per_second: 0,
                            keyspace_processed: 0,
                            status: TaskStatus::Failed,
                        }))
                        .await?;
                    return Ok(());
                }

                let assignment = ChunkAssignment {
                    hash_type_id,
                    attack_mode,
                    binary_path: self.resolve_path(&binary_path),
                    wordlist_paths: wordlist_paths.iter().map(|p| self.resolve_path(p)).collect(),
                    rule_paths: rule_paths.iter().map(|p| self.resolve_path(p)).collect(),
                    mask,
                    hashlist_path: self.resolve_path(&hashlist_path),
                    chunk_start,
                    chunk_length,
                    status_interval_seconds,
                    outfile_path: self.config.data_dir.join(format!("task-{task_id}.out")),
                };
                *running = Some(spawn_chunk(task_id, assignment));
            }
            MessagePayload::TaskStop { task_id, reason } => {
                if let Some(current) = running.as_ref() {
                    if current.task_id == task_id {
                        warn!(task_id, %reason, "coordinator revoked the in-progress task");
                        running.take().unwrap().handle.abort();
                    }
                }
            }
            MessagePayload::BenchmarkRequest {
                attack_mode,
                hash_type_id,
                binary_path,
                wordlist_paths,
                rule_paths,
                mask,
                test_duration_seconds,
            } => {
                self.run_benchmark(
                    channel,
                    message.correlation_id,
                    attack_mode,
                    hash_type_id,
                    binary_path,
                    wordlist_paths,
                    rule_paths,
                    mask,
                    test_duration_seconds,
                )
                .await?;
            }
            MessagePayload::FileSyncRequest { types } => {
                self.report_local_files(channel, message.correlation_id, types).await?;
            }
            MessagePayload::FileSyncCommand { files } => {
                self.sync_files(channel, files).await?;
            }
            MessagePayload::ConfigUpdate { settings } => {
                info!(?settings, "received configuration update");
            }
            other => warn!(?other, "coordinator sent an agent-originated message, ignoring"),
        }
        Ok(())
    }

    async fn handle_chunk_event(
        &self,
        channel: &mut ControlChannel,
        running: &mut Option<RunningChunk>,
        event: ChunkEvent,
    ) -> anyhow::Result<()> {
        let task_id = match running.as_ref() {
            Some(r) => r.task_id,
            None => return Ok(()),
        };

        match event {
            ChunkEvent::Progress(progress) => {
                channel
                    .send(&ControlMessage::new(MessagePayload::TaskProgress {
                        task_id,
                        progress_percent: progress.progress_percent,
                        hashes_per_second: progress.hashes_per_second,
                        keyspace_processed: progress.keyspace_processed,
                        status: TaskStatus::InProgress,
                    }))
                    .await?;
            }
            ChunkEvent::Done(Ok(cracks)) => {
                if !cracks.is_empty() {
                    channel.send(&ControlMessage::new(MessagePayload::CrackFound { cracks })).await?;
                }
                channel
                    .send(&ControlMessage::new(MessagePayload::TaskProgress {
                        task_id,
                        progress_percent: 100.0,
                        hashes_per_second: 0,
                        keyspace_processed: 0,
                        status: TaskStatus::Completed,
                    }))
                    .await?;
                running.take();
            }
            ChunkEvent::Done(Err(error)) => {
                warn!(task_id, %error, "chunk execution failed");
                channel
                    .send(&ControlMessage::new(MessagePayload::TaskProgress {
                        task_id,
                        progress_percent: 0.0,
                        hashes_per_second: 0,
                        keyspace_processed: 0,
                        status: TaskStatus::Failed,
                    }))
                    .await?;
                running.take();
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_benchmark(
        &self,
        channel: &mut ControlChannel,
        correlation_id: Option<String>,
        attack_mode: krakenhashes_models::AttackMode,
        hash_type_id: i32,
        binary_path: String,
        wordlist_paths: Vec<String>,
        rule_paths: Vec<String>,
        mask: Option<String>,
        test_duration_seconds: u32,
    ) -> anyhow::Result<()> {
        let outfile_path = self.config.data_dir.join("benchmark.out");
        let assignment = ChunkAssignment {
            hash_type_id,
            attack_mode,
            binary_path: self.resolve_path(&binary_path),
            wordlist_paths: wordlist_paths.iter().map(|p| self.resolve_path(p)).collect(),
            rule_paths: rule_paths.iter().map(|p| self.resolve_path(p)).collect(),
            mask,
            hashlist_path: self.resolve_path("benchmark.hash"),
            chunk_start: 0,
            chunk_length: i64::MAX,
            status_interval_seconds: test_duration_seconds.max(1),
            outfile_path,
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(test_duration_seconds as u64),
            engine::run_chunk(&assignment, progress_tx),
        )
        .await;

        let mut last = EngineProgress::default();
        while let Ok(p) = progress_rx.try_recv() {
            last = p;
        }

        let reply = match result {
            Ok(Ok(_)) | Err(_) => ControlMessage::new(MessagePayload::BenchmarkResult {
                attack_mode,
                hash_type_id,
                hashes_per_second: last.hashes_per_second,
            }),
            Ok(Err(e)) => ControlMessage::new(MessagePayload::BenchmarkFailed {
                attack_mode,
                hash_type_id,
                error: e.to_string(),
            }),
        };
        let reply = match correlation_id {
            Some(id) => ControlMessage::with_correlation(reply.payload, id),
            None => reply,
        };
        channel.send(&reply).await?;
        Ok(())
    }

    async fn report_local_files(
        &self,
        channel: &mut ControlChannel,
        correlation_id: Option<String>,
        types: Vec<String>,
    ) -> anyhow::Result<()> {
        let mut files = Vec::new();
        for file_type in types {
            let subdir = match file_type.as_str() {
                "wordlist" => "wordlists",
                "rule" => "rules",
                "binary" => "binaries",
                other => {
                    warn!(file_type = other, "unknown file sync type requested");
                    continue;
                }
            };
            files.extend(enumerate_local_files(&self.config.data_dir.join(subdir), &file_type).await?);
        }

        let payload = MessagePayload::FileSyncResponse { files };
        let message = match correlation_id {
            Some(id) => ControlMessage::with_correlation(payload, id),
            None => ControlMessage::new(payload),
        };
        channel.send(&message).await?;
        Ok(())
    }

    async fn sync_files(&self, channel: &mut ControlChannel, files: Vec<RemoteFileTarget>) -> anyhow::Result<()> {
        let sync_client = FileSyncClient::new(self.config.coordinator_url.clone(), self.config.data_dir.clone());
        let targets: Vec<SyncTarget> = files
            .iter()
            .map(|f| SyncTarget {
                relative_path: relative_path_from_download_url(&f.download_url, &f.file_type, &f.name),
                md5_hash: f.md5_hash.clone(),
                size_bytes: 0,
            })
            .collect();

        let result = sync_client.sync_all(&targets).await;
        let (complete, error) = match &result {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        channel
            .send(&ControlMessage::new(MessagePayload::FileSyncStatus {
                name: format!("{} file(s)", targets.len()),
                bytes_downloaded: 0,
                total_bytes: 0,
                complete,
                error,
            }))
            .await?;
        Ok(())
    }

    fn resolve_path(&self, coordinator_relative_path: &str) -> PathBuf {
        self.config.data_dir.join(coordinator_relative_path)
    }
}

fn spawn_chunk(task_id: i64, assignment: ChunkAssignment) -> RunningChunk {
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let handle = tokio::spawn(async move {
        let result = engine::run_chunk(&assignment, progress_tx).await;
        let _ = done_tx.send(result.map_err(|e| e.to_string()));
    });

    RunningChunk { task_id, progress: Some(progress_rx), done: Some(done_rx), handle }
}

async fn recv_running(running: &mut Option<RunningChunk>) -> Option<ChunkEvent> {
    let r = running.as_mut()?;
    tokio::select! {
        progress = async { r.progress.as_mut().unwrap().recv().await }, if r.progress.is_some() => {
            match progress {
                Some(p) => Some(ChunkEvent::Progress(p)),
                None => {
                    r.progress = None;
                    None
                }
            }
        }
        result = async { r.done.as_mut().unwrap().await }, if r.done.is_some() => {
            r.done = None;
            Some(ChunkEvent::Done(result.unwrap_or_else(|_| Err("engine task aborted".to_string()))))
        }
    }
}

/// The coordinator's `download_url` is the path the file lives at under
/// `/api/v1/files/download/`; recover just that remainder so the local
/// sync client mirrors the same subtree. Falls back to `<type>s/<name>`
/// for a URL shape this agent doesn't recognize.
fn relative_path_from_download_url(download_url: &str, file_type: &str, name: &str) -> String {
    const PREFIX: &str = "/api/v1/files/download/";
    match download_url.find(PREFIX) {
        Some(index) => download_url[index + PREFIX.len()..].to_string(),
        None => format!("{file_type}s/{name}"),
    }
}

async fn enumerate_local_files(dir: &Path, file_type: &str) -> std::io::Result<Vec<LocalFileEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e),
    };

    while let Some(entry) = read_dir.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let bytes = tokio::fs::read(entry.path()).await?;
        entries.push(LocalFileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            file_type: file_type.to_string(),
            md5_hash: format!("{:x}", md5::compute(&bytes)),
            size_bytes: bytes.len() as u64,
        });
    }
    Ok(entries)
}
