pub mod agent_registry;

use crate::services::event_bus::EventBus;
use krakenhashes_db::{CoordinatorDb, DbError, SettingsRepository};
use krakenhashes_models::SystemSettings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, instrument, warn};

pub use agent_registry::AgentRegistry;

/// Coordinator health mode, consulted by the HTTP health guard before an
/// incoming request is allowed to reach an agent-facing handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorMode {
    Starting,
    Operational,
    Draining(String),
}

/// Signal raised when an agent becomes eligible to receive work: it just
/// connected, finished a task, or reported fresh hardware. The scheduler
/// daemon consumes these to decide who to try to dispatch to next.
#[derive(Debug, Clone, Copy)]
pub enum SchedulerSignal {
    AgentIdle(i64),
}

/// Thread-safe container shared across every handler and daemon.
#[derive(Clone)]
pub struct AppState {
    pub database: CoordinatorDb,
    pub event_bus: Arc<EventBus>,
    pub agents: Arc<AgentRegistry>,
    pub settings: Arc<RwLock<SystemSettings>>,
    pub mode: Arc<RwLock<CoordinatorMode>>,
    pub scheduler_tx: mpsc::UnboundedSender<SchedulerSignal>,
    pub storage_root: PathBuf,
}

impl AppState {
    #[instrument(skip(database, scheduler_tx))]
    pub async fn new(
        database: CoordinatorDb,
        scheduler_tx: mpsc::UnboundedSender<SchedulerSignal>,
        storage_root: PathBuf,
    ) -> Result<Self, DbError> {
        let connection = database.get_connection()?;
        let settings = SettingsRepository::new(connection).load().await?;

        Ok(Self {
            database,
            event_bus: Arc::new(EventBus::new()),
            agents: Arc::new(AgentRegistry::new()),
            settings: Arc::new(RwLock::new(settings)),
            mode: Arc::new(RwLock::new(CoordinatorMode::Starting)),
            scheduler_tx,
            storage_root,
        })
    }

    /// Evaluated by the health guard middleware before dispatching to the
    /// agent-facing API surface.
    pub async fn is_operational(&self) -> Result<(), String> {
        match &*self.mode.read().await {
            CoordinatorMode::Operational => Ok(()),
            CoordinatorMode::Starting => Err("coordinator is still starting up".to_string()),
            CoordinatorMode::Draining(reason) => {
                warn!("rejecting request, coordinator is draining: {reason}");
                Err(reason.clone())
            }
        }
    }

    pub async fn set_mode(&self, mode: CoordinatorMode) {
        info!("coordinator mode transitioning to {mode:?}");
        *self.mode.write().await = mode;
    }

    pub fn wordlists_dir(&self) -> PathBuf {
        self.storage_root.join("files")
    }

    pub fn hashlists_dir(&self) -> PathBuf {
        self.storage_root.join("hashlists")
    }

    pub async fn notify_scheduler(&self, agent_id: i64) {
        let _ = self.scheduler_tx.send(SchedulerSignal::AgentIdle(agent_id));
    }
}
