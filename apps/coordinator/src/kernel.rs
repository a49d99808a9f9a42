use crate::routes::create_router;
use crate::services::{spawn_file_sync_daemon, spawn_reaper, spawn_scheduler};
use crate::state::{AppState, CoordinatorMode};
use krakenhashes_db::CoordinatorDb;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

/// Composition root: owns the database handle and the listening port,
/// and is responsible for wiring every background daemon to the same
/// shared `AppState` before the HTTP server comes up.
pub struct CoordinatorKernel {
    port: u16,
    state: AppState,
}

impl CoordinatorKernel {
    #[instrument(skip(auth_token))]
    pub async fn ignite(database_url: &str, auth_token: Option<String>, port: u16, storage_root: PathBuf) -> Self {
        let database = CoordinatorDb::connect(database_url, auth_token)
            .await
            .expect("database connection failed, aborting ignition");

        let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
        let state = AppState::new(database, scheduler_tx, storage_root)
            .await
            .expect("failed to build application state");

        spawn_scheduler(state.clone(), scheduler_rx);

        Self { port, state }
    }

    /// Spawns the maintenance daemons, flips the coordinator into
    /// `Operational` mode, and serves the HTTP + WebSocket API until the
    /// process is killed.
    pub async fn run(self) {
        tokio::fs::create_dir_all(self.state.hashlists_dir()).await.ok();
        tokio::fs::create_dir_all(self.state.wordlists_dir()).await.ok();

        spawn_reaper(self.state.clone());
        spawn_file_sync_daemon(self.state.clone());

        self.state.set_mode(CoordinatorMode::Operational).await;

        let router = create_router(self.state);
        let address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.port);

        info!("coordinator listening on {address}");
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .expect("failed to bind listening port");

        if let Err(e) = axum::serve(listener, router).await {
            error!("server loop exited: {e}");
            std::process::exit(1);
        }
    }
}
