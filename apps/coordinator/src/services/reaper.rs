use crate::state::AppState;
use krakenhashes_db::{AgentRepository, JobRepository};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Background hygiene daemon: reclaims tasks whose agent stopped reporting
/// progress, and marks agents inactive once their heartbeat goes stale.
/// Grounded on the coordinator's general "spawn a daemon that owns a
/// cloned `AppState` and ticks forever" shape used throughout this crate.
pub fn spawn_reaper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(REAP_INTERVAL);
        loop {
            ticker.tick().await;
            reap_once(&state).await;
        }
    });
}

#[instrument(skip(state))]
async fn reap_once(state: &AppState) {
    let connection = match state.database.get_connection() {
        Ok(connection) => connection,
        Err(e) => {
            error!("reaper could not acquire a database connection: {e}");
            return;
        }
    };

    let stale_task_after = chrono::Duration::minutes(5);
    match JobRepository::new(connection.clone()).recover_zombie_tasks(stale_task_after).await {
        Ok(reclaimed) if !reclaimed.is_empty() => {
            info!("reclaimed {} zombie tasks back to pending", reclaimed.len());
        }
        Ok(_) => {}
        Err(e) => error!("zombie task recovery failed: {e}"),
    }

    let stale_agent_after = chrono::Duration::seconds(90);
    match AgentRepository::new(connection).mark_stale_inactive(stale_agent_after).await {
        Ok(marked) if marked > 0 => info!("marked {marked} agents inactive after a missed heartbeat window"),
        Ok(_) => {}
        Err(e) => error!("stale agent sweep failed: {e}"),
    }
}
