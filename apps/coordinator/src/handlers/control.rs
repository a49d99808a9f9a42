use crate::middleware::AgentIdentity;
use crate::services::file_sync;
use crate::services::message_router::route_message;
use crate::state::AppState;
use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Extension, State},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use krakenhashes_db::AgentRepository;
use krakenhashes_models::{AgentStatus, RealTimeEvent};
use krakenhashes_transport::{decode_frame, encode_frame};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{error, instrument, warn};

/// How often the coordinator pings an idle connection, and how long it
/// waits for the matching pong before deciding the agent is gone. A
/// connection that's actively sending other frames still gets pinged on
/// this cadence; `last_pong` starts at connect time so a freshly opened
/// socket isn't immediately treated as overdue.
const PING_PERIOD: Duration = Duration::from_secs(54);
const PONG_WAIT: Duration = Duration::from_secs(60);

/// GET /api/v1/agent/ws
///
/// Upgrades to the bidirectional control channel. The agent's identity
/// was already authenticated by `agent_auth_guard`.
pub async fn agent_control_socket(
    State(state): State<AppState>,
    Extension(identity): Extension<AgentIdentity>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, identity.agent_id, socket))
}

/// Runs the connection for as long as the socket stays open, racing an
/// outbound writer task against the inbound reader loop. Either side
/// ending (socket close, channel closed) tears the whole connection down.
#[instrument(skip(state, socket), fields(agent_id))]
async fn handle_connection(state: AppState, agent_id: i64, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    let generation = state.agents.register(agent_id, outbound_tx).await;
    state.event_bus.publish(RealTimeEvent::AgentConnected { agent_id });
    state.notify_scheduler(agent_id).await;
    file_sync::request_sync(&state, agent_id).await;

    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let pong_tracker = last_pong.clone();

    let downstream = async move {
        let mut ping_ticker = tokio::time::interval(PING_PERIOD);
        ping_ticker.tick().await;
        loop {
            tokio::select! {
                message = outbound_rx.recv() => {
                    let Some(message) = message else { break };
                    let frame = match encode_frame(&message) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("failed to encode outbound frame for agent {agent_id}: {e}");
                            continue;
                        }
                    };
                    if ws_tx.send(WsMessage::Binary(frame)).await.is_err() {
                        break;
                    }
                }
                _ = ping_ticker.tick() => {
                    if pong_tracker.lock().await.elapsed() > PONG_WAIT {
                        warn!("agent {agent_id} missed its pong window, closing the connection");
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    let upstream = async {
        while let Some(Ok(message)) = ws_rx.next().await {
            let bytes = match message {
                WsMessage::Binary(bytes) => bytes,
                WsMessage::Text(text) => text.into_bytes(),
                WsMessage::Pong(_) => {
                    *last_pong.lock().await = Instant::now();
                    continue;
                }
                WsMessage::Close(_) => break,
                _ => continue,
            };
            match decode_frame(&bytes) {
                Ok(control_message) => {
                    if let Err(e) = route_message(&state, agent_id, control_message).await {
                        error!("error handling message from agent {agent_id}: {e}");
                    }
                }
                Err(e) => warn!("malformed frame from agent {agent_id}: {e}"),
            }
        }
    };

    tokio::select! {
        _ = downstream => {}
        _ = upstream => {}
    }

    if state.agents.unregister(agent_id, generation).await {
        state.event_bus.publish(RealTimeEvent::AgentDisconnected { agent_id });
        if let Ok(connection) = state.database.get_connection() {
            let _ = AgentRepository::new(connection).set_status(agent_id, AgentStatus::Inactive).await;
        }
    }
}
