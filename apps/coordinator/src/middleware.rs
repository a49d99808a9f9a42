use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use krakenhashes_db::AgentRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// The authenticated agent identity, injected into the request extensions
/// by [`agent_auth_guard`] for downstream handlers to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub agent_id: i64,
}

/// Rejects requests while the coordinator is starting up or draining.
pub async fn health_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(reason) = state.is_operational().await {
        warn!("rejecting request, coordinator not operational: {reason}");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "coordinator_unavailable", "reason": reason })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Authenticates an agent-facing request by its `Authorization: Bearer
/// <api_key>` header against the agent registry, injecting
/// [`AgentIdentity`] on success.
pub async fn agent_auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let api_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let connection = state.database.get_connection().map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let agent = AgentRepository::new(connection)
        .find_by_api_key(&api_key)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AgentIdentity { agent_id: agent.id });
    Ok(next.run(req).await)
}
