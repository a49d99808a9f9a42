use crate::handlers::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use krakenhashes_db::{AgentRepository, ClaimVoucherRepository, DbError};
use krakenhashes_models::{Agent, AgentDevice, AgentStatus};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// An agent hostname collides often enough (identical VM images, cloned
/// containers) that registration needs to resolve it rather than bounce
/// the request back to the agent.
const MAX_NAME_SUFFIX_ATTEMPTS: u32 = 50;

#[derive(Deserialize)]
pub struct RegisterAgentRequest {
    pub voucher_code: String,
    pub hostname: String,
    pub hardware: Vec<AgentDevice>,
    pub version: String,
}

#[derive(Serialize)]
pub struct RegisterAgentResponse {
    pub agent_id: i64,
    pub api_key: String,
}

/// POST /api/v1/agent/register
///
/// Creates a pending agent row, then redeems the supplied voucher against
/// it. If the voucher is invalid the freshly created row is disabled
/// rather than left dangling in a half-registered state.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<Json<RegisterAgentResponse>, ApiError> {
    let connection = state.database.get_connection()?;
    let api_key = generate_token();

    let mut agent = Agent {
        id: 0,
        name: request.hostname,
        status: AgentStatus::Pending,
        api_key: api_key.clone(),
        cert_fingerprint: None,
        hardware: request.hardware,
        version: request.version,
        last_heartbeat: None,
        schedule: None,
        metadata: Default::default(),
    };

    let agent_repo = AgentRepository::new(connection.clone());
    let base_name = agent.name.clone();
    let agent_id = {
        let mut attempt = 0u32;
        loop {
            match agent_repo.create(&agent).await {
                Ok(id) => break id,
                Err(DbError::DuplicateName(_)) if attempt < MAX_NAME_SUFFIX_ATTEMPTS => {
                    attempt += 1;
                    agent.name = format!("{base_name}-{attempt}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    match ClaimVoucherRepository::new(connection).redeem(&request.voucher_code, agent_id).await {
        Ok(_) => {
            agent_repo.set_status(agent_id, AgentStatus::Active).await?;
            Ok(Json(RegisterAgentResponse { agent_id, api_key }))
        }
        Err(e) => {
            let _ = agent_repo.set_status(agent_id, AgentStatus::Disabled).await;
            Err(e.into())
        }
    }
}

#[derive(Serialize)]
pub struct AgentSummary {
    pub id: i64,
    pub name: String,
    pub status: AgentStatus,
    pub version: String,
}

/// GET /api/v1/admin/agents
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<AgentSummary>>, ApiError> {
    let connection = state.database.get_connection()?;
    let agents = AgentRepository::new(connection).list_active().await?;
    Ok(Json(
        agents
            .into_iter()
            .map(|a| AgentSummary { id: a.id, name: a.name, status: a.status, version: a.version })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct CreateVoucherRequest {
    pub is_continuous: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
pub struct CreateVoucherResponse {
    pub voucher_id: i64,
    pub code: String,
}

/// POST /api/v1/admin/vouchers
pub async fn create_voucher(
    State(state): State<AppState>,
    Json(request): Json<CreateVoucherRequest>,
) -> Result<Json<CreateVoucherResponse>, ApiError> {
    let connection = state.database.get_connection()?;
    let code = generate_token();
    let voucher_id = ClaimVoucherRepository::new(connection)
        .create(&code, request.is_continuous, request.expires_at)
        .await?;
    Ok(Json(CreateVoucherResponse { voucher_id, code }))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
