use crate::handlers::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use krakenhashes_db::ClientRepository;
use krakenhashes_models::Client;
use uuid::Uuid;

/// POST /api/v1/clients
pub async fn create_client(State(state): State<AppState>, Json(client): Json<Client>) -> Result<StatusCode, ApiError> {
    let connection = state.database.get_connection()?;
    ClientRepository::new(connection).create(&client).await?;
    Ok(StatusCode::CREATED)
}

/// GET /api/v1/clients/:id
pub async fn get_client(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Client>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(ClientRepository::new(connection).get(id).await?))
}

/// GET /api/v1/clients
pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(ClientRepository::new(connection).list().await?))
}
