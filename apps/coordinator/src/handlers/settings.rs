use crate::handlers::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use krakenhashes_db::SettingsRepository;
use krakenhashes_models::SystemSettings;
use std::collections::HashMap;

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<SystemSettings> {
    Json(state.settings.read().await.clone())
}

/// PUT /api/v1/settings
///
/// Persists each key individually, then reloads the in-memory cache so
/// every handler and daemon sees the update on their next read without
/// restarting the process.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(updates): Json<HashMap<String, String>>,
) -> Result<Json<SystemSettings>, ApiError> {
    let connection = state.database.get_connection()?;
    let repo = SettingsRepository::new(connection);
    for (key, value) in &updates {
        repo.set(key, value).await?;
    }
    let refreshed = repo.load().await?;
    *state.settings.write().await = refreshed.clone();
    Ok(Json(refreshed))
}
