use crate::handlers::ApiError;
use crate::services::hashlist_processor::process_hashlist;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use krakenhashes_db::HashlistRepository;
use krakenhashes_models::Hashlist;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ListHashlistsQuery {
    pub user_id: i64,
}

/// GET /api/v1/hashlists?user_id=
pub async fn list_hashlists(
    State(state): State<AppState>,
    Query(query): Query<ListHashlistsQuery>,
) -> Result<Json<Vec<Hashlist>>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(HashlistRepository::new(connection).list_for_user(query.user_id).await?))
}

/// GET /api/v1/hashlists/:id
pub async fn get_hashlist(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Hashlist>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(HashlistRepository::new(connection).get(id).await?))
}

/// POST /api/v1/hashlists
///
/// Accepts a multipart upload with `user_id`, `hash_type_id` text fields
/// and a `file` part. Stores the raw upload to disk, records the
/// hashlist row as `uploading`, then kicks off ingestion in the
/// background and returns immediately with the new id.
pub async fn create_hashlist(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Hashlist>), ApiError> {
    let mut user_id: Option<i64> = None;
    let mut hash_type_id: Option<i32> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| anyhow::anyhow!(e))? {
        match field.name().unwrap_or_default() {
            "user_id" => user_id = field.text().await.ok().and_then(|v| v.parse().ok()),
            "hash_type_id" => hash_type_id = field.text().await.ok().and_then(|v| v.parse().ok()),
            "file" => file_bytes = Some(field.bytes().await.map_err(|e| anyhow::anyhow!(e))?.to_vec()),
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| anyhow::anyhow!("missing user_id field"))?;
    let hash_type_id = hash_type_id.ok_or_else(|| anyhow::anyhow!("missing hash_type_id field"))?;
    let file_bytes = file_bytes.ok_or_else(|| anyhow::anyhow!("missing file field"))?;

    let connection = state.database.get_connection()?;
    let repo = HashlistRepository::new(connection);

    let relative_path = format!("upload-{}.txt", uuid::Uuid::new_v4());
    tokio::fs::create_dir_all(state.hashlists_dir()).await?;
    tokio::fs::write(state.hashlists_dir().join(&relative_path), &file_bytes).await?;

    let hashlist = Hashlist::new_uploading(0, user_id, hash_type_id, relative_path);
    let id = repo.create(&hashlist).await?;
    let created = repo.get(id).await?;

    tokio::spawn(process_hashlist(state, id));

    Ok((StatusCode::ACCEPTED, Json(created)))
}
