use crate::handlers::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use krakenhashes_db::FileRegistryRepository;
use krakenhashes_models::{File, FileCategory, FileType, VerificationStatus};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ListFilesQuery {
    pub file_type: FileType,
}

/// GET /api/v1/files?file_type=
pub async fn list_files(State(state): State<AppState>, Query(query): Query<ListFilesQuery>) -> Result<Json<Vec<File>>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(FileRegistryRepository::new(connection).list_by_type(query.file_type).await?))
}

/// GET /api/v1/files/download/*relative_path
///
/// Serves a wordlist, rule, or engine binary file straight off disk. Left
/// outside the agent auth layer, mirroring how static assets are usually
/// exposed separately from the authenticated control surface.
pub async fn download_file(State(state): State<AppState>, Path(relative_path): Path<String>) -> Result<Response, ApiError> {
    let path = state.wordlists_dir().join(&relative_path);
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        ApiError::from(krakenhashes_db::DbError::FileNotFound)
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from(bytes),
    )
        .into_response())
}

/// POST /api/v1/admin/files
///
/// Accepts a multipart upload (`file_type`, optional `category`, and the
/// `file` part itself) and ingests it into the registry at
/// `<file_type>s/<filename>`, hashing its content the same way the agent
/// hashes its local cache so a re-upload of unchanged bytes is a no-op.
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> Result<(StatusCode, Json<File>), ApiError> {
    let mut file_type: Option<FileType> = None;
    let mut category = FileCategory::General;
    let mut name: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| anyhow::anyhow!(e))? {
        match field.name().unwrap_or_default() {
            "file_type" => {
                file_type = field.text().await.ok().and_then(|v| match v.as_str() {
                    "wordlist" => Some(FileType::Wordlist),
                    "rule" => Some(FileType::Rule),
                    "binary" => Some(FileType::Binary),
                    _ => None,
                })
            }
            "category" => {
                if let Some(v) = field.text().await.ok() {
                    category = match v.as_str() {
                        "specialized" => FileCategory::Specialized,
                        "targeted" => FileCategory::Targeted,
                        "custom" => FileCategory::Custom,
                        _ => FileCategory::General,
                    };
                }
            }
            "file" => {
                name = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await.map_err(|e| anyhow::anyhow!(e))?.to_vec());
            }
            _ => {}
        }
    }

    let file_type = file_type.ok_or_else(|| anyhow::anyhow!("missing or invalid file_type field"))?;
    let bytes = bytes.ok_or_else(|| anyhow::anyhow!("missing file field"))?;
    let name = name.ok_or_else(|| anyhow::anyhow!("uploaded file part had no filename"))?;

    let subdir = match file_type {
        FileType::Wordlist => "wordlists",
        FileType::Rule => "rules",
        FileType::Binary => "binaries",
    };
    let relative_path = format!("{subdir}/{name}");
    let destination = state.wordlists_dir().join(&relative_path);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&destination, &bytes).await?;

    let file = File {
        id: 0,
        name,
        relative_path,
        md5_hash: format!("{:x}", md5::compute(&bytes)),
        size_bytes: bytes.len() as i64,
        file_type,
        category,
        verification_status: VerificationStatus::Pending,
        line_count: None,
        updated_at: chrono::Utc::now(),
    };

    let connection = state.database.get_connection()?;
    let repository = FileRegistryRepository::new(connection);
    let id = repository.upsert_by_path(&file).await?;
    Ok((StatusCode::CREATED, Json(repository.get(id).await?)))
}
