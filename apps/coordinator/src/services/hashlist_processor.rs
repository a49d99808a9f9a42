use crate::services::hash_extract::process_line;
use crate::state::AppState;
use krakenhashes_db::{HashStoreRepository, HashTypeRepository};
use krakenhashes_models::{Hash, HashlistStatus};
use std::collections::HashMap;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Ingests an uploaded hashlist's raw file into the global hash store:
/// extracts username/domain and detects pre-cracked lines per the
/// hashlist's hash type, dedups against existing rows of the same hash
/// type, inserts new ones, links every occurrence to the hashlist, and
/// writes the uncracked subset out as the `<id>.hash` file the engine is
/// actually pointed at.
#[instrument(skip(state))]
pub async fn process_hashlist(state: AppState, hashlist_id: i64) {
    if let Err(e) = run(&state, hashlist_id).await {
        error!("hashlist {hashlist_id} processing failed: {e}");
        if let Ok(connection) = state.database.get_connection() {
            let _ = krakenhashes_db::HashlistRepository::new(connection)
                .finish_processing(hashlist_id, 0, HashlistStatus::Error, "", Some(&e.to_string()))
                .await;
        }
    }
}

async fn run(state: &AppState, hashlist_id: i64) -> anyhow::Result<()> {
    let connection = state.database.get_connection()?;
    let hashlist_repo = krakenhashes_db::HashlistRepository::new(connection.clone());
    hashlist_repo.mark_processing(hashlist_id).await?;

    let hashlist = hashlist_repo.get(hashlist_id).await?;
    let hash_type = HashTypeRepository::new(connection.clone()).get(hashlist.hash_type_id).await?;

    let raw_path = state.hashlists_dir().join(&hashlist.file_path);
    let contents = tokio::fs::read_to_string(&raw_path).await?;
    let lines: Vec<&str> = contents.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let processed: Vec<_> = lines.iter().map(|line| process_line(line, &hash_type)).collect();
    let values: Vec<String> = processed.iter().map(|p| p.hash_value.clone()).collect();

    let hash_store = HashStoreRepository::new(connection);
    let existing = hash_store.lookup_by_values(hashlist.hash_type_id, &values).await?;
    let mut by_value: HashMap<String, Hash> = existing.into_iter().map(|h| (h.hash_value.clone(), h)).collect();

    let mut new_hashes = Vec::new();
    let mut updated: HashMap<Uuid, Hash> = HashMap::new();
    let mut links = Vec::new();

    for (line, p) in lines.iter().zip(processed.iter()) {
        let is_new = !by_value.contains_key(&p.hash_value);
        let mut hash = by_value.get(&p.hash_value).cloned().unwrap_or_else(|| {
            Hash::new_uncracked(
                Uuid::new_v4(),
                p.hash_value.clone(),
                (*line).to_string(),
                hashlist.hash_type_id,
                p.username.clone(),
                p.domain.clone(),
            )
        });

        let mut changed = is_new;
        if let Some(plaintext) = &p.plaintext {
            if hash.apply_crack(plaintext) {
                changed = true;
            }
        }
        if hash.username.is_none() && p.username.is_some() {
            hash.username = p.username.clone();
            changed = true;
        }
        if hash.domain.is_none() && p.domain.is_some() {
            hash.domain = p.domain.clone();
            changed = true;
        }

        links.push((hashlist_id, hash.id));
        by_value.insert(p.hash_value.clone(), hash.clone());
        if is_new {
            new_hashes.push(hash);
        } else if changed {
            updated.insert(hash.id, hash);
        }
    }

    if !new_hashes.is_empty() {
        hash_store.create_batch(&new_hashes).await?;
    }
    let updated_hashes: Vec<Hash> = updated.into_values().collect();
    if !updated_hashes.is_empty() {
        hash_store.update_batch(&updated_hashes).await?;
    }
    if !links.is_empty() {
        hash_store.add_associations_batch(&links).await?;
    }

    let uncracked_values = hash_store.uncracked_values_for_hashlist(hashlist_id).await?;
    let generated_relative_path = format!("{hashlist_id}.hash");
    tokio::fs::write(state.hashlists_dir().join(&generated_relative_path), uncracked_values.join("\n")).await?;

    let cracked_count = by_value.values().filter(|h| h.is_cracked).count() as i64;
    hashlist_repo
        .finish_processing(hashlist_id, by_value.len() as i64, HashlistStatus::Ready, &generated_relative_path, None)
        .await?;
    if cracked_count > 0 {
        hashlist_repo.increment_cracked(hashlist_id, cracked_count).await?;
    }

    info!("hashlist {hashlist_id} processed: {} lines, {} distinct hashes, {} new", lines.len(), by_value.len(), new_hashes.len());
    Ok(())
}
