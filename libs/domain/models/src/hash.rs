use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Performance class of a hash algorithm, used to steer scheduling defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceClass {
    Fast,
    Slow,
}

/// Dictionary entry describing one engine-supported hash mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashType {
    pub id: i32,
    pub name: String,
    /// Whether the raw ingested line needs normalization before it is a
    /// crackable value (e.g. NTLM pwdump -> NT hash).
    pub needs_processing: bool,
    pub is_salted: bool,
    pub performance_class: PerformanceClass,
}

/// A row in the canonical, globally deduplicated hash store.
///
/// The logical key is `(hash_value, hash_type_id)`. `is_cracked` is
/// monotonic: once true it never reverts to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hash {
    pub id: Uuid,
    pub hash_value: String,
    pub original_hash: String,
    pub hash_type_id: i32,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub is_cracked: bool,
    pub password: Option<String>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Hash {
    pub fn new_uncracked(
        id: Uuid,
        hash_value: String,
        original_hash: String,
        hash_type_id: i32,
        username: Option<String>,
        domain: Option<String>,
    ) -> Self {
        Self {
            id,
            hash_value,
            original_hash,
            hash_type_id,
            username,
            domain,
            is_cracked: false,
            password: None,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Applies a monotonic crack-flip. Returns `false` (no-op) if the hash
    /// was already cracked with the same password.
    pub fn apply_crack(&mut self, password: &str) -> bool {
        if self.is_cracked && self.password.as_deref() == Some(password) {
            return false;
        }
        self.is_cracked = true;
        self.password = Some(password.to_string());
        self.last_updated = chrono::Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crack_is_monotonic_and_idempotent() {
        let mut hash = Hash::new_uncracked(
            Uuid::new_v4(),
            "5f4dcc3b5aa765d61d8327deb882cf99".into(),
            "5f4dcc3b5aa765d61d8327deb882cf99:password".into(),
            0,
            None,
            None,
        );
        assert!(!hash.is_cracked);
        assert!(hash.apply_crack("password"));
        assert!(hash.is_cracked);
        assert_eq!(hash.password.as_deref(), Some("password"));
        // Re-applying the same crack is a no-op.
        assert!(!hash.apply_crack("password"));
    }
}
