//! Per-hash-type line parsing: username/domain extraction and crackable-value
//! normalization, keyed off a hash type's id and `needs_processing` flag.
//! Kept separate from `hashlist_processor` so each family's rule is a small,
//! independently testable function rather than one big line parser.

use krakenhashes_models::HashType;

/// Result of parsing one input line against its hashlist's hash type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedLine {
    pub hash_value: String,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub plaintext: Option<String>,
}

/// Hash-type families with a dedicated extraction rule. Anything not
/// listed here falls back to the generic heuristic.
enum Family {
    NtlmPwdump,
    Dcc,
    NetNtlm,
    KerberosAsRep,
    LastPass,
    GenericLastField,
    Default,
}

impl Family {
    fn for_hash_type(id: i32) -> Self {
        match id {
            1000 => Family::NtlmPwdump,
            1100 => Family::Dcc,
            5500 | 5600 => Family::NetNtlm,
            18200 => Family::KerberosAsRep,
            6800 => Family::LastPass,
            11100 | 23 => Family::GenericLastField,
            _ => Family::Default,
        }
    }
}

pub fn process_line(line: &str, hash_type: &HashType) -> ProcessedLine {
    let family = Family::for_hash_type(hash_type.id);

    let (value, normalized) = if hash_type.needs_processing {
        match normalize(&family, line) {
            Some(v) => (v, true),
            None => (line.to_string(), false),
        }
    } else {
        (line.to_string(), false)
    };

    // Pre-crack detection only makes sense for types with no rule of
    // their own: a family-specific rule already knows how to read its
    // wire format and would misread a `user` or `email` suffix as a
    // cracked plaintext.
    if matches!(family, Family::Default) && !normalized {
        if let Some((hash_value, plaintext)) = split_precrack_suffix(&value) {
            return ProcessedLine { hash_value, username: None, domain: None, plaintext: Some(plaintext) };
        }
    }

    let (username, domain) = extract_identity(&family, line);
    ProcessedLine { hash_value: value, username, domain, plaintext: None }
}

fn normalize(family: &Family, line: &str) -> Option<String> {
    match family {
        Family::NtlmPwdump => ntlm_nt_hash(line),
        _ => None,
    }
}

/// `DOM\user:rid:LM:NT:::` -> the 32-hex NT hash field.
fn ntlm_nt_hash(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.split(':').collect();
    let nt = *fields.get(3)?;
    (nt.len() == 32 && nt.chars().all(|c| c.is_ascii_hexdigit())).then(|| nt.to_string())
}

fn extract_identity(family: &Family, line: &str) -> (Option<String>, Option<String>) {
    match family {
        Family::NtlmPwdump => ntlm_identity(line),
        Family::Dcc => dcc_identity(line),
        Family::NetNtlm => net_ntlm_identity(line),
        Family::KerberosAsRep => kerberos_as_rep_identity(line),
        Family::LastPass => lastpass_identity(line),
        Family::GenericLastField => generic_last_field_identity(line),
        Family::Default => default_identity(line),
    }
}

/// `DOM\user:...` or `user:...` -> (user, domain).
fn ntlm_identity(line: &str) -> (Option<String>, Option<String>) {
    let user_field = line.split(':').next().unwrap_or("");
    match user_field.split_once('\\') {
        Some((domain, user)) => (Some(user.to_string()), Some(domain.to_string())),
        None if !user_field.is_empty() => (Some(user_field.to_string()), None),
        None => (None, None),
    }
}

/// `hash:username` — the username is the salt, so the whole line stays
/// the crackable value and the username is metadata only.
fn dcc_identity(line: &str) -> (Option<String>, Option<String>) {
    match line.rsplit_once(':') {
        Some((_hash, username)) if !username.is_empty() => (Some(username.to_string()), None),
        _ => (None, None),
    }
}

/// `user::domain:challenge:response`.
fn net_ntlm_identity(line: &str) -> (Option<String>, Option<String>) {
    let fields: Vec<&str> = line.split(':').collect();
    let username = fields.first().filter(|s| !s.is_empty()).map(|s| s.to_string());
    let domain = fields.get(2).filter(|s| !s.is_empty()).map(|s| s.to_string());
    (username, domain)
}

/// `$krb5asrep$23$user@domain:checksum$blob`.
fn kerberos_as_rep_identity(line: &str) -> (Option<String>, Option<String>) {
    let rest = line.strip_prefix("$krb5asrep$23$").unwrap_or(line);
    let principal = rest.split(':').next().unwrap_or("");
    match principal.split_once('@') {
        Some((user, domain)) if !user.is_empty() => (Some(user.to_string()), Some(domain.to_string())),
        _ => (None, None),
    }
}

/// `hash:iterations:email`.
fn lastpass_identity(line: &str) -> (Option<String>, Option<String>) {
    let fields: Vec<&str> = line.split(':').collect();
    (fields.get(2).filter(|s| !s.is_empty()).map(|s| s.to_string()), None)
}

/// Username is simply the last `:`-delimited field (PostgreSQL, Skype).
fn generic_last_field_identity(line: &str) -> (Option<String>, Option<String>) {
    (line.rsplit(':').next().filter(|s| !s.is_empty()).map(|s| s.to_string()), None)
}

/// Absent a rule: a `:`-prefixed substring is a username candidate if it's
/// printable, has at least one letter or digit, and isn't itself a long hex
/// string (which would make it another hash, not a username).
fn default_identity(line: &str) -> (Option<String>, Option<String>) {
    match line.rsplit_once(':') {
        Some((_prefix, candidate)) if is_plausible_plaintext(candidate) => (Some(candidate.to_string()), None),
        _ => (None, None),
    }
}

fn split_precrack_suffix(value: &str) -> Option<(String, String)> {
    let (hash_part, suffix) = value.rsplit_once(':')?;
    if hash_part.is_empty() || !is_plausible_plaintext(suffix) {
        return None;
    }
    Some((hash_part.to_string(), suffix.to_string()))
}

fn is_plausible_plaintext(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.chars().all(|c| c.is_ascii_graphic())
        && candidate.chars().any(|c| c.is_ascii_alphanumeric())
        && !is_long_hex(candidate)
}

fn is_long_hex(s: &str) -> bool {
    s.len() >= 16 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_models::PerformanceClass;

    fn hash_type(id: i32, needs_processing: bool) -> HashType {
        HashType { id, name: "test".into(), needs_processing, is_salted: false, performance_class: PerformanceClass::Fast }
    }

    #[test]
    fn ntlm_pwdump_extracts_nt_hash_and_domain_user() {
        let ht = hash_type(1000, true);
        let p = process_line(
            r"DOM\alice:1001:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::",
            &ht,
        );
        assert_eq!(p.hash_value, "31d6cfe0d16ae931b73c59d7e0c089c0");
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert_eq!(p.domain.as_deref(), Some("DOM"));
        assert!(p.plaintext.is_none());
    }

    #[test]
    fn ntlm_pwdump_without_domain_prefix() {
        let ht = hash_type(1000, true);
        let p = process_line("bob:1002:aad3b435b51404eeaad3b435b51404ee:8846f7eaee8fb117ad06bdd830b7586c:::", &ht);
        assert_eq!(p.hash_value, "8846f7eaee8fb117ad06bdd830b7586c");
        assert_eq!(p.username.as_deref(), Some("bob"));
        assert_eq!(p.domain, None);
    }

    #[test]
    fn md5_precrack_suffix_is_detected() {
        let ht = hash_type(0, false);
        let p = process_line("5f4dcc3b5aa765d61d8327deb882cf99:password", &ht);
        assert_eq!(p.hash_value, "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(p.plaintext.as_deref(), Some("password"));
        assert_eq!(p.username, None);
    }

    #[test]
    fn bare_md5_has_no_precrack() {
        let ht = hash_type(0, false);
        let p = process_line("5f4dcc3b5aa765d61d8327deb882cf99", &ht);
        assert_eq!(p.hash_value, "5f4dcc3b5aa765d61d8327deb882cf99");
        assert!(p.plaintext.is_none());
    }

    #[test]
    fn dcc_keeps_hash_username_order_and_does_not_misread_username_as_plaintext() {
        let ht = hash_type(1100, false);
        let p = process_line("b642b4649e1411b9f2d3f9f6c1e4f7e1:alice", &ht);
        assert_eq!(p.hash_value, "b642b4649e1411b9f2d3f9f6c1e4f7e1:alice");
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert!(p.plaintext.is_none());
    }

    #[test]
    fn net_ntlm_extracts_user_and_domain_from_leading_fields() {
        let ht = hash_type(5600, false);
        let p = process_line(
            "alice::CORP:1122334455667788:aabbccddeeff00112233445566778899:0101000000000000",
            &ht,
        );
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert_eq!(p.domain.as_deref(), Some("CORP"));
        assert_eq!(
            p.hash_value,
            "alice::CORP:1122334455667788:aabbccddeeff00112233445566778899:0101000000000000"
        );
    }

    #[test]
    fn kerberos_as_rep_extracts_user_and_realm() {
        let ht = hash_type(18200, false);
        let p = process_line("$krb5asrep$23$alice@EXAMPLE.COM:a1b2c3$d4e5f6", &ht);
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert_eq!(p.domain.as_deref(), Some("EXAMPLE.COM"));
    }

    #[test]
    fn lastpass_extracts_email() {
        let ht = hash_type(6800, false);
        let p = process_line("abcd1234:100100:alice@example.com", &ht);
        assert_eq!(p.username.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn generic_last_field_extracts_username_for_postgres_style_lines() {
        let ht = hash_type(11100, false);
        let p = process_line("md5abcdef1234567890:postgres", &ht);
        assert_eq!(p.username.as_deref(), Some("postgres"));
    }
}
