use dotenvy::dotenv;
use krakenhashes_db::CoordinatorDb;
use libsql::params;
use tracing::info;

/// Default hash type catalog: (id, name, needs_processing, is_salted, performance_class).
///
/// Ids follow Hashcat's `-m` numbering so a deployment can cross-reference
/// the engine's own mode table without a translation layer.
const DEFAULT_HASH_TYPES: &[(i64, &str, bool, bool, &str)] = &[
    (0, "MD5", false, false, "fast"),
    (100, "SHA1", false, false, "fast"),
    (1000, "NTLM", true, false, "fast"),
    (1100, "DCC (mscash)", false, true, "fast"),
    (1400, "SHA256", false, false, "fast"),
    (1800, "sha512crypt", false, true, "slow"),
    (3200, "bcrypt", false, true, "slow"),
    (5500, "NetNTLMv1", false, true, "fast"),
    (5600, "NetNTLMv2", false, true, "fast"),
    (6800, "LastPass", false, true, "slow"),
    (11100, "PostgreSQL CRAM-MD5", false, false, "fast"),
    (18200, "Kerberos 5 AS-REP etype 23", false, true, "slow"),
    (22000, "WPA-PBKDF2-PMKID+EAPOL", true, true, "slow"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let database_token = std::env::var("TURSO_AUTH_TOKEN").ok();

    let database = CoordinatorDb::connect(&database_url, database_token).await?;
    let connection = database.get_connection()?;

    info!("seeding hash type catalog");
    for (id, name, needs_processing, is_salted, performance_class) in DEFAULT_HASH_TYPES {
        connection
            .execute(
                "INSERT INTO hash_types (id, name, needs_processing, is_salted, performance_class)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO NOTHING",
                params![*id, *name, *needs_processing as i64, *is_salted as i64, *performance_class],
            )
            .await?;
    }

    let bootstrap_code = std::env::var("KRAKENHASHES_BOOTSTRAP_VOUCHER")
        .unwrap_or_else(|_| "bootstrap-voucher".to_string());

    info!("seeding bootstrap claim voucher");
    connection
        .execute(
            "INSERT INTO claim_vouchers (code, is_active, is_continuous, expires_at, used_by_agent_id)
             VALUES (?1, 1, 1, NULL, NULL)
             ON CONFLICT(code) DO NOTHING",
            params![bootstrap_code.clone()],
        )
        .await?;

    info!(voucher = %bootstrap_code, "seed complete");
    Ok(())
}
