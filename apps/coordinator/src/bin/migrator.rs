use dotenvy::dotenv;
use krakenhashes_db::CoordinatorDb;
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let database_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        // `CoordinatorDb::connect` applies the schema as part of connecting,
        // so this binary's job is just to exercise that path standalone
        // (useful in a deploy step ahead of starting the server) and
        // report success.
        CoordinatorDb::connect(&database_url, database_token).await?;
        info!("schema is up to date");
        Ok(())
    })
}
