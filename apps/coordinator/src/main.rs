use krakenhashes_coordinator::prelude::*;

use dotenvy::dotenv;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let database_connection_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();
        let listening_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);
        let storage_root = std::env::var("KRAKENHASHES_DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        info!("starting krakenhashes coordinator");

        let kernel = CoordinatorKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_port,
            storage_root.into(),
        )
        .await;

        kernel.run().await;
    });

    Ok(())
}
