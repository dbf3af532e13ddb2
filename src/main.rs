use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mailroom::config::AppConfig;
use mailroom::notify::LogNotifier;
use mailroom::scan_access::policy::OwnerOnlyPolicy;
use mailroom::shared::state::AppState;
use mailroom::shared::utils::{create_conn, run_migrations};
use mailroom::web_server;
use mailroom::webhook::directory::FixedOwnerDirectory;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    let conn = create_conn(&config.database_url)?;
    run_migrations(&conn)?;
    info!("database ready");

    let owner_directory = Arc::new(FixedOwnerDirectory::new(config.owner_refs.clone()));
    let state = Arc::new(AppState {
        conn,
        config,
        notifier: Arc::new(LogNotifier),
        access_policy: Arc::new(OwnerOnlyPolicy),
        owner_directory,
    });

    web_server::run_server(state).await
}
