//! Gatehouse identity provider server binary.
//!
//! Reads configuration from the environment (and `.env`), applies CLI
//! overrides, runs migrations and serves the HTTP API until Ctrl-C.

use clap::Parser;
use gatehouse_api::AppState;
use gatehouse_api::config::ApiConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "gatehouse_server", about = "Gatehouse identity provider server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users and tokens in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gatehouse_api=debug,gatehouse_core=debug")),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    info!(
        bind_addr = %config.bind_addr,
        memory = args.memory,
        strict_revocation = config.strict_revocation,
        allowed_app_ids = ?config.allowed_app_ids,
        "starting gatehouse_server"
    );
    if config.notify_webhook_url.is_none() {
        warn!("NOTIFY_WEBHOOK_URL not set, account links will only be logged");
    }

    let state = if args.memory {
        warn!("in-memory mode: nothing survives a restart");
        AppState::in_memory(config.clone())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        gatehouse_api::migrate(&pool).await?;

        AppState::postgres(pool, config.clone())
    };

    let app = gatehouse_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
