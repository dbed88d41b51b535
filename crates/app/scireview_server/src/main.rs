//! Sci Review auth API server binary.
//!
//! Loads `.env`, connects to PostgreSQL, runs migrations, bootstraps the
//! optional admin account and serves the HTTP API until Ctrl-C.

use std::net::SocketAddr;

use clap::Parser;
use scireview_api::AppState;
use scireview_api::config::ApiConfig;
use scireview_core::store::PgStore;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "scireview_server", about = "Sci Review auth API server")]
struct Args {
    /// Port to listen on; overrides the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scireview_api=debug,scireview_core=debug"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if std::env::var("APP_ENV").is_ok_and(|env| env == "production") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    if let Some(port) = args.port {
        let mut addr: SocketAddr = config.bind_addr.parse()?;
        addr.set_port(port);
        config.bind_addr = addr.to_string();
    }

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting scireview_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    scireview_api::migrate(&pool).await?;

    let state = AppState::new(PgStore::new(pool), config.clone())?;

    if let Some(admin) = &config.admin {
        let created = state
            .users
            .ensure_admin(&admin.name, &admin.email, &admin.password)
            .await?;
        if created {
            info!(email = %admin.email, "bootstrap admin created");
        }
    }

    let app = scireview_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    info!(addr = %local_addr, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("server stopped");
    Ok(())
}
