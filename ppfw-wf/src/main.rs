//! ppfw-wf - PPF intervention workflow service
//!
//! Default port: 5740

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use ppfw_common::api::load_shared_secret;
use ppfw_common::config::RootFolderInitializer;
use ppfw_wf::config::{Args, ServiceConfig};
use ppfw_wf::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::resolve(&args).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting PPF Workflow (ppfw-wf) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let pool = match ppfw_common::db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load shared secret: {}", e))?;
    if shared_secret == ppfw_common::api::AUTH_DISABLED_SECRET {
        info!("Credential signatures not checked (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }

    let state = AppState::new(pool, shared_secret, initializer.photo_dir())
        .with_advance_rate_limit(config.advance_rate_limit_per_minute)
        .with_max_upload_bytes(config.max_upload_bytes);
    info!(
        "Advance rate limit: {} per caller per minute; max upload {} bytes",
        config.advance_rate_limit_per_minute, config.max_upload_bytes
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("ppfw-wf listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
