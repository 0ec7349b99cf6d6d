//! claimguard-server - insurance claim fraud pipeline HTTP service
//!
//! Serves the synthetic data generator, Stage-1 features, document
//! indexing, Stage-2 analysis and batch evaluation over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use claimguard_common::config::{default_config_path, CompiledDefaults, RootFolderResolver, TomlConfig};
use claimguard_common::PipelineConfig;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use claimguard_server::capabilities::CapabilityRegistry;
use claimguard_server::services::{Embedder, HashingEmbedder};
use claimguard_server::AppState;

const MODULE_NAME: &str = "claimguard-server";

#[derive(Debug, Parser)]
#[command(name = "claimguard-server", version, about = "Insurance claim fraud pipeline API")]
struct Args {
    /// Root folder for the claim store, documents and index
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// TOML config file (default: <config_dir>/claimguard/claimguard-server.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let defaults = CompiledDefaults::for_current_platform();

    let config_path = args.config.clone().or_else(|| default_config_path(MODULE_NAME));
    let toml_config = config_path
        .as_deref()
        .map(TomlConfig::load_or_default)
        .unwrap_or_default();

    // RUST_LOG wins over the TOML level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting {} (fraud pipeline API)", MODULE_NAME);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder.clone());
    if let Some(path) = config_path {
        resolver = resolver.with_config_path(path);
    }
    let root_folder = resolver.resolve();

    let config = PipelineConfig::from_toml(root_folder, &toml_config);
    config
        .paths
        .ensure_directories()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Root folder: {}", config.paths.root_folder.display());
    info!("Database: {}", config.paths.database.display());

    let db_pool = claimguard_server::db::init_database_pool(&config.paths.database).await?;
    info!("Database connection established");

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let llm_configured =
        toml_config.llm.api_key.is_some() || std::env::var("OPENROUTER_API_KEY").is_ok();
    let capabilities =
        CapabilityRegistry::initialize(&db_pool, &config.paths, Arc::clone(&embedder), llm_configured).await;

    let state = AppState::new(db_pool, config, capabilities, embedder);
    let app = claimguard_server::build_router(state).layer(TraceLayer::new_for_http());

    let bind = args
        .bind
        .or(toml_config.server.bind)
        .unwrap_or(defaults.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
