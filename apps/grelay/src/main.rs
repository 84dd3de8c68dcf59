use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

mod cli;
mod dsn;
mod router;
mod usage_sink;

use grelay_common::GlobalConfig;
use grelay_core::{
    AuthProvider, GenerateService, MemoryAuth, SharedUsageSink, UpstreamClientConfig,
    WreqUpstreamClient,
};
use grelay_storage::{UsageBus, UsageBusConfig, UsageStorage};

use crate::cli::Cli;
use crate::dsn::{resolve_data_dir, resolve_dsn};
use crate::router::{AppState, app_router};
use crate::usage_sink::BusUsageSink;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("grelay failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli.data_dir);
    let dsn = resolve_dsn(&cli.dsn, &data_dir)?;

    let config = GlobalConfig {
        host: cli.host,
        port: cli.port,
        dsn,
        upstream_base_url: cli.upstream_base_url,
        upstream_api_key: cli.gemini_api_key,
        model: cli.model,
        connect_timeout_secs: cli.connect_timeout_secs,
        request_timeout_secs: cli.request_timeout_secs,
    };
    config.validate()?;
    if config.upstream_key().is_none() {
        warn!("upstream api key is not configured; generate calls will fail");
    }

    let storage = UsageStorage::connect(&config.dsn).await?;
    info!(dsn = %config.dsn, "db connected");
    storage.sync().await?;
    storage.ensure_default_key(&cli.api_key).await?;

    let snapshot = storage.load_auth_snapshot().await?;
    info!(api_keys = snapshot.keys_by_value.len(), "auth snapshot loaded");
    let auth: Arc<dyn AuthProvider> = Arc::new(MemoryAuth::new(snapshot));

    let bus = UsageBus::spawn(storage.clone(), UsageBusConfig::default());
    let usage: SharedUsageSink = Arc::new(BusUsageSink::new(&bus));
    let _bus = bus;

    let client = WreqUpstreamClient::new(UpstreamClientConfig {
        connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    })?;

    let config = Arc::new(config);
    let service = Arc::new(GenerateService::new(
        config.clone(),
        Arc::new(client),
        usage,
    ));

    let app = app_router(AppState {
        service,
        auth,
        storage,
    });

    let bind = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, model = %config.model, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("grelay=info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
