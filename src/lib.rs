pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod relay;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config);

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, prometheus_handle).await,
        Commands::Relay => run_relay(config, prometheus_handle).await,
        Commands::Publish {
            channel,
            event,
            data,
            url,
        } => cli::cmd_publish(&config, &channel, &event, data.as_deref(), url.as_deref()).await,
        Commands::Init => cli::cmd_init(),
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let json = config.general.log_format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let addr = config.server_addr();
    let api_state = api::create_app_state_from_config(config, prometheus_handle)?;
    let app = api::router(api_state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let server_handle = tokio::spawn(async move {
        info!("Server running at http://{addr}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    wait_for_shutdown().await;

    server_handle.abort();
    info!("Server stopped");

    Ok(())
}

async fn run_relay(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let host = config.relay.host.clone();
    let ws_addr = format!("{host}:{}", config.relay.ws_port);
    let ingress_addr = format!("{host}:{}", config.relay.ingress_port);

    let state = relay::RelayState::new(config.relay, prometheus_handle);

    let ws_listener = TcpListener::bind(&ws_addr)
        .await
        .with_context(|| format!("Failed to bind {ws_addr}"))?;
    let ingress_listener = TcpListener::bind(&ingress_addr)
        .await
        .with_context(|| format!("Failed to bind {ingress_addr}"))?;

    let ws_app = relay::ws_router(state.clone());
    let ingress_app = relay::ingress_router(state.clone());

    let ws_path = state.config.ws_path.clone();
    let ws_handle = tokio::spawn(async move {
        info!("WebSocket relay listening on ws://{ws_addr}{ws_path}");
        if let Err(e) = axum::serve(ws_listener, ws_app).await {
            error!("WebSocket server error: {}", e);
        }
    });

    let ingress_handle = tokio::spawn(async move {
        info!("Broadcast ingress listening on http://{ingress_addr}/broadcast");
        if let Err(e) = axum::serve(ingress_listener, ingress_app).await {
            error!("Ingress server error: {}", e);
        }
    });

    wait_for_shutdown().await;

    ws_handle.abort();
    ingress_handle.abort();
    info!("Relay stopped");

    Ok(())
}

async fn wait_for_shutdown() {
    info!("Running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }
}
