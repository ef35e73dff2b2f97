mod api;
mod gateway;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketbot_core::{
    load_config, load_config_from_env, validate_config, Config, DiscordClient, HandlerConfig,
    InMemoryTicketRepository, PlatformClient, TicketHandler, TicketRepository, TicketService,
};

use api::create_router;
use gateway::Gateway;
use state::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let config = load()?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        "Guild: {:?}, control channel: {:?}, category: {:?}",
        config.discord.guild_id, config.discord.control_channel_id, config.discord.category_id
    );

    let repo: Arc<dyn TicketRepository> = Arc::new(InMemoryTicketRepository::new());
    let ticket_service = Arc::new(TicketService::new(repo));
    info!("Ticket repository initialized");

    let platform: Arc<dyn PlatformClient> = Arc::new(
        DiscordClient::new(&config.discord).context("Failed to create Discord client")?,
    );
    info!("Using platform: {}", platform.name());

    let handler = Arc::new(TicketHandler::new(
        Arc::clone(&ticket_service),
        platform,
        HandlerConfig::from(&config),
    ));

    // Not fatal: ticket buttons already posted keep working
    if let Err(e) = handler.initialize_control_panel().await {
        error!("Failed to initialize control panel: {}", e);
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let server_handle = if config.server.enabled {
        let state = Arc::new(AppState::new(config.clone(), Arc::clone(&ticket_service)));
        let app = create_router(state);

        let addr = SocketAddr::new(config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Starting HTTP server on {}", addr);

        let mut shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
        }))
    } else {
        info!("HTTP server disabled in config");
        None
    };

    let gateway = Gateway::new(
        config.discord.gateway_url.clone(),
        config.discord.token.clone(),
        Arc::clone(&handler),
    );
    let gateway_handle = tokio::spawn(gateway.run(shutdown_tx.subscribe()));

    shutdown_signal().await;
    info!("Bot shutting down...");
    let _ = shutdown_tx.send(());

    if let Err(e) = gateway_handle.await {
        error!("Gateway task failed: {}", e);
    }

    if let Some(handle) = server_handle {
        match handle.await {
            Ok(Ok(())) => info!("HTTP server stopped"),
            Ok(Err(e)) => error!("HTTP server error: {}", e),
            Err(e) => error!("HTTP server task failed: {}", e),
        }
    }

    Ok(())
}

/// Plain text logs by default, JSON when `TICKETBOT_LOG_FORMAT=json`.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("TICKETBOT_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// `TICKETBOT_CONFIG` must point at a file; without it `config.toml` is
/// used when present, otherwise the environment alone.
fn load() -> Result<Config> {
    if let Ok(path) = std::env::var("TICKETBOT_CONFIG") {
        let path = PathBuf::from(path);
        info!("Loading configuration from {:?}", path);
        return load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        info!("Loading configuration from {:?}", default_path);
        load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))
    } else {
        info!("No configuration file, reading environment");
        load_config_from_env().context("Failed to load config from environment")
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
