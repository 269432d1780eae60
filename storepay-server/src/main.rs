//! Storepay Server
//!
//! Payment reconciliation backend for the storefront: checkout through
//! Paystack or Monnify, webhook and verification handling, and order
//! creation for paid checkouts.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use storepay_core::events::order_confirmation_channel;
use storepay_core::framework::DatabaseProcessor;
use storepay_core::mail::SmtpMailer;
use storepay_core::processors::{OrderConfirmationNotifier, OrderRepairSweeper};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Storepay - storefront payment reconciliation server
#[derive(Parser, Debug)]
#[command(name = "storepay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "STOREPAY_CONFIG", default_value = "./storepay.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:5000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting storepay-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let repair_interval = loaded_config.payments.repair_interval;
    let mail_config = loaded_config.mail.clone();
    let gateways = loaded_config.gateway_registry();
    let configured: Vec<String> = gateways.configured().map(|g| g.to_string()).collect();
    tracing::info!(
        gateways = ?configured,
        default = %gateways.default_gateway(),
        "Configuration loaded from {:?}",
        args.config
    );

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Create application state
    let mut state = AppState::new(db_pool.clone(), shared_config, gateways, repair_interval);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Order confirmation emails
    let notifier_handle = match mail_config {
        Some(mail) => {
            let mailer = SmtpMailer::new(&mail).map_err(|e| {
                tracing::error!("Failed to set up SMTP mailer: {}", e);
                e
            })?;
            let (confirmation_tx, confirmation_rx) = order_confirmation_channel();
            state = state.with_confirmations(confirmation_tx);
            tracing::info!(smtp_host = %mail.smtp_host, "Order confirmation emails enabled");
            Some(tokio::spawn(
                OrderConfirmationNotifier::new(
                    Arc::new(mailer),
                    confirmation_rx,
                    shutdown_rx.clone(),
                    mail.max_attempts,
                )
                .run(),
            ))
        }
        None => {
            tracing::warn!("No [mail] section; order confirmation emails are disabled");
            None
        }
    };

    // Repair paid payments left without an order, at startup and then periodically
    let sweeper = OrderRepairSweeper::new(
        DatabaseProcessor {
            pool: db_pool.clone(),
        },
        state.repair_interval.clone(),
    )
    .with_confirmations(state.confirmations.clone());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop background tasks
    shutdown_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        tracing::error!("Order repair sweeper task failed: {}", e);
    }
    if let Some(handle) = notifier_handle {
        if let Err(e) = handle.await {
            tracing::error!("Order confirmation task failed: {}", e);
        }
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
