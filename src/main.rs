//! # Payment Webhook Service
//!
//! Main entry point for the payment gateway webhook receiver.
//! Configures logging, the database pool, SSL and route handling.

#![recursion_limit = "256"]
pub mod api;
pub mod config;
pub mod consts;
pub mod logger;
pub mod metric;
pub mod models;
pub mod repo;
pub mod services;
pub mod state;
pub mod utils;
pub mod webhook;

use anyhow::Context;
use logfire::config::{MetricsOptions, SendToLogfire};
use ntex::web;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    config::init_config().await?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Initialize logging and metrics, logs stay local without a token
    let logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()));
    let shutdown_handler = match &app_config.logfire_token {
        Some(token) => logfire_config
            .send_to_logfire(SendToLogfire::Yes)
            .with_token(token)
            .finish()?,
        None => {
            let shutdown_handler = logfire_config.send_to_logfire(SendToLogfire::No).finish()?;
            if let Err(e) = logger::setup_simple_logger() {
                logfire::warn!(
                    "Stdout logger couldnt be installed: {error}",
                    error = e.to_string()
                );
            }
            shutdown_handler
        }
    };

    if app_config.webhook_secret().is_none() {
        logfire::error!("WEBHOOK_SECRET is not set, every webhook delivery will be refused");
    }

    // Initialize database connection pool
    let postgres_repo = repo::postgres::SqlxPostgresRepo {
        db_pool: utils::setup_postgres_db_pool().await?,
    };

    let notification_service = services::notification::EmailNotificationHandler::new(
        app_config.resend_api_key.clone(),
        app_config.from_email.clone(),
    );
    let rate_limiter = services::rate_limit::InMemoryRateLimiter::default();

    configure_and_run_server(postgres_repo, notification_service, rate_limiter).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures SSL acceptor for production environments
fn setup_ssl_acceptor() -> anyhow::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut ssl_acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls_server())
        .map_err(|e| anyhow::anyhow!("Failed to create SSL acceptor: {}", e))?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    ssl_acceptor
        .set_private_key_file(&app_config.private_key_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load private key from {}: {}",
                app_config.private_key_path,
                e
            )
        })?;

    ssl_acceptor
        .set_certificate_file(&app_config.certificate_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load certificate from {}: {}",
                app_config.certificate_path,
                e
            )
        })?;

    Ok(ssl_acceptor)
}

/// Creates application state from the provided services.
///
/// Every worker gets its own state, the rate limiter clones share one quota.
fn create_app_state(
    settings: state::WebhookSettings,
    postgres_repo: repo::postgres::SqlxPostgresRepo,
    notification_service: services::notification::EmailNotificationHandler,
    rate_limiter: services::rate_limit::InMemoryRateLimiter,
) -> state::AppState {
    state::AppState {
        repo: Box::new(postgres_repo),
        notification_service: Box::new(notification_service),
        rate_limiter: Box::new(rate_limiter),
        settings,
    }
}

/// Configures and starts the web server with appropriate SSL settings
async fn configure_and_run_server(
    postgres_repo: repo::postgres::SqlxPostgresRepo,
    notification_service: services::notification::EmailNotificationHandler,
    rate_limiter: services::rate_limit::InMemoryRateLimiter,
) -> anyhow::Result<()> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let server_addr = (
        app_config.web_server_host.as_str(),
        app_config.web_server_port,
    );
    let settings = state::WebhookSettings::from_config(app_config)?;

    let server = web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(create_app_state(
                settings.clone(),
                postgres_repo.clone(),
                notification_service.clone(),
                rate_limiter.clone(),
            ))
            .configure(webhook::routes::payment)
    });

    let bound_server = if app_config.is_prod() {
        let ssl_acceptor = setup_ssl_acceptor()?;
        server.bind_openssl(server_addr, ssl_acceptor)?
    } else {
        server.bind(server_addr)?
    };

    logfire::info!(
        "Payment webhook listening on {host}:{port}",
        host = &app_config.web_server_host,
        port = app_config.web_server_port.to_string()
    );

    bound_server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
