//! Finance Ledger Server - Main Application Entry Point
//!
//! This is a REST API server for multi-currency personal-finance ledgers.
//! It provides authenticated endpoints for managing accounts, recording
//! transactions (income, expense, transfer, exchange), correcting or
//! cancelling them after the fact, and fetching exchange-rate suggestions.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Admin key with SHA-256 hashing
//! - **Format**: JSON requests/responses, `{ "success": ..., ... }` envelope
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod currency;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post},
};
use tower_http::trace::TraceLayer;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Postgres connection pool
    pub pool: db::DbPool,
    /// Shared HTTP client for the FX API and webhook delivery
    pub http: reqwest::Client,
    /// Base URL of the exchange-rate provider
    pub fx_api_base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // One client for all outbound HTTP (FX quotes, webhook delivery)
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fx_timeout_secs))
        .build()?;

    let state = AppState {
        pool,
        http,
        fx_api_base_url: config.fx_api_base_url.clone(),
    };

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Account management routes
        .route("/api/v1/accounts", post(handlers::accounts::create_account))
        .route("/api/v1/accounts", get(handlers::accounts::list_accounts))
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::accounts::get_account),
        )
        .route(
            "/api/v1/accounts/{id}",
            delete(handlers::accounts::deactivate_account),
        )
        .route(
            "/api/v1/accounts/{id}/transactions",
            get(handlers::transactions::list_account_transactions),
        )
        // Transaction routes
        .route(
            "/api/v1/transactions/income",
            post(handlers::transactions::create_income),
        )
        .route(
            "/api/v1/transactions/expense",
            post(handlers::transactions::create_expense),
        )
        .route(
            "/api/v1/transactions/transfer",
            post(handlers::transactions::create_transfer),
        )
        .route(
            "/api/v1/transactions/exchange",
            post(handlers::transactions::create_exchange),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/api/v1/transactions/{id}",
            patch(handlers::transactions::update_transaction),
        )
        .route(
            "/api/v1/transactions/{id}/cancel",
            post(handlers::transactions::cancel_transaction),
        )
        // Currency and rate routes
        .route("/api/v1/currencies", get(handlers::rates::list_currencies))
        .route("/api/v1/rates", get(handlers::rates::get_rate))
        // Webhook routes
        .route("/api/v1/webhooks", post(handlers::webhooks::create_webhook))
        .route("/api/v1/webhooks", get(handlers::webhooks::list_webhooks))
        .route(
            "/api/v1/webhooks/{id}",
            delete(handlers::webhooks::delete_webhook),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
