//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-level errors go through
//! `activation::ActivationError`.

use activation::application::config::TokenFormat;
use activation::{ActivationConfig, PgActivationRepository, activation_router, unavailable_router};
use anyhow::Context;
use axum::{
    Json, Router, http,
    http::{Method, header},
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,activation=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    tracing::info!(?config, "Activation configuration loaded");

    // Persistence failures at startup degrade the service instead of exiting
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;
    let (activation, database_up) = match connect(&database_url).await {
        Ok(pool) => (
            activation_router(PgActivationRepository::new(pool), config),
            true,
        ),
        Err(e) => {
            tracing::error!(
                error = %e,
                "Database unavailable, activation routes will answer 503"
            );
            (unavailable_router(), false)
        }
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]));

    let health = HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        database: database_up,
    };

    // Build router
    let api = Router::new()
        .route("/health", get(move || async move { Json(health) }))
        .merge(activation);

    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:31113".to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Connect to PostgreSQL and apply pending migrations
async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");
    Ok(pool)
}

/// Build the activation configuration from the environment
fn load_config() -> anyhow::Result<ActivationConfig> {
    let mut config = if cfg!(debug_assertions) {
        ActivationConfig::development()
    } else {
        ActivationConfig::default()
    };

    if let Ok(secret) = env::var("CODE_SECRET_KEY")
        && !secret.trim().is_empty()
    {
        config.code_secret = secret;
    }
    if config.uses_legacy_secret() {
        if !cfg!(debug_assertions) {
            anyhow::bail!("CODE_SECRET_KEY must be set to a non-legacy secret in production");
        }
        tracing::warn!("CODE_SECRET_KEY not set, using the legacy insecure checksum secret");
    }

    if let Ok(key) = env::var("ADMIN_API_KEY") {
        config.admin_api_key = Some(key).filter(|k| !k.trim().is_empty());
    }
    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set, admin routes are locked");
    }

    // A token secret switches issued tokens to the signed format
    if let Ok(secret_b64) = env::var("TOKEN_SECRET") {
        let secret_bytes = general_purpose::STANDARD
            .decode(secret_b64.trim())
            .context("TOKEN_SECRET must be base64")?;
        config.token_secret = secret_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("TOKEN_SECRET must decode to 32 bytes"))?;
        config.token_format = TokenFormat::Signed;
    }

    Ok(config)
}
