//! Axum-based HTTP gateway for the inventory service.
//!
//! Public routes: `/`, `/health`, `/auth/login`. Everything under `/store`
//! requires a bearer token and the route's minimum role.

pub mod pipeline;
pub mod stores;

use crate::auth::{Authenticator, Authorizer, StaticUserDirectory, TokenSigner, UserDirectory};
use crate::config::{Config, GatewayConfig};
use crate::error::{ApiError, INTERNAL_MESSAGE};
use crate::inventory::InventoryStore;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::any::Any;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<InventoryStore>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    pub fn new(
        inventory: Arc<InventoryStore>,
        directory: Arc<dyn UserDirectory>,
        signer: TokenSigner,
        config: &Config,
    ) -> Self {
        Self {
            inventory,
            authenticator: Arc::new(Authenticator::new(directory.clone(), signer)),
            authorizer: Arc::new(Authorizer::new(directory, config.auth.unlisted_identity)),
        }
    }

    /// Open the database and build the directory and token signer from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let inventory = if config.store.db_path == ":memory:" {
            InventoryStore::open_in_memory()
        } else {
            InventoryStore::open(
                &db_path,
                config.store.pool_size,
                config.store.busy_timeout_ms,
            )
        }
        .with_context(|| format!("Failed to open inventory database {}", db_path.display()))?;

        let directory = build_directory(config)?;

        let signer = match config.auth.token_secret {
            Some(ref secret) => TokenSigner::new(secret.as_bytes(), config.auth.token_ttl_secs),
            None => {
                tracing::warn!(
                    "auth.token_secret is not set; using a per-process key. \
                     Tokens will not survive a restart."
                );
                TokenSigner::with_generated_secret(config.auth.token_ttl_secs)
            }
        };

        Ok(Self::new(Arc::new(inventory), directory, signer, config))
    }
}

fn build_directory(config: &Config) -> Result<Arc<dyn UserDirectory>> {
    if config.auth.users.is_empty() && config.auth.seed_demo_users {
        tracing::warn!("No users configured; seeding demo accounts alice/bob/admin");
        let dir = StaticUserDirectory::with_demo_users().context("Failed to hash demo passwords")?;
        return Ok(Arc::new(dir));
    }
    let dir = StaticUserDirectory::from_entries(&config.auth.users);
    if dir.is_empty() {
        tracing::warn!("User directory is empty; every login will be rejected");
    } else {
        tracing::info!(users = dir.len(), "User directory loaded");
    }
    Ok(Arc::new(dir))
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(handle_welcome))
        .route("/health", get(handle_health))
        .route("/auth/login", post(handle_login))
        .route(
            "/store",
            get(stores::handle_list_stores).post(stores::handle_create_store),
        )
        .route(
            "/store/",
            get(stores::handle_list_stores).post(stores::handle_create_store),
        )
        .route("/store/{name}/item", post(stores::handle_create_item))
        .route(
            "/store/{name}",
            axum::routing::put(stores::handle_rename_store)
                .patch(stores::handle_rename_store)
                .delete(stores::handle_delete_store),
        )
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

/// Run the HTTP gateway until ctrl-c.
pub async fn run_gateway(config: Config) -> Result<()> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;

    if is_public_bind(&host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the inventory API would be reachable from other hosts.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config.gateway);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let actual = listener.local_addr()?;

    println!("Storehouse gateway listening on http://{actual}");
    println!("  POST   /auth/login           exchange credentials for a token");
    println!("  GET    /store                list stores (reader)");
    println!("  POST   /store                create store (writer)");
    println!("  POST   /store/{{name}}/item    add item (writer)");
    println!("  PUT    /store/{{name}}         rename store (writer)");
    println!("  DELETE /store/{{name}}         delete store (admin)");
    println!("  GET    /health               health check");
    tracing::info!(%actual, "Gateway started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
}

/// True unless the host is a loopback address or `localhost`.
pub fn is_public_bind(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => true,
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "message": INTERNAL_MESSAGE })),
    )
        .into_response()
}

// ══════════════════════════════════════════════════════════════════════════════
// PUBLIC HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /
async fn handle_welcome() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Welcome!" }))
}

/// GET /health — always public
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /auth/login — exchange username + password for a bearer token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let required = || ApiError::InvalidArgument("username and password required".into());
    let Ok(Json(body)) = body else {
        return Err(required());
    };
    let field = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    };
    let (Some(username), Some(password)) = (field("username"), field("password")) else {
        return Err(required());
    };

    let authenticator = state.authenticator.clone();
    let grant = tokio::task::spawn_blocking(move || authenticator.login(&username, &password))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("login task failed: {e}")))??;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "access_token": grant.access_token,
            "user": {
                "username": grant.username,
                "role": grant.role.as_str(),
            },
        })),
    ))
}
