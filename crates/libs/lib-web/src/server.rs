//! # Server Setup
//!
//! Server initialization, route registration, and HTTP server startup.
//!
//! This module provides the main server setup function that wires the store,
//! token verifier, identity client and broadcast bus together, builds the Axum
//! router, applies middleware, and starts the HTTP server.

// region: --- Imports
use crate::chat::{presence_socket, room_socket, BroadcastBus, ChatAppState, LocalBus, RedisBus};
use crate::handlers;
use crate::middleware::{log_requests, require_auth, stamp_req, RequestStamp};
use crate::services::{HttpIdentityGateway, IdentityGateway};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use lib_auth::TokenVerifier;
use lib_core::{create_pool, migrate, AppError, BusBackend, Config, DbPool};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
// endregion: --- Imports

/// Prefix of the Redis channels used by the broadcast bus.
const REDIS_CHANNEL_PREFIX: &str = "chat_bus";

// region: --- AppState
/// Application state shared across the REST routes
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub verifier: Arc<TokenVerifier>,
    pub identity: Arc<dyn IdentityGateway>,
}

impl axum::extract::FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.verifier)
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn IdentityGateway> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}
// endregion: --- AppState

// region: --- Server Configuration
/// Server configuration
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000")
    pub bind_address: String,
    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}
// endregion: --- Server Configuration

// region: --- Server Setup
fn init_tracing() -> anyhow::Result<String> {
    let log_level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();

    let filter = match log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {
            tracing_subscriber::EnvFilter::new(&log_level)
        }
        _ => tracing_subscriber::EnvFilter::new("info"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global tracing subscriber: {}", e))?;

    Ok(log_level)
}

/// Create the SQLite file's parent directory if it does not exist yet.
fn ensure_sqlite_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let db_path = db_path.trim_start_matches("//");
    if db_path.contains(":memory:") {
        return Ok(());
    }

    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            info!("Created database directory: {:?}", parent);
        }
    }
    Ok(())
}

/// Build the broadcast bus selected by `BROADCAST_BACKEND`.
async fn create_bus(config: &Config) -> anyhow::Result<Arc<dyn BroadcastBus>> {
    match config.broadcast_backend {
        BusBackend::Local => {
            info!("[BUS] Using in-process broadcast bus (single process only)");
            Ok(Arc::new(LocalBus::new()))
        }
        BusBackend::Redis => {
            info!("[BUS] Connecting to Redis at {}", config.redis_url);
            let bus = RedisBus::connect(&config.redis_url, REDIS_CHANNEL_PREFIX).await?;
            Ok(Arc::new(bus))
        }
    }
}

/// Initialize and start the HTTP server
///
/// # Errors
///
/// This function will return an error if:
/// - Configuration loading or validation fails
/// - The token verifier cannot be built from the configured keys
/// - Database connection or migrations fail
/// - The Redis bus is selected and cannot connect
/// - Server binding fails
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let log_level = init_tracing()?;
    info!(" CHAT BACKEND STARTING");
    info!(" Log level: {}", log_level);

    dotenvy::dotenv().ok();

    info!("Loading configuration...");
    let app_config = Config::from_env().map_err(AppError::Config)?;
    app_config.validate().map_err(AppError::Config)?;

    let verifier = TokenVerifier::new(
        &app_config.jwt_algorithm,
        app_config.jwt_secret.as_deref(),
        app_config.jwt_public_key.as_deref(),
    )?;
    info!("[AUTH] Verifying tokens with {:?}", verifier.algorithm());

    info!("Database URL: {}", app_config.database_url);
    ensure_sqlite_dir(&app_config.database_url)?;
    let pool = create_pool(&app_config.database_url).await?;
    migrate(&pool).await?;
    info!(" Migrations complete");

    let identity = HttpIdentityGateway::from_config(&app_config)?;
    info!(
        "[IDENTITY] {} (timeout {}s, fail-open {})",
        app_config.auth_api_url, app_config.identity_timeout_secs, app_config.identity_fail_open
    );

    let bus = create_bus(&app_config).await?;

    let verifier = Arc::new(verifier);
    let identity: Arc<dyn IdentityGateway> = Arc::new(identity);

    let chat_state = Arc::new(ChatAppState::new(
        pool.clone(),
        Arc::clone(&verifier),
        Arc::clone(&identity),
        bus,
        app_config.session_buffer,
    ));

    let state = AppState {
        db: pool,
        config: app_config,
        verifier,
        identity,
    };

    let app = create_router(state, chat_state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(" SERVER READY: http://{}", config.bind_address);
    log_server_info();

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router with all routes
pub fn create_router(
    state: AppState,
    chat_state: Arc<ChatAppState>,
    allowed_origins: &[String],
) -> Router {
    use axum::http::{HeaderValue, Method};

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let api = Router::new()
        .route("/rooms", post(handlers::rooms::create_room))
        .route("/rooms/{id}/messages", get(handlers::rooms::list_messages))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.verifier),
            require_auth,
        ));

    Router::new()
        .nest("/api/chat", api)
        .route("/health", get(|| async { "OK" }))
        .merge(
            Router::new()
                .route("/ws/chat/{room_id}", get(room_socket))
                .route("/ws/presence", get(presence_socket))
                .with_state(chat_state),
        )
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Route not found") })
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestStamp>()
                        .map(|s| s.id.clone())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri().path(),
                    )
                },
            ),
        )
        .layer(middleware::from_fn(log_requests))
        // Stamp before logging and span creation
        .layer(middleware::from_fn(stamp_req))
        .layer(cors)
}

/// Log server information
fn log_server_info() {
    info!(" CHAT:");
    info!("   • WS   /ws/chat/{{room_id}}?token={{jwt}}");
    info!("   • WS   /ws/presence?token={{jwt}}");
    info!(" REST:");
    info!("   • POST /api/chat/rooms");
    info!("   • GET  /api/chat/rooms/{{id}}/messages");
    info!(" HEALTH:");
    info!("   • GET  /health");
}
// endregion: --- Server Setup
