//! # Chat Backend
//!
//! Thin entry point that delegates to lib-web for server setup.
//!
//! `BIND_ADDRESS` (default `127.0.0.1:8000`) and `CORS_ORIGINS` (comma
//! separated) control the listener; everything else is read by
//! `lib_core::Config`.

use lib_utils::{get_env_opt, get_env_or};
use lib_web::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let defaults = ServerConfig::default();
    let allowed_origins = get_env_opt("CORS_ORIGINS")
        .map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or(defaults.allowed_origins);

    let config = ServerConfig {
        bind_address: get_env_or("BIND_ADDRESS", &defaults.bind_address),
        allowed_origins,
    };

    start_server(config).await
}
