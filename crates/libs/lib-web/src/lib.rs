//! # Web Library
//!
//! HTTP handlers, chat sockets, middleware, and the identity service client.

pub mod chat;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod services;

pub use server::{create_router, start_server, AppState, ServerConfig};
