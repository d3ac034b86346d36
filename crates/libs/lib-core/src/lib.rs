//! # Core Library
//!
//! Configuration, error type, persisted room/message models and the store
//! adapter used by the chat service.

pub mod config;
pub mod error;
pub mod model;
pub mod dto;

// Re-export commonly used types
pub use config::{BusBackend, Config};
pub use error::{AppError, Result};
pub use model::store::{create_pool, migrate, DbPool};
