//! # Chat State
//!
//! Shared dependencies of the chat sockets.

use super::bus::BroadcastBus;
use crate::services::IdentityGateway;
use lib_auth::TokenVerifier;
use lib_core::DbPool;
use std::sync::Arc;

/// Application state for the chat module
pub struct ChatAppState {
    pub db: DbPool,
    pub verifier: Arc<TokenVerifier>,
    pub identity: Arc<dyn IdentityGateway>,
    pub bus: Arc<dyn BroadcastBus>,
    /// Capacity of each session's outbound queues
    pub session_buffer: usize,
}

impl ChatAppState {
    pub fn new(
        db: DbPool,
        verifier: Arc<TokenVerifier>,
        identity: Arc<dyn IdentityGateway>,
        bus: Arc<dyn BroadcastBus>,
        session_buffer: usize,
    ) -> Self {
        Self {
            db,
            verifier,
            identity,
            bus,
            session_buffer: session_buffer.max(1),
        }
    }
}

impl axum::extract::FromRef<ChatAppState> for DbPool {
    fn from_ref(state: &ChatAppState) -> Self {
        state.db.clone()
    }
}
