//! # Services Layer
//!
//! Clients for systems this service talks to but does not own.
//!
//! ```text
//! Handlers (HTTP / WebSocket) → Services → External APIs
//! ```
//!
//! ## Module Organization
//!
//! - [`identity`] - Identity service client (profiles, user existence)

pub mod identity;

pub use identity::{HttpIdentityGateway, IdentityGateway, UserCheck};
