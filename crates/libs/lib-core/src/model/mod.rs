//! # Model Layer
//!
//! Persisted entities and their store adapter.

pub mod store;
