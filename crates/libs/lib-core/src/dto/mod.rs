//! # Data Transfer Objects (DTOs)
//!
//! Request and response bodies of the `/api/chat` REST surface.

pub mod rooms;

pub use rooms::*;
