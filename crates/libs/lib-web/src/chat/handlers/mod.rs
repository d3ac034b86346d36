//! # Chat Handlers
//!
//! WebSocket upgrade handlers. Every check runs before the upgrade, so a
//! rejected handshake is a plain HTTP response.

// region: --- Modules
pub mod utils;
pub mod room_socket;
pub mod presence;
// endregion: --- Modules

// region: --- Re-exports
pub use room_socket::room_socket;
pub use presence::presence_socket;
// endregion: --- Re-exports
