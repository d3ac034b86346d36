//! # Chat Module
//!
//! Real-time messaging between the two participants of a room.
//!
//! ```text
//! GET /ws/chat/{room_id}  ── handshake (token, membership) ──> RoomSession
//!                                                               │  join chat_{room_id}
//!   client frames ──> InboundEvent ──> store / BroadcastBus ────┘
//!   BroadcastBus ──> GroupEvent ──> OutboundEvent ──> client
//! ```
//!
//! `GET /ws/presence` joins the global presence group and relays status
//! announcements between all connected users.

pub mod bus;
pub mod events;
pub mod handlers;
pub mod session;
pub mod state;

pub use bus::{BroadcastBus, BusError, LocalBus, RedisBus};
pub use events::{GroupEvent, InboundEvent, OutboundEvent};
pub use handlers::{presence_socket, room_socket};
pub use state::ChatAppState;
