//! Relay layer: deterministic relay selection and the pub/sub wrapper
//!
//! The relay server speaks an external pub/sub room protocol (login, room
//! membership, text events). This module consumes that protocol through the
//! [`protocol::RelayClient`] trait and layers the core-owned logic on top:
//! coordination-free relay selection, login-credential derivation, invite
//! auto-join, and find-or-create room routing.

pub mod connection;
pub mod protocol;
pub mod selector;

pub use connection::RelayConnection;
pub use protocol::{
    login_credentials, EventId, LoginCredentials, RelayClient, RelayConnector, RelayEvent, RoomHandle,
    RoomId,
};
pub use selector::select_relay;
