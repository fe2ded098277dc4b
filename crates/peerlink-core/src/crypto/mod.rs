//! Cryptographic layer: per-peer session keys and payload encryption
//!
//! Two primitives cover the whole wire protocol:
//!
//! - [`session`]: derives asymmetric-ordered send/receive keys for a peer
//!   from the long-term identity keys, so each direction of a channel uses
//!   its own symmetric key.
//! - [`payload`]: authenticated symmetric encryption for steady-state
//!   messages, plus anonymous "seal" encryption used to bootstrap discovery
//!   before session keys exist.

pub mod payload;
pub mod session;

pub use payload::{decrypt, encrypt, open, seal, MIN_PAYLOAD_SIZE, NONCE_SIZE, TAG_SIZE};
pub use session::{requester_keys, responder_keys, SessionKeys};
