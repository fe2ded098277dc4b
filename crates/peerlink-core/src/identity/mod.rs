//! Identity layer: long-term keypairs, identifier hashes, and addresses
//!
//! Everything in this module is deterministic and offline. The keypair is
//! supplied (or generated) by the caller before a client is constructed and
//! outlives it; nothing here is ever persisted by this crate.

pub mod account;
pub mod address;
pub mod keypair;

pub use account::{account_identifier, Network, NetworkType};
pub use address::{recipient_string, sender_id, short_hash};
pub use keypair::IdentityKeypair;
