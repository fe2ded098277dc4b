//! # peerlink-core
//!
//! Relay-mediated, end-to-end encrypted channels between two long-term
//! Ed25519 identities. Neither party needs a reachable address: both sides
//! independently select the same rendezvous relay from a static candidate
//! list, discover each other with a sealed channel-open handshake, and then
//! exchange messages under per-direction session keys.
//!
//! ## Architecture
//!
//! - [`identity`]: long-term keypairs, identifier hashes, recipient
//!   addresses, and network-scoped account identifiers
//! - [`crypto`]: session-key derivation (Ed25519 to X25519 Diffie-Hellman
//!   with a BLAKE2b transcript) and authenticated payload encryption
//! - [`relay`]: deterministic relay selection, login-credential derivation,
//!   and the connection wrapper over an external pub/sub room protocol
//! - [`client`]: the [`P2pClient`] orchestrator tying replicas, discovery,
//!   and listener dispatch together
//!
//! ## Wire Format
//!
//! Steady-state messages are hex-encoded `nonce(24) || ciphertext || tag(16)`
//! under XChaCha20-Poly1305. Channel-open payloads are anonymously sealed:
//! hex-encoded `ephemeral_pk(32) || ciphertext || tag(16)`, decryptable only
//! by the addressed identity.
//!
//! ## Delivery Model
//!
//! Every message is broadcast over `replication_count x connections` paths.
//! Duplicates are expected and left to the consumer; there is no ordering
//! guarantee across paths and no delivery acknowledgement.

pub mod client;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod relay;

pub use client::{HandshakeInfo, P2pClient, P2pConfig, DEFAULT_RELAY_SERVERS};
pub use error::{P2pError, P2pResult};
pub use identity::{account_identifier, IdentityKeypair, Network, NetworkType};
pub use relay::{RelayClient, RelayConnector, RelayEvent};
