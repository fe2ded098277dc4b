//! Per-peer session key derivation
//!
//! Both identity keypairs are converted to X25519 form, a shared secret is
//! computed, and a BLAKE2b-512 transcript hash is split into the two
//! directional keys. The transcript order differs by role:
//!
//! ```text
//! responder: h = blake2b512(shared || peer_pub || self_pub)   send = h[..32], receive = h[32..]
//! requester: h = blake2b512(shared || self_pub || peer_pub)   receive = h[..32], send = h[32..]
//! ```
//!
//! For a matching pair of identities this guarantees
//! `responder.send == requester.receive` and `responder.receive ==
//! requester.send`, which is what lets each side encrypt with `send` and
//! decrypt with `receive` without further negotiation.

use blake2::{Blake2b512, Digest};

use crate::error::P2pResult;
use crate::identity::address::decode_public_key;
use crate::identity::keypair::{x25519_point, x25519_public_from_ed25519, IdentityKeypair};

/// Directional symmetric keys for one (self, peer) pairing.
///
/// Not persisted; lifetime is the listener registration that needed them.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    /// Key used to encrypt messages to the peer
    pub send: [u8; 32],
    /// Key used to decrypt messages from the peer
    pub receive: [u8; 32],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

fn transcript(
    shared: &[u8; 32],
    first_public: &[u8; 32],
    second_public: &[u8; 32],
) -> [u8; 64] {
    let digest = Blake2b512::new()
        .chain_update(shared)
        .chain_update(first_public)
        .chain_update(second_public)
        .finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

fn derive(
    keypair: &IdentityKeypair,
    peer_public_key_hex: &str,
    responder: bool,
) -> P2pResult<SessionKeys> {
    let peer_ed25519 = decode_public_key(peer_public_key_hex)?;
    let peer_public = x25519_public_from_ed25519(&peer_ed25519)?;
    let self_public = keypair.x25519_public();

    let shared = keypair
        .x25519_secret()
        .diffie_hellman(&x25519_point(peer_public));

    let h = if responder {
        transcript(shared.as_bytes(), &peer_public, &self_public)
    } else {
        transcript(shared.as_bytes(), &self_public, &peer_public)
    };

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&h[..32]);
    second.copy_from_slice(&h[32..]);

    Ok(if responder {
        SessionKeys {
            send: first,
            receive: second,
        }
    } else {
        SessionKeys {
            send: second,
            receive: first,
        }
    })
}

/// Derive session keys for the responder side (the party listening for an
/// already-known sender).
pub fn responder_keys(
    keypair: &IdentityKeypair,
    peer_public_key_hex: &str,
) -> P2pResult<SessionKeys> {
    derive(keypair, peer_public_key_hex, true)
}

/// Derive session keys for the requester side (the party sending to a peer).
pub fn requester_keys(
    keypair: &IdentityKeypair,
    peer_public_key_hex: &str,
) -> P2pResult<SessionKeys> {
    derive(keypair, peer_public_key_hex, false)
}
