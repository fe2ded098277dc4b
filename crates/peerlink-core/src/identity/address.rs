//! Identifier hashing and relay addressing
//!
//! Routing never uses a raw public key. Peers are addressed by a short
//! BLAKE2b digest of their identity public key, combined with the relay
//! hostname they rendezvous on:
//!
//! ```text
//! "@" + hex(blake2b(public_key, 5)) + ":" + relay_hostname
//! ```
//!
//! The same short digest doubles as the relay login user id and as the
//! target hash for relay selection, so both peers can compute each other's
//! addresses without any negotiation.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

use crate::error::{P2pError, P2pResult};

/// Output length of the short identifier digest (5 bytes)
pub const SHORT_HASH_SIZE: usize = 5;

/// Compute a BLAKE2b digest with the given output length.
pub(crate) fn blake2b_digest(data: &[u8], out_len: usize) -> Vec<u8> {
    let mut hasher = Blake2bVar::new(out_len).expect("valid BLAKE2b output length");
    hasher.update(data);
    let mut out = vec![0u8; out_len];
    hasher
        .finalize_variable(&mut out)
        .expect("output buffer matches digest length");
    out
}

/// Short identifier hash: hex of the 5-byte BLAKE2b digest of `data`.
pub fn short_hash(data: &[u8]) -> String {
    hex::encode(blake2b_digest(data, SHORT_HASH_SIZE))
}

/// Build the recipient address for a hashed identity on a relay.
pub fn recipient_string(recipient_hash: &str, relay_server: &str) -> String {
    format!("@{}:{}", recipient_hash, relay_server)
}

/// Decode a hex-encoded identity public key, enforcing the 32-byte length.
pub fn decode_public_key(public_key_hex: &str) -> P2pResult<[u8; 32]> {
    let bytes = hex::decode(public_key_hex)
        .map_err(|_| P2pError::InvalidPublicKey(format!("not hex: {}", public_key_hex)))?;
    bytes.as_slice().try_into().map_err(|_| {
        P2pError::InvalidPublicKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        ))
    })
}

/// Address prefix (`"@" + short hash`) for a raw identity public key.
///
/// Inbound message sender addresses are matched against this prefix.
pub fn address_prefix(public_key: &[u8; 32]) -> String {
    format!("@{}", short_hash(public_key))
}

/// Whether an inbound event's sender address belongs to the given identity.
pub fn is_sender(sender_address: &str, sender_public_key: &[u8; 32]) -> bool {
    sender_address.starts_with(&address_prefix(sender_public_key))
}

/// Deterministic sender identifier: base58check of the 5-byte BLAKE2b digest
/// of the raw public key.
///
/// # Errors
///
/// Returns `P2pError::InvalidPublicKey` if the decoded key is not exactly
/// 32 bytes.
pub fn sender_id(public_key_hex: &str) -> P2pResult<String> {
    let key = decode_public_key(public_key_hex)?;
    let digest = blake2b_digest(&key, SHORT_HASH_SIZE);
    Ok(bs58::encode(digest).with_check().into_string())
}
