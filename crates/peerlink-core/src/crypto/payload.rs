//! Authenticated payload encryption and anonymous seal
//!
//! Symmetric messages use XChaCha20-Poly1305 with a fresh random nonce per
//! encryption.
//!
//! ## Wire Format
//!
//! Symmetric: `hex(nonce (24 bytes) || ciphertext || tag (16 bytes))`
//!
//! Seal: `hex(ephemeral_pub (32 bytes) || ciphertext || tag (16 bytes))` —
//! an ephemeral X25519 keypair is generated per message and its public half
//! shipped in the ciphertext, so nothing identifies the sender. Key and
//! nonce come from an HKDF-SHA256 schedule bound to both public keys.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{P2pError, P2pResult};
use crate::identity::keypair::{x25519_point, x25519_public_from_ed25519, IdentityKeypair};

/// Nonce size for XChaCha20-Poly1305 (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Size of the ephemeral public key shipped in a sealed payload
pub const EPHEMERAL_KEY_SIZE: usize = 32;

/// Smallest payload worth attempting to decrypt.
///
/// Anything shorter is treated by the dispatch layer as non-matching noise,
/// not as an error.
pub const MIN_PAYLOAD_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// HKDF info prefix binding the seal schedule to this protocol
const SEAL_CONTEXT: &[u8] = b"peerlink-seal-v1";

/// Encrypt a payload under a 32-byte session key.
///
/// Returns the hex wire form `nonce || ciphertext || tag`. A fresh nonce is
/// generated per call, so the same plaintext never repeats on the wire.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> P2pResult<String> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| P2pError::Crypto(format!("Encryption failed: {}", e)))?;

    let mut out = nonce_bytes.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

/// Decrypt a raw `nonce || ciphertext || tag` payload under a session key.
///
/// # Errors
///
/// Returns `P2pError::DecryptionFailed` if the payload is shorter than
/// `MIN_PAYLOAD_SIZE` or the authentication tag does not verify.
pub fn decrypt(key: &[u8; 32], payload: &[u8]) -> P2pResult<Vec<u8>> {
    if payload.len() < MIN_PAYLOAD_SIZE {
        return Err(P2pError::DecryptionFailed);
    }

    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(&payload[..NONCE_SIZE]);

    cipher
        .decrypt(nonce, &payload[NONCE_SIZE..])
        .map_err(|_| P2pError::DecryptionFailed)
}

/// Derive the AEAD key and nonce for a sealed payload.
///
/// Bound to both public keys so a ciphertext cannot be re-targeted.
fn seal_schedule(
    shared: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> ([u8; 32], [u8; NONCE_SIZE]) {
    let mut info = Vec::with_capacity(SEAL_CONTEXT.len() + 64);
    info.extend_from_slice(SEAL_CONTEXT);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut okm = [0u8; 32 + NONCE_SIZE];
    hkdf.expand(&info, &mut okm)
        .expect("okm length within HKDF limits");

    let mut key = [0u8; 32];
    let mut nonce = [0u8; NONCE_SIZE];
    key.copy_from_slice(&okm[..32]);
    nonce.copy_from_slice(&okm[32..]);
    (key, nonce)
}

/// Seal a payload to a recipient's Ed25519 public key.
///
/// Anyone holding the recipient's public key can produce this; only the
/// recipient's secret key can open it, and the ciphertext reveals nothing
/// about the sender. Used for the discovery handshake before session keys
/// are established.
pub fn seal(plaintext: &[u8], recipient_public_key: &[u8; 32]) -> P2pResult<String> {
    let recipient_x25519 = x25519_public_from_ed25519(recipient_public_key)?;

    let mut ephemeral_seed = [0u8; 32];
    getrandom::getrandom(&mut ephemeral_seed)
        .map_err(|e| P2pError::Crypto(format!("randomness unavailable: {}", e)))?;
    let ephemeral_secret = x25519_dalek::StaticSecret::from(ephemeral_seed);
    let ephemeral_public = *x25519_dalek::PublicKey::from(&ephemeral_secret).as_bytes();

    let shared = ephemeral_secret.diffie_hellman(&x25519_point(recipient_x25519));
    let (key, nonce) = seal_schedule(shared.as_bytes(), &ephemeral_public, &recipient_x25519);

    let cipher = XChaCha20Poly1305::new((&key).into());
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| P2pError::Crypto(format!("Seal failed: {}", e)))?;

    let mut out = ephemeral_public.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

/// Open a sealed payload with our own identity keypair.
///
/// # Errors
///
/// Returns `P2pError::DecryptionFailed` on truncation, tampering, or a
/// mismatched recipient key.
pub fn open(payload: &[u8], recipient: &IdentityKeypair) -> P2pResult<Vec<u8>> {
    if payload.len() < EPHEMERAL_KEY_SIZE + TAG_SIZE {
        return Err(P2pError::DecryptionFailed);
    }

    let mut ephemeral_public = [0u8; EPHEMERAL_KEY_SIZE];
    ephemeral_public.copy_from_slice(&payload[..EPHEMERAL_KEY_SIZE]);

    let recipient_public = recipient.x25519_public();
    let shared = recipient
        .x25519_secret()
        .diffie_hellman(&x25519_point(ephemeral_public));
    let (key, nonce) = seal_schedule(shared.as_bytes(), &ephemeral_public, &recipient_public);

    let cipher = XChaCha20Poly1305::new((&key).into());
    cipher
        .decrypt(XNonce::from_slice(&nonce), &payload[EPHEMERAL_KEY_SIZE..])
        .map_err(|_| P2pError::DecryptionFailed)
}
