//! Long-term Ed25519 identity keypair
//!
//! The identity key signs relay logins and anchors session-key derivation.
//! For key exchange, both halves are converted to their X25519 form: the
//! secret via SHA-512 of the seed (scalar clamping happens inside
//! x25519-dalek), the public via the Edwards-to-Montgomery map. The 64-byte
//! secret form (`seed || public`) is supported for interoperability with
//! callers that store keys in that layout.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};

use crate::error::{P2pError, P2pResult};
use crate::identity::address::blake2b_digest;

/// Long-term identity keypair (Ed25519)
#[derive(Clone)]
pub struct IdentityKeypair {
    signing: SigningKey,
}

impl IdentityKeypair {
    /// Generate a new random identity keypair
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).expect("Failed to get random bytes");
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Derive a deterministic keypair from a seed string.
    ///
    /// The Ed25519 seed is the 32-byte BLAKE2b digest of the string.
    pub fn from_seed(seed: &str) -> Self {
        let digest = blake2b_digest(seed.as_bytes(), 32);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self {
            signing: SigningKey::from_bytes(&bytes),
        }
    }

    /// Reconstruct a keypair from secret bytes.
    ///
    /// Accepts either the 32-byte seed or the 64-byte `seed || public` form.
    ///
    /// # Errors
    ///
    /// Returns `P2pError::InvalidPublicKey` if the length is wrong or the
    /// trailing public half does not match the seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> P2pResult<Self> {
        match bytes.len() {
            32 => {
                let seed: [u8; 32] = bytes.try_into().expect("length checked");
                Ok(Self {
                    signing: SigningKey::from_bytes(&seed),
                })
            }
            64 => {
                let seed: [u8; 32] = bytes[..32].try_into().expect("length checked");
                let signing = SigningKey::from_bytes(&seed);
                if signing.verifying_key().as_bytes() != &bytes[32..] {
                    return Err(P2pError::InvalidPublicKey(
                        "public half does not match seed".to_string(),
                    ));
                }
                Ok(Self { signing })
            }
            n => Err(P2pError::InvalidPublicKey(format!(
                "secret key must be 32 or 64 bytes, got {}",
                n
            ))),
        }
    }

    /// Export the secret in the 64-byte `seed || public` layout
    pub fn to_secret_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.signing.as_bytes());
        out[32..].copy_from_slice(self.signing.verifying_key().as_bytes());
        out
    }

    /// The Ed25519 verifying key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Raw 32-byte public key
    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.signing.verifying_key().as_bytes()
    }

    /// Hex-encoded public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Sign a message with the identity key
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// X25519 scalar form of the secret half.
    ///
    /// SHA-512 of the seed, truncated to 32 bytes; x25519-dalek applies the
    /// scalar clamping during key agreement.
    pub fn x25519_secret(&self) -> X25519StaticSecret {
        let digest = Sha512::digest(self.signing.as_bytes());
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&digest[..32]);
        X25519StaticSecret::from(scalar)
    }

    /// X25519 point form of our own public half
    pub fn x25519_public(&self) -> [u8; 32] {
        self.signing.verifying_key().to_montgomery().to_bytes()
    }
}

/// Convert a peer's Ed25519 public key to its X25519 point form.
///
/// # Errors
///
/// Returns `P2pError::InvalidPublicKey` if the bytes are not a valid
/// Edwards point.
pub fn x25519_public_from_ed25519(public_key: &[u8; 32]) -> P2pResult<[u8; 32]> {
    let verifying = VerifyingKey::from_bytes(public_key)
        .map_err(|e| P2pError::InvalidPublicKey(format!("not a valid Ed25519 point: {}", e)))?;
    Ok(verifying.to_montgomery().to_bytes())
}

impl std::fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeypair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Build an `X25519PublicKey` from raw point bytes
pub(crate) fn x25519_point(bytes: [u8; 32]) -> X25519PublicKey {
    X25519PublicKey::from(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_generate_produces_distinct_keys() {
        let a = IdentityKeypair::generate();
        let b = IdentityKeypair::generate();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = IdentityKeypair::from_seed("server");
        let b = IdentityKeypair::from_seed("server");
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());

        let c = IdentityKeypair::from_seed("client");
        assert_ne!(a.public_key_bytes(), c.public_key_bytes());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = IdentityKeypair::generate();
        let message = b"login:12345";
        let signature = keypair.sign(message);
        assert!(keypair.verifying_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_secret_bytes_roundtrip() {
        let keypair = IdentityKeypair::generate();
        let bytes = keypair.to_secret_bytes();
        assert_eq!(bytes.len(), 64);

        let recovered = IdentityKeypair::from_secret_bytes(&bytes).unwrap();
        assert_eq!(recovered.public_key_bytes(), keypair.public_key_bytes());

        // Seed-only form works too
        let from_seed = IdentityKeypair::from_secret_bytes(&bytes[..32]).unwrap();
        assert_eq!(from_seed.public_key_bytes(), keypair.public_key_bytes());
    }

    #[test]
    fn test_from_secret_bytes_rejects_bad_input() {
        assert!(IdentityKeypair::from_secret_bytes(&[0u8; 33]).is_err());

        // Mismatched public half
        let keypair = IdentityKeypair::generate();
        let mut bytes = keypair.to_secret_bytes();
        bytes[40] ^= 0xff;
        assert!(matches!(
            IdentityKeypair::from_secret_bytes(&bytes),
            Err(P2pError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_x25519_conversion_agrees_for_both_halves() {
        // Converting our own public key through the peer-facing path must
        // match the direct Montgomery form.
        let keypair = IdentityKeypair::generate();
        let direct = keypair.x25519_public();
        let via_peer_path = x25519_public_from_ed25519(&keypair.public_key_bytes()).unwrap();
        assert_eq!(direct, via_peer_path);

        // And the converted secret must correspond to the converted public.
        let derived = X25519PublicKey::from(&keypair.x25519_secret());
        assert_eq!(derived.as_bytes(), &direct);
    }
}
