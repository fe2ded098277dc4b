//! Error types for Peerlink

use thiserror::Error;

/// Main error type for Peerlink operations
#[derive(Error, Debug)]
pub enum P2pError {
    /// A public key had the wrong length or format. Raised before any I/O.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Authentication-tag mismatch or malformed seal/secretbox ciphertext
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Relay login failed. Fatal to `start()`; there is no built-in retry.
    #[error("Relay login failed: {0}")]
    RelayLoginFailed(String),

    /// Invalid configuration (e.g. empty relay candidate list)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error reported by the external relay protocol
    #[error("Relay error: {0}")]
    Relay(String),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using P2pError
pub type P2pResult<T> = Result<T, P2pError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = P2pError::RelayLoginFailed("relay.example.org: timeout".to_string());
        assert_eq!(
            format!("{}", err),
            "Relay login failed: relay.example.org: timeout"
        );
    }

    #[test]
    fn test_decryption_failed_display() {
        assert_eq!(format!("{}", P2pError::DecryptionFailed), "Decryption failed");
    }
}
