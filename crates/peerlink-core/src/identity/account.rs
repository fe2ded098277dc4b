//! Deterministic account identifiers
//!
//! An account identifier is a stable fingerprint of an (address, network)
//! pair: base58check of a 16-byte BLAKE2b digest over
//! `address + "-" + type [+ "-name:" + name] [+ "-rpc:" + rpcUrl]`.
//!
//! The `name:`/`rpc:` tag prefixes keep the digest unambiguous: the same
//! literal string used as a network name and as an RPC URL yields different
//! identifiers.

use serde::{Deserialize, Serialize};

use crate::identity::address::blake2b_digest;

/// Output length of the account identifier digest (16 bytes)
const ACCOUNT_HASH_SIZE: usize = 16;

/// Known network types an account can live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Delphinet,
    Ghostnet,
    Custom,
}

impl NetworkType {
    /// Canonical lowercase string used in the identifier digest
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Delphinet => "delphinet",
            NetworkType::Ghostnet => "ghostnet",
            NetworkType::Custom => "custom",
        }
    }
}

/// A network an account is scoped to.
///
/// `name` and `rpc_url` are only meaningful for custom deployments but are
/// allowed on any type; both feed the account identifier when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "rpcUrl", skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl Network {
    /// Create a network with just a type
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            network_type,
            name: None,
            rpc_url: None,
        }
    }

    /// Set a human-readable network name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the RPC endpoint URL
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }
}

/// Compute the deterministic account identifier for an address on a network.
pub fn account_identifier(address: &str, network: &Network) -> String {
    let mut parts: Vec<String> = vec![address.to_string(), network.network_type.as_str().to_string()];
    if let Some(name) = &network.name {
        parts.push(format!("name:{}", name));
    }
    if let Some(rpc_url) = &network.rpc_url {
        parts.push(format!("rpc:{}", rpc_url));
    }

    let digest = blake2b_digest(parts.join("-").as_bytes(), ACCOUNT_HASH_SIZE);
    bs58::encode(digest).with_check().into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "tz1d75oB6T4zUMexzkr5WscGktZ1Nss1JrT7";

    #[test]
    fn test_account_identifier_mainnet() {
        let id = account_identifier(ADDRESS, &Network::new(NetworkType::Mainnet));
        assert_eq!(id, "2PcnkiqnqcQcq3Wko1yjDoqGjgL5");
    }

    #[test]
    fn test_account_identifier_delphinet() {
        let id = account_identifier(ADDRESS, &Network::new(NetworkType::Delphinet));
        assert_eq!(id, "2xjLkeC8LfPm1b3s4rDM6P2miJcD");
    }

    #[test]
    fn test_account_identifier_custom() {
        let network = Network::new(NetworkType::Custom)
            .with_name("Test")
            .with_rpc_url("http://localhost:8080/");
        let id = account_identifier(ADDRESS, &network);
        assert_eq!(id, "3GVG5Ggv21UMyD5qph2MCoHYtfFm");
    }

    #[test]
    fn test_account_identifier_stable_across_calls() {
        let network = Network::new(NetworkType::Mainnet);
        assert_eq!(
            account_identifier(ADDRESS, &network),
            account_identifier(ADDRESS, &network)
        );
    }

    #[test]
    fn test_differs_between_network_names() {
        let a = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_name("Mainnet 1"),
        );
        let b = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_name("Mainnet 2"),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_differs_between_rpc_urls() {
        let a = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_rpc_url("http://localhost/"),
        );
        let b = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_rpc_url("http://localhost:8080/"),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_name_and_rpc_url_are_disambiguated() {
        // The same literal string as a name vs. as an RPC URL must not collide.
        let a = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_name("http://localhost:8080/"),
        );
        let b = account_identifier(
            ADDRESS,
            &Network::new(NetworkType::Mainnet).with_rpc_url("http://localhost:8080/"),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_network_serde_shape() {
        let network = Network::new(NetworkType::Custom).with_rpc_url("http://localhost:8080/");
        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["type"], "custom");
        assert_eq!(json["rpcUrl"], "http://localhost:8080/");
        assert!(json.get("name").is_none());
    }
}
