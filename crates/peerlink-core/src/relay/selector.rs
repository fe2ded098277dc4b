//! Deterministic, coordination-free relay selection
//!
//! Both peers must independently arrive at the same relay for a given
//! identity without negotiating. Each candidate hostname is hashed together
//! with a replica nonce, and the candidate whose digest is numerically
//! closest to the target hash wins.
//!
//! Distances are compared as arbitrary-precision integers: digest widths are
//! a protocol parameter and may exceed any fixed-width integer, so `u64`/
//! `u128` arithmetic would silently truncate.
//!
//! The reduction scans left to right and keeps the earlier candidate on an
//! exact tie. That tie-break is part of the interoperability contract with
//! existing deployments and must not change.

use num_bigint::BigUint;

use crate::error::{P2pError, P2pResult};
use crate::identity::address::short_hash;

fn parse_hex(hash: &str) -> P2pResult<BigUint> {
    BigUint::parse_bytes(hash.as_bytes(), 16)
        .ok_or_else(|| P2pError::Configuration(format!("hash is not hex: {}", hash)))
}

fn distance(a: &BigUint, b: &BigUint) -> BigUint {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

/// Select the relay for a target identity hash and replica nonce.
///
/// Pure and total over a non-empty candidate list: identical inputs always
/// yield the identical relay on every host that runs this code.
///
/// # Errors
///
/// Returns `P2pError::Configuration` if the candidate list is empty; a valid
/// configuration never hits this.
pub fn select_relay<'a>(
    target_hash: &str,
    nonce: &str,
    candidates: &'a [String],
) -> P2pResult<&'a str> {
    let target = parse_hex(target_hash)?;

    let mut best: Option<(&'a str, BigUint)> = None;
    for candidate in candidates {
        let digest = short_hash(format!("{}{}", candidate, nonce).as_bytes());
        let candidate_distance = distance(&target, &parse_hex(&digest)?);

        match &best {
            Some((_, best_distance)) if candidate_distance >= *best_distance => {}
            _ => best = Some((candidate, candidate_distance)),
        }
    }

    best.map(|(candidate, _)| candidate)
        .ok_or_else(|| P2pError::Configuration("relay candidate list is empty".to_string()))
}
