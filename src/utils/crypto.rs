//! Crypto Utilities
//!
//! Hash and encoding helpers shared by the account-model wallets.

use crate::error::{WalletError, WalletResult};
use bitcoin::hashes::{sha256d, Hash};
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (used for Ethereum addresses)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed Ethereum address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Last 20 bytes of keccak256 over an uncompressed public key without its
/// 0x04 tag
pub fn account_address_bytes(uncompressed: &[u8; 65]) -> [u8; 20] {
    let hash = keccak256(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

/// Base58 with a 4-byte double-SHA256 checksum
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = sha256d::Hash::hash(payload);
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Decode base58check, verifying and stripping the checksum
pub fn base58check_decode(encoded: &str) -> WalletResult<Vec<u8>> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| WalletError::invalid_input(format!("invalid base58: {}", e)))?;
    if decoded.len() < 5 {
        return Err(WalletError::invalid_input("base58 payload too short"));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = sha256d::Hash::hash(payload);
    if checksum != &expected[..4] {
        return Err(WalletError::invalid_input("base58 checksum mismatch"));
    }
    Ok(payload.to_vec())
}
