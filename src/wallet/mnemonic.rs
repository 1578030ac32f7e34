//! BIP-39 mnemonic and seed handling

use crate::error::{WalletError, WalletResult};
use crate::wallet::hd::Seed;
use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Generate `bits` of OS entropy; `bits` must be a multiple of 32 in 128..=256
pub fn new_entropy(bits: usize) -> WalletResult<Zeroizing<Vec<u8>>> {
    if bits % 32 != 0 || !(128..=256).contains(&bits) {
        return Err(WalletError::invalid_input(format!(
            "entropy must be 128-256 bits in steps of 32, got {}",
            bits
        )));
    }
    let mut entropy = Zeroizing::new(vec![0u8; bits / 8]);
    OsRng.fill_bytes(&mut entropy);
    Ok(entropy)
}

/// Fresh English mnemonic backed by `bits` of entropy
pub fn new_mnemonic(bits: usize) -> WalletResult<String> {
    let entropy = new_entropy(bits)?;
    mnemonic_from_entropy(&entropy)
}

pub fn mnemonic_from_entropy(entropy: &[u8]) -> WalletResult<String> {
    Ok(Mnemonic::from_entropy(entropy)?.to_string())
}

/// Entropy behind a mnemonic, validating its checksum
pub fn entropy_from_mnemonic(mnemonic: &str) -> WalletResult<Zeroizing<Vec<u8>>> {
    let parsed = Mnemonic::parse(clean_mnemonic(mnemonic).as_str())?;
    Ok(Zeroizing::new(parsed.to_entropy()))
}

/// Validate a mnemonic and stretch it with `passphrase` into a seed
pub fn seed_from_mnemonic(mnemonic: &str, passphrase: &str) -> WalletResult<Seed> {
    let cleaned = clean_mnemonic(mnemonic);
    if cleaned.trim().is_empty() {
        return Err(WalletError::invalid_input("mnemonic is required"));
    }
    let parsed = Mnemonic::parse(cleaned.as_str())?;
    let seed = Zeroizing::new(parsed.to_seed(passphrase));
    Seed::new(&seed[..])
}

/// Strip line breaks pasted along with the phrase
fn clean_mnemonic(mnemonic: &str) -> Zeroizing<String> {
    Zeroizing::new(mnemonic.chars().filter(|c| *c != '\n' && *c != '\r').collect())
}
