//! Tron wallets
//!
//! Same key hashing as Ethereum, then base58check over `0x41 || hash[12..]`.

use crate::chain::{self, account_chain_ids, AccountChainParams};
use crate::error::{WalletError, WalletResult};
use crate::types::Symbol;
use crate::utils::crypto::{account_address_bytes, base58check_decode, base58check_encode};
use crate::wallet::derivation_path::DerivationPath;
use crate::wallet::ethereum::{parse_hex_secret, sign_recoverable};
use crate::wallet::hd::{master_node, DerivationMode, KeyNode, Seed};
use crate::wallet::ChainWallet;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

/// Version byte of Tron addresses
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

#[derive(Clone)]
pub struct TronWallet {
    chain: &'static AccountChainParams,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl std::fmt::Debug for TronWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TronWallet")
            .field("address", &self.address())
            .finish()
    }
}

impl TronWallet {
    pub fn from_secret(secret_key: SecretKey) -> WalletResult<Self> {
        let chain = chain::account_chain(Symbol::Trx, account_chain_ids::TRON)?;
        let secp = Secp256k1::signing_only();
        Ok(Self {
            chain,
            secret_key,
            public_key: secret_key.public_key(&secp),
        })
    }

    pub fn from_node(node: &KeyNode) -> WalletResult<Self> {
        let secret = node
            .private_key()
            .ok_or_else(|| WalletError::derivation("key node has no private key"))?;
        Self::from_secret(*secret)
    }

    pub fn from_path(seed: &Seed, path: &DerivationPath, mode: DerivationMode) -> WalletResult<Self> {
        let chain = chain::account_chain(Symbol::Trx, account_chain_ids::TRON)?;
        let master = master_node(seed, chain.hd_seed_key)?;
        let node = master.derive_path(path, mode)?;
        Self::from_node(&node)
    }

    pub fn from_private_key_hex(private_key: &str) -> WalletResult<Self> {
        Self::from_secret(parse_hex_secret(private_key)?)
    }

    /// `0x41` followed by the 20-byte account hash
    pub fn address_bytes(&self) -> [u8; 21] {
        let mut out = [0u8; 21];
        out[0] = self.chain.address_prefix.unwrap_or(TRON_ADDRESS_PREFIX);
        out[1..].copy_from_slice(&account_address_bytes(&self.public_key.serialize_uncompressed()));
        out
    }

    /// Hex form (`41...`) used by node HTTP APIs
    pub fn hex_address(&self) -> String {
        hex::encode(self.address_bytes())
    }
}

impl ChainWallet for TronWallet {
    fn symbol(&self) -> Symbol {
        Symbol::Trx
    }

    fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    fn address(&self) -> String {
        base58check_encode(&self.address_bytes())
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    fn private_key_export(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// 65-byte `r || s || v` with `v` in {0, 1}
    fn sign_hash(&self, digest: &[u8; 32]) -> WalletResult<Vec<u8>> {
        Ok(sign_recoverable(&self.secret_key, digest).to_vec())
    }
}

/// Decode a base58 Tron address into its 21 raw bytes
pub fn decode_tron_address(address: &str) -> WalletResult<[u8; 21]> {
    let payload = base58check_decode(address.trim())?;
    if payload.len() != 21 || payload[0] != TRON_ADDRESS_PREFIX {
        return Err(WalletError::invalid_input(format!("invalid Tron address: {}", address)));
    }
    let mut out = [0u8; 21];
    out.copy_from_slice(&payload);
    Ok(out)
}

pub fn is_valid_tron_address(address: &str) -> bool {
    decode_tron_address(address).is_ok()
}
