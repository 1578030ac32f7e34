//! Ethereum-style wallets
//!
//! Address = last 20 bytes of keccak256 over the uncompressed public key,
//! rendered with an EIP-55 checksum. Transactions are signed through an
//! `ethers-signers` local wallet bound to the chain id.

use crate::chain::{self, AccountChainParams};
use crate::error::{WalletError, WalletResult};
use crate::types::Symbol;
use crate::utils::crypto::{account_address_bytes, to_checksum_address};
use crate::wallet::derivation_path::DerivationPath;
use crate::wallet::hd::{master_node, DerivationMode, KeyNode, Seed};
use crate::wallet::ChainWallet;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address as H160Address, Signature};
use ethers_signers::{LocalWallet, Signer};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

#[derive(Clone)]
pub struct EthWallet {
    chain: &'static AccountChainParams,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl std::fmt::Debug for EthWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthWallet")
            .field("chain", &self.chain.name)
            .field("address", &self.address())
            .finish()
    }
}

impl EthWallet {
    pub fn from_secret(secret_key: SecretKey, chain_id: u64) -> WalletResult<Self> {
        let chain = chain::account_chain(Symbol::Eth, chain_id)?;
        let secp = Secp256k1::signing_only();
        Ok(Self {
            chain,
            secret_key,
            public_key: secret_key.public_key(&secp),
        })
    }

    pub fn from_node(node: &KeyNode, chain_id: u64) -> WalletResult<Self> {
        let secret = node
            .private_key()
            .ok_or_else(|| WalletError::derivation("key node has no private key"))?;
        Self::from_secret(*secret, chain_id)
    }

    pub fn from_path(seed: &Seed, path: &DerivationPath, chain_id: u64, mode: DerivationMode) -> WalletResult<Self> {
        let chain = chain::account_chain(Symbol::Eth, chain_id)?;
        let master = master_node(seed, chain.hd_seed_key)?;
        let node = master.derive_path(path, mode)?;
        Self::from_node(&node, chain_id)
    }

    /// Import a raw hex private key (optional `0x` prefix)
    pub fn from_private_key_hex(private_key: &str, chain_id: u64) -> WalletResult<Self> {
        let secret = parse_hex_secret(private_key)?;
        Self::from_secret(secret, chain_id)
    }

    pub fn chain(&self) -> &'static AccountChainParams {
        self.chain
    }

    pub fn h160(&self) -> H160Address {
        H160Address::from(account_address_bytes(&self.public_key.serialize_uncompressed()))
    }

    /// Local signer carrying this wallet's key and chain id
    pub fn signer(&self) -> WalletResult<LocalWallet> {
        Ok(LocalWallet::from_bytes(&self.secret_key.secret_bytes())?.with_chain_id(self.chain.chain_id))
    }

    /// Sign a typed or legacy transaction envelope
    pub fn sign_transaction(&self, tx: &TypedTransaction) -> WalletResult<Signature> {
        let signer = self.signer()?;
        Ok(signer.sign_transaction_sync(tx)?)
    }
}

impl ChainWallet for EthWallet {
    fn symbol(&self) -> Symbol {
        Symbol::Eth
    }

    fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    fn address(&self) -> String {
        to_checksum_address(self.h160().as_bytes())
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

pub(crate) fn parse_hex_secret(private_key: &str) -> WalletResult<SecretKey> {
    let trimmed = private_key.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = zeroize::Zeroizing::new(hex::decode(raw)?);
    if bytes.len() != 32 {
        return Err(WalletError::invalid_input(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    SecretKey::from_slice(&bytes).map_err(|e| WalletError::invalid_input(format!("invalid private key: {}", e)))
}

pub(crate) fn sign_recoverable(secret_key: &SecretKey, digest: &[u8; 32]) -> [u8; 65] {
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(*digest), secret_key);
    let (recovery_id, compact) = signature.serialize_compact();
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    out
}
