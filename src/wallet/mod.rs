//! Wallet Module
//!
//! Seeds, the HD key tree, derivation paths and the per-chain wallets
//! built on a derived key.
//!
//! [`HdWallet`] owns one seed and hands out chain wallets by BIP44/49/84
//! coordinates or by explicit path. Every derivation takes a
//! [`DerivationMode`]; nothing here keeps a default.

pub mod bitcoin;
pub mod derivation_path;
pub mod ethereum;
pub mod hd;
pub mod mnemonic;
pub mod tron;

pub use self::bitcoin::UtxoWallet;
pub use derivation_path::*;
pub use ethereum::EthWallet;
pub use hd::{derive_by_path, master_node, DerivationMode, KeyNode, Seed};
pub use mnemonic::*;
pub use tron::TronWallet;

use crate::chain::{self, account_chain_ids};
use crate::error::{WalletError, WalletResult};
use crate::types::{AddressScheme, ChangeType, Purpose, Symbol};
use crate::{log_debug, log_warn};

/// Capabilities every chain wallet exposes
pub trait ChainWallet {
    fn symbol(&self) -> Symbol;
    fn chain_id(&self) -> u64;
    fn address(&self) -> String;
    fn public_key_hex(&self) -> String;
    /// WIF for UTXO chains, raw hex for account chains
    fn private_key_export(&self) -> String;
    /// Sign a 32-byte digest in the chain's native signature encoding
    fn sign_hash(&self, digest: &[u8; 32]) -> WalletResult<Vec<u8>>;
}

/// A wallet of any supported chain family
#[derive(Debug, Clone)]
pub enum Wallet {
    Utxo(UtxoWallet),
    Ethereum(EthWallet),
    Tron(TronWallet),
}

impl Wallet {
    pub fn as_utxo(&self) -> Option<&UtxoWallet> {
        match self {
            Wallet::Utxo(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_ethereum(&self) -> Option<&EthWallet> {
        match self {
            Wallet::Ethereum(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_tron(&self) -> Option<&TronWallet> {
        match self {
            Wallet::Tron(w) => Some(w),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn ChainWallet {
        match self {
            Wallet::Utxo(w) => w,
            Wallet::Ethereum(w) => w,
            Wallet::Tron(w) => w,
        }
    }
}

impl ChainWallet for Wallet {
    fn symbol(&self) -> Symbol {
        self.inner().symbol()
    }

    fn chain_id(&self) -> u64 {
        self.inner().chain_id()
    }

    fn address(&self) -> String {
        self.inner().address()
    }

    fn public_key_hex(&self) -> String {
        self.inner().public_key_hex()
    }

    fn private_key_export(&self) -> String {
        self.inner().private_key_export()
    }

    fn sign_hash(&self, digest: &[u8; 32]) -> WalletResult<Vec<u8>> {
        self.inner().sign_hash(digest)
    }
}

/// One seed, many chain wallets
#[derive(Debug)]
pub struct HdWallet {
    seed: Seed,
    btc_chain_id: u32,
    eth_chain_id: u64,
}

impl HdWallet {
    /// Validate `mnemonic` and derive its seed with `passphrase`
    pub fn new(mnemonic: &str, passphrase: &str, btc_chain_id: u32, eth_chain_id: u64) -> WalletResult<Self> {
        let seed = seed_from_mnemonic(mnemonic, passphrase)?;
        Self::from_seed(seed, btc_chain_id, eth_chain_id)
    }

    pub fn from_seed(seed: Seed, btc_chain_id: u32, eth_chain_id: u64) -> WalletResult<Self> {
        chain::utxo_chain(btc_chain_id)?;
        chain::account_chain(Symbol::Eth, eth_chain_id)?;
        Ok(Self {
            seed,
            btc_chain_id,
            eth_chain_id,
        })
    }

    pub fn btc_chain_id(&self) -> u32 {
        self.btc_chain_id
    }

    pub fn eth_chain_id(&self) -> u64 {
        self.eth_chain_id
    }

    fn chain_id_for(&self, symbol: Symbol) -> u64 {
        match symbol {
            Symbol::Btc => self.btc_chain_id as u64,
            Symbol::Eth => self.eth_chain_id,
            Symbol::Trx => account_chain_ids::TRON,
        }
    }

    /// BIP44 wallet; BTC wallets use legacy addresses
    pub fn new_wallet(
        &self,
        symbol: Symbol,
        account: u32,
        change: ChangeType,
        index: u32,
        mode: DerivationMode,
    ) -> WalletResult<Wallet> {
        let path = bip44_path(symbol, self.chain_id_for(symbol), account, change, index)?;
        self.derive(symbol, &path, AddressScheme::Legacy, mode)
    }

    /// BIP49 BTC wallet with P2SH-wrapped segwit addresses
    pub fn new_segwit_wallet(
        &self,
        account: u32,
        change: ChangeType,
        index: u32,
        mode: DerivationMode,
    ) -> WalletResult<Wallet> {
        let path = bip49_path(Symbol::Btc, self.btc_chain_id as u64, account, change, index)?;
        self.derive(Symbol::Btc, &path, AddressScheme::NestedSegwit, mode)
    }

    /// BIP84 BTC wallet with native segwit addresses
    pub fn new_native_segwit_wallet(
        &self,
        account: u32,
        change: ChangeType,
        index: u32,
        mode: DerivationMode,
    ) -> WalletResult<Wallet> {
        let path = bip84_path(Symbol::Btc, self.btc_chain_id as u64, account, change, index)?;
        self.derive(Symbol::Btc, &path, AddressScheme::NativeSegwit, mode)
    }

    /// Wallet at an arbitrary path; `scheme` only matters for BTC
    pub fn new_wallet_by_path(
        &self,
        symbol: Symbol,
        path: &str,
        scheme: AddressScheme,
        mode: DerivationMode,
    ) -> WalletResult<Wallet> {
        let validation = validate_derivation_path(path, symbol, self.chain_id_for(symbol));
        for warning in &validation.warnings {
            log_warn!("wallet", "non-standard derivation path", path = path, warning = warning);
        }
        if !validation.is_valid {
            return Err(match validation.path {
                None => WalletError::derivation(validation.errors.join("; ")),
                Some(_) => WalletError::invalid_input(validation.errors.join("; ")),
            });
        }
        let parsed = validation
            .path
            .ok_or_else(|| WalletError::derivation(format!("unparseable path: {}", path)))?;

        if symbol == Symbol::Btc {
            if let Some(purpose) = parsed.purpose().and_then(|p| Purpose::try_from(p).ok()) {
                if purpose.address_scheme() != scheme {
                    log_warn!(
                        "wallet",
                        "address scheme differs from path purpose",
                        path = path,
                        purpose = purpose.value()
                    );
                }
            }
        }
        self.derive(symbol, &parsed, scheme, mode)
    }

    fn derive(
        &self,
        symbol: Symbol,
        path: &DerivationPath,
        scheme: AddressScheme,
        mode: DerivationMode,
    ) -> WalletResult<Wallet> {
        log_debug!("wallet", "deriving wallet", symbol = symbol, path = path);
        let wallet = match symbol {
            Symbol::Btc => Wallet::Utxo(UtxoWallet::from_path(&self.seed, path, self.btc_chain_id, scheme, mode)?),
            Symbol::Eth => Wallet::Ethereum(EthWallet::from_path(&self.seed, path, self.eth_chain_id, mode)?),
            Symbol::Trx => Wallet::Tron(TronWallet::from_path(&self.seed, path, mode)?),
        };
        Ok(wallet)
    }
}
