//! HD Wallet Core Library
//!
//! Hierarchical-deterministic key derivation and transaction construction
//! for Bitcoin-family chains, Ethereum and Tron.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: Path algebra, the HD key tree, mnemonics and per-chain wallets
//! - **chain**: Static network registry (prefixes, coin types, chain ids)
//! - **tx**: UTXO coin selection and signing, account-model fee resolution
//!   and signing, Tron transfers, plus the node contracts they consume
//! - **fees**: Standalone UTXO size and fee estimation
//! - **config**: Serde-backed builder and composer settings
//!
//! Nodes are never contacted directly. Callers supply implementations of
//! [`tx::AccountBackend`], [`tx::UtxoBackend`] and [`tx::TronBackend`].
//!
//! # Security
//!
//! Seeds and entropy are held in `zeroize` buffers and cleared on drop.
//! Log entries pass through a redaction filter before reaching `tracing`.
//!
//! # Example
//!
//! ```rust,ignore
//! use hdwallet_core::wallet::{ChainWallet, DerivationMode, HdWallet};
//! use hdwallet_core::types::{ChangeType, Symbol};
//!
//! let hd = HdWallet::new(mnemonic, "", 0, 1)?;
//! let btc = hd.new_native_segwit_wallet(0, ChangeType::External, 0, DerivationMode::Standard)?;
//! println!("Bitcoin address: {}", btc.address());
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod fees;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

// Re-export key types for convenience
pub use error::{ErrorCode, WalletError, WalletResult};
pub use types::*;

pub use config::{BuilderConfig, ComposerConfig};
pub use wallet::{
    build_path, derive_by_path, master_node, ChainWallet, DerivationMode, DerivationPath, HdWallet, KeyNode, Seed,
    Wallet,
};
