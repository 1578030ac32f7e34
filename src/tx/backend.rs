//! Node collaborator contracts
//!
//! The core never talks to a node directly. Hosts implement these traits
//! over whatever transport they use and report every failure as
//! [`ErrorCode::UpstreamFailure`](crate::error::ErrorCode::UpstreamFailure);
//! callers pass those errors through unchanged. Calls block, and
//! timeouts or cancellation belong to the implementation.

use crate::error::WalletResult;
use crate::tx::tron::TronTransaction;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Latest block header fields the composer needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHeader {
    pub number: u64,
    /// Present once the chain has activated EIP-1559
    pub base_fee: Option<U256>,
}

/// Account-model (Ethereum-style) node
pub trait AccountBackend {
    fn header(&self) -> WalletResult<ChainHeader>;

    fn suggest_gas_price(&self) -> WalletResult<U256>;

    fn suggest_gas_tip_cap(&self) -> WalletResult<U256>;

    fn pending_nonce(&self, address: Address) -> WalletResult<u64>;

    fn estimate_gas(&self, tx: &TypedTransaction) -> WalletResult<u64>;

    /// Submit a signed envelope; returns its hash
    fn send_raw_transaction(&self, raw: &Bytes) -> WalletResult<H256>;
}

/// UTXO-model (Bitcoin-style) node
pub trait UtxoBackend {
    /// Smart fee estimate in satoshis per kilo-vbyte
    fn estimate_fee_per_kb(&self) -> WalletResult<u64>;

    /// Submit hex-encoded raw transaction; returns its txid
    fn send_raw_transaction(&self, raw_tx_hex: &str, allow_high_fees: bool) -> WalletResult<String>;
}

/// Tron full node
pub trait TronBackend {
    /// Ask the node to assemble an unsigned TRX transfer
    fn create_transfer(&self, from: &[u8; 21], to: &[u8; 21], amount_sun: u64) -> WalletResult<TronTransaction>;

    /// Broadcast a signed transaction; a rejected result is an upstream failure
    fn broadcast(&self, tx: &TronTransaction) -> WalletResult<()>;
}
