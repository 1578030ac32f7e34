//! Chain Registry
//!
//! Static lookup from (symbol, chain id) to the network parameters the
//! rest of the crate needs: HD coin type, address version bytes and the
//! HMAC domain key used for master-key generation.
//!
//! UTXO chains are keyed by their network magic, account chains by their
//! numeric chain id.

use crate::error::{WalletError, WalletResult};
use crate::types::Symbol;
use bitcoin::{Network, NetworkKind};

/// HMAC key used to derive the root node from a seed
pub const BITCOIN_SEED_KEY: &[u8] = b"Bitcoin seed";

/// SLIP-0044 coin types used by the registry
pub mod coin_types {
    pub const BITCOIN: u32 = 0;
    pub const TESTNET: u32 = 1;
    pub const ETHEREUM: u32 = 60;
    pub const TRON: u32 = 195;
}

/// Network magic values identifying UTXO chains
pub mod utxo_chain_ids {
    pub const MAINNET: u32 = 0xd9b4_bef9;
    pub const TESTNET3: u32 = 0x0709_110b;
    pub const REGTEST: u32 = 0xdab5_bffa;
    pub const SIGNET: u32 = 0x40cf_030a;
}

/// Chain ids of the supported account-model networks
pub mod account_chain_ids {
    pub const ETH_MAINNET: u64 = 1;
    pub const ETH_ROPSTEN: u64 = 3;
    pub const ETH_RINKEBY: u64 = 4;
    pub const ETH_GOERLI: u64 = 5;
    pub const ETH_DEV: u64 = 1337;
    pub const ETH_SEPOLIA: u64 = 11_155_111;
    pub const POLYGON: u64 = 137;
    pub const POLYGON_MUMBAI: u64 = 80_001;
    pub const BSC: u64 = 56;
    pub const BSC_TESTNET: u64 = 97;
    pub const TRON: u64 = 0;
}

/// Parameters of a Bitcoin-style chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoChainParams {
    pub name: &'static str,
    pub chain_id: u32,
    pub network: Network,
    pub hd_coin_type: u32,
    pub pubkey_hash_addr_id: u8,
    pub script_hash_addr_id: u8,
    pub private_key_id: u8,
    pub bech32_hrp: &'static str,
    pub hd_seed_key: &'static [u8],
}

impl UtxoChainParams {
    pub fn network_kind(&self) -> NetworkKind {
        NetworkKind::from(self.network)
    }
}

/// Parameters of an account-model chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChainParams {
    pub name: &'static str,
    pub symbol: Symbol,
    pub chain_id: u64,
    pub hd_coin_type: u32,
    /// Version byte prepended before base58check encoding, if any
    pub address_prefix: Option<u8>,
    pub hd_seed_key: &'static [u8],
}

pub static UTXO_CHAINS: &[UtxoChainParams] = &[
    UtxoChainParams {
        name: "mainnet",
        chain_id: utxo_chain_ids::MAINNET,
        network: Network::Bitcoin,
        hd_coin_type: coin_types::BITCOIN,
        pubkey_hash_addr_id: 0x00,
        script_hash_addr_id: 0x05,
        private_key_id: 0x80,
        bech32_hrp: "bc",
        hd_seed_key: BITCOIN_SEED_KEY,
    },
    UtxoChainParams {
        name: "testnet3",
        chain_id: utxo_chain_ids::TESTNET3,
        network: Network::Testnet,
        hd_coin_type: coin_types::TESTNET,
        pubkey_hash_addr_id: 0x6f,
        script_hash_addr_id: 0xc4,
        private_key_id: 0xef,
        bech32_hrp: "tb",
        hd_seed_key: BITCOIN_SEED_KEY,
    },
    UtxoChainParams {
        name: "regtest",
        chain_id: utxo_chain_ids::REGTEST,
        network: Network::Regtest,
        hd_coin_type: coin_types::TESTNET,
        pubkey_hash_addr_id: 0x6f,
        script_hash_addr_id: 0xc4,
        private_key_id: 0xef,
        bech32_hrp: "bcrt",
        hd_seed_key: BITCOIN_SEED_KEY,
    },
    UtxoChainParams {
        name: "signet",
        chain_id: utxo_chain_ids::SIGNET,
        network: Network::Signet,
        hd_coin_type: coin_types::TESTNET,
        pubkey_hash_addr_id: 0x6f,
        script_hash_addr_id: 0xc4,
        private_key_id: 0xef,
        bech32_hrp: "tb",
        hd_seed_key: BITCOIN_SEED_KEY,
    },
];

const fn evm(name: &'static str, chain_id: u64) -> AccountChainParams {
    AccountChainParams {
        name,
        symbol: Symbol::Eth,
        chain_id,
        hd_coin_type: coin_types::ETHEREUM,
        address_prefix: None,
        hd_seed_key: BITCOIN_SEED_KEY,
    }
}

pub static ACCOUNT_CHAINS: &[AccountChainParams] = &[
    evm("ethereum", account_chain_ids::ETH_MAINNET),
    evm("ropsten", account_chain_ids::ETH_ROPSTEN),
    evm("rinkeby", account_chain_ids::ETH_RINKEBY),
    evm("goerli", account_chain_ids::ETH_GOERLI),
    evm("dev", account_chain_ids::ETH_DEV),
    evm("sepolia", account_chain_ids::ETH_SEPOLIA),
    evm("polygon", account_chain_ids::POLYGON),
    evm("polygon-mumbai", account_chain_ids::POLYGON_MUMBAI),
    evm("bsc", account_chain_ids::BSC),
    evm("bsc-testnet", account_chain_ids::BSC_TESTNET),
    AccountChainParams {
        name: "tron",
        symbol: Symbol::Trx,
        chain_id: account_chain_ids::TRON,
        hd_coin_type: coin_types::TRON,
        address_prefix: Some(0x41),
        hd_seed_key: BITCOIN_SEED_KEY,
    },
];

/// Look up a UTXO chain by network magic
pub fn utxo_chain(chain_id: u32) -> WalletResult<&'static UtxoChainParams> {
    UTXO_CHAINS
        .iter()
        .find(|params| params.chain_id == chain_id)
        .ok_or_else(|| WalletError::invalid_input(format!("unknown BTC chain id: {:#x}", chain_id)))
}

/// Look up a UTXO chain by the `bitcoin` crate network tag
pub fn utxo_chain_for_network(network: Network) -> WalletResult<&'static UtxoChainParams> {
    UTXO_CHAINS
        .iter()
        .find(|params| params.network == network)
        .ok_or_else(|| WalletError::invalid_input(format!("unsupported network: {}", network)))
}

/// Look up an account-model chain
pub fn account_chain(symbol: Symbol, chain_id: u64) -> WalletResult<&'static AccountChainParams> {
    ACCOUNT_CHAINS
        .iter()
        .find(|params| params.symbol == symbol && params.chain_id == chain_id)
        .ok_or_else(|| {
            WalletError::invalid_input(format!("unknown {} chain id: {}", symbol, chain_id))
        })
}

/// HD coin type for a symbol on a given chain
pub fn hd_coin_type(symbol: Symbol, chain_id: u64) -> WalletResult<u32> {
    match symbol {
        Symbol::Btc => {
            let magic = u32::try_from(chain_id).map_err(|_| {
                WalletError::invalid_input(format!("unknown BTC chain id: {}", chain_id))
            })?;
            Ok(utxo_chain(magic)?.hd_coin_type)
        }
        Symbol::Eth | Symbol::Trx => Ok(account_chain(symbol, chain_id)?.hd_coin_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_utxo_lookup() {
        let main = utxo_chain(utxo_chain_ids::MAINNET).unwrap();
        assert_eq!(main.network, Network::Bitcoin);
        assert_eq!(main.hd_coin_type, 0);
        assert_eq!(main.network_kind(), NetworkKind::Main);

        let test = utxo_chain(utxo_chain_ids::TESTNET3).unwrap();
        assert_eq!(test.pubkey_hash_addr_id, 0x6f);
        assert_eq!(test.network_kind(), NetworkKind::Test);

        assert!(utxo_chain(42).unwrap_err().is(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_network_roundtrip() {
        for params in UTXO_CHAINS {
            assert_eq!(utxo_chain_for_network(params.network).unwrap(), params);
        }
    }

    #[test]
    fn test_coin_types() {
        assert_eq!(hd_coin_type(Symbol::Btc, utxo_chain_ids::MAINNET as u64).unwrap(), 0);
        assert_eq!(hd_coin_type(Symbol::Btc, utxo_chain_ids::REGTEST as u64).unwrap(), 1);
        assert_eq!(hd_coin_type(Symbol::Eth, account_chain_ids::ETH_GOERLI).unwrap(), 60);
        assert_eq!(hd_coin_type(Symbol::Eth, account_chain_ids::BSC).unwrap(), 60);
        assert_eq!(hd_coin_type(Symbol::Trx, account_chain_ids::TRON).unwrap(), 195);
    }

    #[test]
    fn test_unknown_combinations() {
        assert!(hd_coin_type(Symbol::Eth, 999_999).is_err());
        assert!(hd_coin_type(Symbol::Trx, account_chain_ids::ETH_MAINNET).is_err());
        assert!(hd_coin_type(Symbol::Btc, u64::MAX).is_err());
    }
}
