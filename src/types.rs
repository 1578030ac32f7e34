//! Shared types for the wallet core
//!
//! Small enums that cross module boundaries: chain symbols, address
//! schemes, BIP purposes and change branches.

use crate::error::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Chain Types
// =============================================================================

/// Chain families a wallet can be derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
    Trx,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
            Symbol::Trx => "TRX",
        }
    }

    pub fn is_utxo(&self) -> bool {
        matches!(self, Symbol::Btc)
    }

    pub fn is_account(&self) -> bool {
        !self.is_utxo()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = WalletError;

    fn from_str(s: &str) -> WalletResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" => Ok(Symbol::Btc),
            "ETH" => Ok(Symbol::Eth),
            "TRX" => Ok(Symbol::Trx),
            other => Err(WalletError::invalid_input(format!("unknown symbol: {}", other))),
        }
    }
}

// =============================================================================
// Derivation Types
// =============================================================================

/// BIP purpose level of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Bip44,
    Bip49,
    Bip84,
}

impl Purpose {
    pub fn value(&self) -> u32 {
        match self {
            Purpose::Bip44 => 44,
            Purpose::Bip49 => 49,
            Purpose::Bip84 => 84,
        }
    }

    /// Address scheme a UTXO wallet derived under this purpose uses
    pub fn address_scheme(&self) -> AddressScheme {
        match self {
            Purpose::Bip44 => AddressScheme::Legacy,
            Purpose::Bip49 => AddressScheme::NestedSegwit,
            Purpose::Bip84 => AddressScheme::NativeSegwit,
        }
    }
}

impl TryFrom<u32> for Purpose {
    type Error = WalletError;

    fn try_from(value: u32) -> WalletResult<Self> {
        match value {
            44 => Ok(Purpose::Bip44),
            49 => Ok(Purpose::Bip49),
            84 => Ok(Purpose::Bip84),
            other => Err(WalletError::invalid_input(format!(
                "unsupported purpose {}; expected 44, 49 or 84",
                other
            ))),
        }
    }
}

/// Address encoding bound to a UTXO wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScheme {
    /// P2PKH
    Legacy,
    /// P2SH-wrapped P2WPKH
    NestedSegwit,
    /// P2WPKH
    NativeSegwit,
}

impl AddressScheme {
    pub fn purpose(&self) -> Purpose {
        match self {
            AddressScheme::Legacy => Purpose::Bip44,
            AddressScheme::NestedSegwit => Purpose::Bip49,
            AddressScheme::NativeSegwit => Purpose::Bip84,
        }
    }
}

/// Change level of a BIP44-style path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    External,
    Internal,
}

impl ChangeType {
    pub fn value(&self) -> u32 {
        match self {
            ChangeType::External => 0,
            ChangeType::Internal => 1,
        }
    }
}

impl TryFrom<u32> for ChangeType {
    type Error = WalletError;

    fn try_from(value: u32) -> WalletResult<Self> {
        match value {
            0 => Ok(ChangeType::External),
            1 => Ok(ChangeType::Internal),
            other => Err(WalletError::invalid_input(format!(
                "invalid change type {}; expected 0 (external) or 1 (internal)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_symbol_parsing() {
        assert_eq!("btc".parse::<Symbol>().unwrap(), Symbol::Btc);
        assert_eq!(" ETH ".parse::<Symbol>().unwrap(), Symbol::Eth);
        assert_eq!("Trx".parse::<Symbol>().unwrap(), Symbol::Trx);
        assert!("DOGE".parse::<Symbol>().unwrap_err().is(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_purpose_scheme_mapping() {
        for purpose in [Purpose::Bip44, Purpose::Bip49, Purpose::Bip84] {
            assert_eq!(purpose.address_scheme().purpose(), purpose);
            assert_eq!(Purpose::try_from(purpose.value()).unwrap(), purpose);
        }
        assert!(Purpose::try_from(86).is_err());
    }

    #[test]
    fn test_change_type_bounds() {
        assert_eq!(ChangeType::try_from(0).unwrap(), ChangeType::External);
        assert_eq!(ChangeType::try_from(1).unwrap(), ChangeType::Internal);
        assert!(ChangeType::try_from(2).unwrap_err().is(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_symbol_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Symbol::Trx).unwrap(), "\"TRX\"");
    }
}
