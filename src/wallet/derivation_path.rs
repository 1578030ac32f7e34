//! Key Derivation Paths
//!
//! Parsing, rendering and construction of BIP-32/44/49/84 paths, plus a
//! validator that flags chain-inappropriate paths before derivation.

use crate::chain;
use crate::error::{WalletError, WalletResult};
use crate::types::{ChangeType, Purpose, Symbol};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hardened offset for BIP-32 derivation
pub const HARDENED: u32 = 0x8000_0000;

/// Path parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("derivation path must start with 'm/'")]
    MissingRoot,
    #[error("empty derivation path")]
    Empty,
    #[error("empty path component")]
    EmptyComponent,
    #[error("invalid path component '{0}'")]
    InvalidComponent(String),
    #[error("path component {0} exceeds the hardened boundary")]
    IndexOutOfRange(u32),
}

impl From<PathError> for WalletError {
    fn from(e: PathError) -> Self {
        WalletError::derivation(e.to_string())
    }
}

/// Single component of a derivation path
///
/// `index` always holds the raw 31-bit value; the hardened offset is only
/// applied by [`DerivationComponent::full_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationComponent {
    index: u32,
    hardened: bool,
}

impl DerivationComponent {
    pub fn new(index: u32, hardened: bool) -> Result<Self, PathError> {
        if index >= HARDENED {
            return Err(PathError::IndexOutOfRange(index));
        }
        Ok(Self { index, hardened })
    }

    pub fn normal(index: u32) -> Result<Self, PathError> {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self, PathError> {
        Self::new(index, true)
    }

    /// Decode a wire index that may carry the hardened bit
    pub fn from_full_index(full: u32) -> Self {
        Self {
            index: full & !HARDENED,
            hardened: full & HARDENED != 0,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// Get the full index including hardened bit
    pub fn full_index(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED
        } else {
            self.index
        }
    }
}

impl fmt::Display for DerivationComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// Parsed derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    components: Vec<DerivationComponent>,
}

impl DerivationPath {
    pub fn new(components: Vec<DerivationComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[DerivationComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn purpose(&self) -> Option<u32> {
        self.components.first().map(|c| c.index)
    }

    pub fn coin_type(&self) -> Option<u32> {
        self.components.get(1).map(|c| c.index)
    }

    pub fn account(&self) -> Option<u32> {
        self.components.get(2).map(|c| c.index)
    }

    pub fn change(&self) -> Option<u32> {
        self.components.get(3).map(|c| c.index)
    }

    pub fn address_index(&self) -> Option<u32> {
        self.components.get(4).map(|c| c.index)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim();

        let path_part = trimmed
            .strip_prefix("m/")
            .or_else(|| trimmed.strip_prefix("M/"))
            .ok_or(PathError::MissingRoot)?;
        if path_part.is_empty() {
            return Err(PathError::Empty);
        }

        let components = path_part
            .split('/')
            .map(parse_component)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DerivationPath { components })
    }
}

/// Parse a single path component
fn parse_component(s: &str) -> Result<DerivationComponent, PathError> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(PathError::EmptyComponent);
    }

    let (number_str, hardened) = match trimmed.strip_suffix(|c: char| matches!(c, '\'' | 'h' | 'H')) {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let index: u32 = number_str
        .parse()
        .map_err(|_| PathError::InvalidComponent(s.to_string()))?;

    DerivationComponent::new(index, hardened)
}

/// Build `m/purpose'/coinType'/account'/change/index` for a chain
///
/// UTXO chains accept purposes 44, 49 and 84. Account-model chains only
/// use 44.
pub fn build_path(
    purpose: Purpose,
    symbol: Symbol,
    chain_id: u64,
    account: u32,
    change: ChangeType,
    index: u32,
) -> WalletResult<DerivationPath> {
    if symbol.is_account() && purpose != Purpose::Bip44 {
        return Err(WalletError::invalid_input(format!(
            "{} wallets only derive under purpose 44, got {}",
            symbol,
            purpose.value()
        )));
    }

    let coin_type = chain::hd_coin_type(symbol, chain_id)?;

    let component = |index: u32, hardened: bool| {
        DerivationComponent::new(index, hardened)
            .map_err(|e| WalletError::invalid_input(e.to_string()))
    };

    Ok(DerivationPath::new(vec![
        component(purpose.value(), true)?,
        component(coin_type, true)?,
        component(account, true)?,
        component(change.value(), false)?,
        component(index, false)?,
    ]))
}

pub fn bip44_path(
    symbol: Symbol,
    chain_id: u64,
    account: u32,
    change: ChangeType,
    index: u32,
) -> WalletResult<DerivationPath> {
    build_path(Purpose::Bip44, symbol, chain_id, account, change, index)
}

pub fn bip49_path(
    symbol: Symbol,
    chain_id: u64,
    account: u32,
    change: ChangeType,
    index: u32,
) -> WalletResult<DerivationPath> {
    build_path(Purpose::Bip49, symbol, chain_id, account, change, index)
}

pub fn bip84_path(
    symbol: Symbol,
    chain_id: u64,
    account: u32,
    change: ChangeType,
    index: u32,
) -> WalletResult<DerivationPath> {
    build_path(Purpose::Bip84, symbol, chain_id, account, change, index)
}

/// Derivation path validation result
#[derive(Debug, Clone)]
pub struct PathValidation {
    pub is_valid: bool,
    pub path: Option<DerivationPath>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Parse and validate a derivation path string for a chain
pub fn validate_derivation_path(path: &str, symbol: Symbol, chain_id: u64) -> PathValidation {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let parsed = match path.parse::<DerivationPath>() {
        Ok(p) => p,
        Err(e) => {
            return PathValidation {
                is_valid: false,
                path: None,
                warnings,
                errors: vec![e.to_string()],
            };
        }
    };

    if let Some(purpose) = parsed.purpose() {
        match Purpose::try_from(purpose) {
            Ok(Purpose::Bip44) => {}
            Ok(_) if symbol.is_account() => {
                warnings.push(format!("Purpose {} is not standard for {}", purpose, symbol));
            }
            Ok(_) => {}
            Err(_) => {
                warnings.push(format!(
                    "Non-standard purpose: {}. Standard purposes are 44, 49, 84",
                    purpose
                ));
            }
        }
    }

    if let (Some(coin_type), Ok(expected)) = (parsed.coin_type(), chain::hd_coin_type(symbol, chain_id)) {
        if coin_type != expected {
            let mainnet_utxo = symbol.is_utxo() && expected == chain::coin_types::BITCOIN;
            if coin_type == chain::coin_types::TESTNET && mainnet_utxo {
                errors.push("Using testnet coin type on mainnet - funds may be lost!".to_string());
            } else {
                warnings.push(format!(
                    "Coin type {} is not standard for {} (expected {})",
                    coin_type, symbol, expected
                ));
            }
        }
    }

    if let Some(change) = parsed.change() {
        if change > 1 {
            warnings.push(format!(
                "Non-standard change value: {}. Should be 0 (external) or 1 (internal/change)",
                change
            ));
        }
    }

    let has_unhardened_before_account =
        parsed.len() >= 3 && parsed.components().iter().take(3).any(|c| !c.is_hardened());
    if has_unhardened_before_account {
        warnings.push("Purpose, coin type, and account should be hardened (')".to_string());
    }

    PathValidation {
        is_valid: errors.is_empty(),
        path: Some(parsed),
        warnings,
        errors,
    }
}
