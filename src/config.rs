//! Builder and composer settings
//!
//! Both load from JSON with missing fields falling back to defaults.

use crate::error::{WalletError, WalletResult};
use crate::utils::units::ETHER_TRANSFER_GAS;
use serde::{Deserialize, Serialize};

/// UTXO transaction builder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub tx_version: i32,
    pub input_sequence: u32,
    pub randomize_change: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            tx_version: 1,
            input_sequence: 0xffff_ffff,
            randomize_change: true,
        }
    }
}

impl BuilderConfig {
    pub fn from_json(json: &str) -> WalletResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if !(1..=2).contains(&self.tx_version) {
            return Err(WalletError::invalid_input(format!(
                "unsupported transaction version {}",
                self.tx_version
            )));
        }
        Ok(())
    }
}

/// Account transaction composer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Gas limit used for plain value transfers when none is given
    pub default_gas_limit: u64,
    /// `fee_cap = tip_cap + multiplier * base_fee` when no cap is given
    pub base_fee_multiplier: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            default_gas_limit: ETHER_TRANSFER_GAS,
            base_fee_multiplier: 2,
        }
    }
}

impl ComposerConfig {
    pub fn from_json(json: &str) -> WalletResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.default_gas_limit < ETHER_TRANSFER_GAS {
            return Err(WalletError::invalid_input(format!(
                "default gas limit {} is below the intrinsic transfer cost",
                self.default_gas_limit
            )));
        }
        if self.base_fee_multiplier == 0 {
            return Err(WalletError::invalid_input("base fee multiplier must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults() {
        let builder = BuilderConfig::default();
        assert_eq!(builder.tx_version, 1);
        assert_eq!(builder.input_sequence, u32::MAX);
        assert!(builder.randomize_change);

        let composer = ComposerConfig::default();
        assert_eq!(composer.default_gas_limit, 21_000);
        assert_eq!(composer.base_fee_multiplier, 2);
    }

    #[test]
    fn test_partial_json_falls_back() {
        let builder = BuilderConfig::from_json(r#"{"randomize_change": false}"#).unwrap();
        assert!(!builder.randomize_change);
        assert_eq!(builder.tx_version, 1);

        let composer = ComposerConfig::from_json("{}").unwrap();
        assert_eq!(composer, ComposerConfig::default());
    }

    #[test]
    fn test_validation() {
        assert!(BuilderConfig::from_json(r#"{"tx_version": 7}"#)
            .unwrap_err()
            .is(ErrorCode::InvalidInput));
        assert!(ComposerConfig::from_json(r#"{"default_gas_limit": 100}"#).is_err());
        assert!(ComposerConfig::from_json(r#"{"base_fee_multiplier": 0}"#).is_err());
        assert!(ComposerConfig::from_json("not json").unwrap_err().is(ErrorCode::InvalidInput));
    }
}
