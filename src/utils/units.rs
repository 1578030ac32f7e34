//! Unit conversions and display formatting for BTC, ETH and TRX amounts.

use crate::error::{WalletError, WalletResult};
use bitcoin::Amount;
use ethers_core::types::U256;

pub const SATOSHI_PER_BITCOIN: u64 = 100_000_000;
pub const GWEI_PER_ETHER: u64 = 1_000_000_000;
pub const WEI_PER_GWEI: u64 = 1_000_000_000;
pub const SUN_PER_TRX: u64 = 1_000_000;

/// Gas used by a plain value transfer
pub const ETHER_TRANSFER_GAS: u64 = 21_000;

/// Convert a BTC float amount (as node RPCs report it) to satoshis
pub fn btc_to_satoshi(btc: f64) -> WalletResult<u64> {
    Ok(Amount::from_btc(btc)?.to_sat())
}

pub fn gwei_to_wei(gwei: u64) -> U256 {
    U256::from(gwei) * U256::from(WEI_PER_GWEI)
}

/// Integer gwei, truncating any sub-gwei remainder
pub fn wei_to_gwei(wei: U256) -> U256 {
    wei / U256::from(WEI_PER_GWEI)
}

/// Ether amount in wei, rejecting negatives and sub-wei precision loss
pub fn ether_to_wei(ether: f64) -> WalletResult<U256> {
    if !ether.is_finite() || ether < 0.0 {
        return Err(WalletError::invalid_input(format!("invalid ether amount: {}", ether)));
    }
    let gwei = (ether * GWEI_PER_ETHER as f64).round();
    if gwei > u64::MAX as f64 {
        return Err(WalletError::invalid_input(format!("ether amount too large: {}", ether)));
    }
    Ok(gwei_to_wei(gwei as u64))
}

/// Fee in wei for `gas` units at `gas_price` wei
pub fn calc_eth_fee(gas: u64, gas_price: U256) -> U256 {
    U256::from(gas).saturating_mul(gas_price)
}

/// `amount` satoshis as a BTC string with trailing zeros trimmed
pub fn format_btc(amount: u64) -> String {
    format_units(amount, 8)
}

/// `amount` gwei as an ETH string with trailing zeros trimmed
pub fn format_eth(amount: u64) -> String {
    format_units(amount, 9)
}

/// `amount` sun as a TRX string with trailing zeros trimmed
pub fn format_trx(amount: u64) -> String {
    format_units(amount, 6)
}

/// Integer amount with `decimals` implied decimal places
pub fn format_units(amount: u64, decimals: u32) -> String {
    let scale = 10u64.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Truncate (not round) `value` to `precision` decimals
pub fn format_float(value: f64, precision: i32) -> String {
    let d = if precision > 0 { 10f64.powi(precision) } else { 1.0 };
    format!("{}", (value * d).trunc() / d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_btc(150_000_000), "1.5");
        assert_eq!(format_btc(1), "0.00000001");
        assert_eq!(format_btc(0), "0");
        assert_eq!(format_eth(21_000), "0.000021");
        assert_eq!(format_trx(1_000_000), "1");
    }

    #[test]
    fn test_format_float_truncates() {
        assert_eq!(format_float(1.23456789, 4), "1.2345");
        assert_eq!(format_float(2.9, 0), "2");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(btc_to_satoshi(0.0001).unwrap(), 10_000);
        assert_eq!(gwei_to_wei(3), U256::from(3_000_000_000u64));
        assert_eq!(wei_to_gwei(U256::from(3_500_000_000u64)), U256::from(3));
        assert_eq!(ether_to_wei(0.5).unwrap(), U256::from(500_000_000_000_000_000u64));
        assert!(ether_to_wei(-1.0).is_err());
        assert_eq!(calc_eth_fee(ETHER_TRANSFER_GAS, gwei_to_wei(10)), U256::from(210_000_000_000_000u64));
    }
}
