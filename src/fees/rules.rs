//! Output and fee policy
//!
//! Dust and relay-fee rules applied to outputs before they enter a
//! transaction, and the fee charged for a given serialized size.

use crate::error::{WalletError, WalletResult};
use bitcoin::{Amount, TxOut};

use super::sizes::varint_size;

/// Largest representable output value
pub const MAX_SATOSHI: u64 = 21_000_000 * 100_000_000;

/// Size of a typical input spending an output, used in the dust formula
const DUST_SPEND_INPUT_SIZE: usize = 148;

/// Minimum value an output with `script_size` bytes of script must carry
/// at `fee_per_kb`
///
/// An output is dust when spending it would cost more than a third of
/// its value.
pub fn dust_threshold(script_size: usize, fee_per_kb: u64) -> u64 {
    let total_size = 8 + varint_size(script_size as u64) + script_size + DUST_SPEND_INPUT_SIZE;
    3 * total_size as u64 * (fee_per_kb / 1000)
}

pub fn is_dust_amount(amount: u64, script_size: usize, fee_per_kb: u64) -> bool {
    let total_size = 8 + varint_size(script_size as u64) + script_size + DUST_SPEND_INPUT_SIZE;
    amount / (3 * total_size as u64) < fee_per_kb / 1000
}

/// Null-data outputs are never dust
pub fn is_dust_output(output: &TxOut, fee_per_kb: u64) -> bool {
    if output.script_pubkey.is_op_return() {
        return false;
    }
    is_dust_amount(output.value.to_sat(), output.script_pubkey.len(), fee_per_kb)
}

/// Reject outputs above max money or below the dust threshold
pub fn check_output(output: &TxOut, fee_per_kb: u64) -> WalletResult<()> {
    if output.value.to_sat() > MAX_SATOSHI {
        return Err(WalletError::invalid_input(format!(
            "output amount {} exceeds max satoshi",
            output.value
        )));
    }
    if is_dust_output(output, fee_per_kb) {
        return Err(WalletError::invalid_input(format!(
            "output amount {} is dust at {} sat/kB",
            output.value.to_sat(),
            fee_per_kb
        )));
    }
    Ok(())
}

/// Fee for a transaction of `size` virtual bytes, never zero for a
/// positive rate and never above max money
pub fn fee_for_serialize_size(fee_per_kb: u64, size: usize) -> Amount {
    let mut fee = fee_per_kb.saturating_mul(size as u64) / 1000;
    if fee == 0 && fee_per_kb > 0 {
        fee = fee_per_kb;
    }
    Amount::from_sat(fee.min(MAX_SATOSHI))
}
