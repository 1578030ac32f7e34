//! Standalone fee estimation
//!
//! Sizes a hypothetical transaction from input counts and outputs without
//! selecting coins or signing anything.

use crate::chain;
use crate::error::WalletResult;
use crate::log_debug;
use crate::tx::utxo::{make_tx_outputs, UtxoOutput};
use serde::{Deserialize, Serialize};

use super::rules::fee_for_serialize_size;
use super::sizes::{InputMix, P2WPKH_PK_SCRIPT_SIZE};

/// Pre-flight fee estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Fee in satoshis
    pub fee: u64,
    /// Sum of all declared outputs in satoshis
    pub target_amount: u64,
    pub vsize: usize,
}

impl FeeEstimate {
    /// Inputs must cover at least this much
    pub fn required_input(&self) -> u64 {
        self.fee.saturating_add(self.target_amount)
    }
}

/// Estimate the fee for spending `inputs` to `outputs` on `chain_id`
///
/// `change_script_size` of `None` assumes a P2WPKH change output;
/// `Some(0)` assumes no change.
pub fn estimate_fee(
    inputs: InputMix,
    outputs: &[UtxoOutput],
    fee_per_kb: u64,
    change_script_size: Option<usize>,
    chain_id: u32,
) -> WalletResult<FeeEstimate> {
    let chain = chain::utxo_chain(chain_id)?;
    let change_script_size = change_script_size.unwrap_or(P2WPKH_PK_SCRIPT_SIZE);

    let tx_outs = make_tx_outputs(outputs, fee_per_kb, chain)?;
    let vsize = inputs.virtual_size(&tx_outs, change_script_size);
    let fee = fee_for_serialize_size(fee_per_kb, vsize).to_sat();
    let target_amount = tx_outs.iter().map(|o| o.value.to_sat()).sum();

    log_debug!(
        "fees",
        "estimated fee",
        inputs = inputs.total(),
        vsize = vsize,
        fee = fee
    );

    Ok(FeeEstimate {
        fee,
        target_amount,
        vsize,
    })
}
