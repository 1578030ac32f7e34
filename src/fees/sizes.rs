//! Worst-case serialized sizes of standard inputs and outputs
//!
//! Signature scripts are sized for a 73-byte DER signature plus sighash
//! flag, and compressed 33-byte public keys.

use bitcoin::{Script, TxOut};
use serde::{Deserialize, Serialize};

/// Input signature script for P2PKH: `OP_DATA_73 <sig> OP_DATA_33 <pubkey>`
pub const REDEEM_P2PKH_SIG_SCRIPT_SIZE: usize = 1 + 73 + 1 + 33;

/// `OP_DUP OP_HASH160 OP_DATA_20 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub const P2PKH_PK_SCRIPT_SIZE: usize = 1 + 1 + 1 + 20 + 1 + 1;

/// `OP_0 OP_DATA_20 <hash>`
pub const P2WPKH_PK_SCRIPT_SIZE: usize = 1 + 1 + 20;

/// `OP_DATA_22 OP_0 OP_DATA_20 <hash>`
pub const REDEEM_NESTED_P2WPKH_SCRIPT_SIZE: usize = 1 + 1 + 1 + 20;

/// Outpoint, script length, signature script and sequence
pub const REDEEM_P2PKH_INPUT_SIZE: usize = 32 + 4 + 1 + REDEEM_P2PKH_SIG_SCRIPT_SIZE + 4;

/// Non-witness part of a P2WPKH spend; the signature script is empty
pub const REDEEM_P2WPKH_INPUT_SIZE: usize = 32 + 4 + 1 + 4;

/// Non-witness part of a P2SH-P2WPKH spend
pub const REDEEM_NESTED_P2WPKH_INPUT_SIZE: usize = 32 + 4 + 1 + REDEEM_NESTED_P2WPKH_SCRIPT_SIZE + 4;

/// Item count, signature and public key of a P2WPKH witness
pub const REDEEM_P2WPKH_INPUT_WITNESS_WEIGHT: usize = 1 + 1 + 73 + 1 + 33;

pub const P2PKH_OUTPUT_SIZE: usize = 8 + 1 + P2PKH_PK_SCRIPT_SIZE;
pub const P2WPKH_OUTPUT_SIZE: usize = 8 + 1 + P2WPKH_PK_SCRIPT_SIZE;

pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Serialized length of a compact-size integer
pub fn varint_size(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn output_serialize_size(output: &TxOut) -> usize {
    let script_len = output.script_pubkey.len();
    8 + varint_size(script_len as u64) + script_len
}

pub fn sum_output_serialize_sizes(outputs: &[TxOut]) -> usize {
    outputs.iter().map(output_serialize_size).sum()
}

/// Upper bound on the virtual size of a transaction spending the given
/// input mix to `outputs`
///
/// A `change_script_size` of zero means no change output.
pub fn estimate_virtual_size(
    num_p2pkh_ins: usize,
    num_p2wpkh_ins: usize,
    num_nested_p2wpkh_ins: usize,
    outputs: &[TxOut],
    change_script_size: usize,
) -> usize {
    let mut output_count = outputs.len();
    let mut change_output_size = 0;
    if change_script_size > 0 {
        change_output_size = 8 + varint_size(change_script_size as u64) + change_script_size;
        output_count += 1;
    }

    let num_inputs = num_p2pkh_ins + num_p2wpkh_ins + num_nested_p2wpkh_ins;
    let base_size = 8
        + varint_size(num_inputs as u64)
        + varint_size(output_count as u64)
        + num_p2pkh_ins * REDEEM_P2PKH_INPUT_SIZE
        + num_p2wpkh_ins * REDEEM_P2WPKH_INPUT_SIZE
        + num_nested_p2wpkh_ins * REDEEM_NESTED_P2WPKH_INPUT_SIZE
        + sum_output_serialize_sizes(outputs)
        + change_output_size;

    let num_witness_ins = num_p2wpkh_ins + num_nested_p2wpkh_ins;
    let witness_weight = if num_witness_ins > 0 {
        // marker + flag, witness counts for every input
        2 + varint_size(num_witness_ins as u64) + num_witness_ins * REDEEM_P2WPKH_INPUT_WITNESS_WEIGHT
    } else {
        0
    };

    base_size + (witness_weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}

/// Counts of spendable input kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMix {
    pub p2pkh: usize,
    pub p2wpkh: usize,
    pub nested_p2wpkh: usize,
}

impl InputMix {
    /// Classify previous output scripts; P2SH is assumed to wrap P2WPKH and
    /// anything unrecognized is sized as P2PKH
    pub fn classify<'a, I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = &'a Script>,
    {
        let mut mix = InputMix::default();
        for script in scripts {
            if script.is_p2sh() {
                mix.nested_p2wpkh += 1;
            } else if script.is_p2wpkh() {
                mix.p2wpkh += 1;
            } else {
                mix.p2pkh += 1;
            }
        }
        mix
    }

    pub fn total(&self) -> usize {
        self.p2pkh + self.p2wpkh + self.nested_p2wpkh
    }

    pub fn virtual_size(&self, outputs: &[TxOut], change_script_size: usize) -> usize {
        estimate_virtual_size(self.p2pkh, self.p2wpkh, self.nested_p2wpkh, outputs, change_script_size)
    }
}
