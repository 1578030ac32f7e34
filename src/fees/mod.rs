//! Fee Module
//!
//! Virtual-size constants, dust and relay-fee rules, and the standalone
//! UTXO fee estimator.

pub mod estimator;
pub mod rules;
pub mod sizes;

pub use estimator::{estimate_fee, FeeEstimate};
pub use rules::{check_output, dust_threshold, fee_for_serialize_size, is_dust_amount, MAX_SATOSHI};
pub use sizes::{estimate_virtual_size, InputMix};
