//! Transaction Module
//!
//! UTXO coin selection and signing, account-model fee resolution and
//! envelope signing, Tron transfers, and the node contracts they consume.

pub mod account;
pub mod backend;
pub mod tron;
pub mod utxo;

pub use account::{FeeModel, GasParams, SignedEnvelope, TransactionComposer, TransferOptions};
pub use backend::{AccountBackend, ChainHeader, TronBackend, UtxoBackend};
pub use tron::{transfer_trx, TronTransaction};
pub use utxo::{
    make_tx_outputs, BtcTransaction, DecodedTransaction, SecretsSource, SignedBtcTransaction, UnspentOutput,
    UtxoOutput, UtxoTransactionBuilder,
};
