//! Tron transfers
//!
//! The node assembles the protobuf `raw_data`; the wallet only hashes and
//! signs it.

use crate::error::{WalletError, WalletResult};
use crate::tx::backend::TronBackend;
use crate::utils::logging::{LogEntry, LogLevel};
use crate::utils::units::format_trx;
use crate::wallet::tron::{decode_tron_address, TronWallet};
use crate::wallet::ChainWallet;
use crate::log_debug;
use sha2::{Digest, Sha256};

/// Node-built transaction plus the signatures collected so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronTransaction {
    /// Protobuf-encoded `Transaction.raw`
    pub raw_data: Vec<u8>,
    /// 65-byte `r || s || v` signatures over [`TronTransaction::txid`]
    pub signatures: Vec<Vec<u8>>,
}

impl TronTransaction {
    pub fn new(raw_data: Vec<u8>) -> Self {
        Self {
            raw_data,
            signatures: Vec::new(),
        }
    }

    /// SHA-256 of `raw_data`
    pub fn txid(&self) -> [u8; 32] {
        Sha256::digest(&self.raw_data).into()
    }

    pub fn txid_hex(&self) -> String {
        hex::encode(self.txid())
    }

    pub fn sign(&mut self, wallet: &TronWallet) -> WalletResult<()> {
        if self.raw_data.is_empty() {
            return Err(WalletError::invalid_input("transaction has no raw data"));
        }
        let signature = wallet.sign_hash(&self.txid())?;
        self.signatures.push(signature);
        Ok(())
    }

    /// Broadcast and return the txid as hex
    pub fn send<B: TronBackend + ?Sized>(&self, backend: &B) -> WalletResult<String> {
        if self.signatures.is_empty() {
            return Err(WalletError::signing_failed("transaction is not signed"));
        }
        backend.broadcast(self)?;
        Ok(self.txid_hex())
    }
}

/// Transfer `amount_sun` from `wallet` to the base58 address `to`
pub fn transfer_trx<B: TronBackend + ?Sized>(
    backend: &B,
    wallet: &TronWallet,
    to: &str,
    amount_sun: u64,
) -> WalletResult<String> {
    if amount_sun == 0 {
        return Err(WalletError::invalid_input("transfer amount must be positive"));
    }
    let to_bytes = decode_tron_address(to)?;

    let mut tx = backend.create_transfer(&wallet.address_bytes(), &to_bytes, amount_sun)?;
    log_debug!("tron", "transfer created", txid = tx.txid_hex(), amount = amount_sun);
    tx.sign(wallet)?;
    let txid = tx.send(backend)?;
    LogEntry::new(LogLevel::Info, "tron", "transfer broadcast")
        .field("txid", &txid)
        .address_field("recipient", to)
        .field("trx", format_trx(amount_sun))
        .log();
    Ok(txid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::wallet::ethereum::EthWallet;
    use ethers_core::types::{Signature, H256};
    use std::cell::RefCell;

    const PRIVATE_KEY: &str = "e16ac20fafb7de15445488f1fc6a0e5a05e9efca52acb15de559e4914c8f351d";

    #[derive(Default)]
    struct StubNode {
        broadcasts: RefCell<Vec<TronTransaction>>,
    }

    impl TronBackend for StubNode {
        fn create_transfer(&self, from: &[u8; 21], to: &[u8; 21], amount_sun: u64) -> WalletResult<TronTransaction> {
            let mut raw = Vec::new();
            raw.extend_from_slice(from);
            raw.extend_from_slice(to);
            raw.extend_from_slice(&amount_sun.to_be_bytes());
            Ok(TronTransaction::new(raw))
        }

        fn broadcast(&self, tx: &TronTransaction) -> WalletResult<()> {
            self.broadcasts.borrow_mut().push(tx.clone());
            Ok(())
        }
    }

    #[test]
    fn test_transfer_signs_txid() {
        let node = StubNode::default();
        let wallet = TronWallet::from_private_key_hex(PRIVATE_KEY).unwrap();
        let txid = transfer_trx(&node, &wallet, &wallet.address(), 1_000_000).unwrap();

        let sent = node.broadcasts.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].txid_hex(), txid);
        assert_eq!(sent[0].signatures[0].len(), 65);

        // signature recovers to the shared Ethereum-style account
        let mut sig = sent[0].signatures[0].clone();
        sig[64] += 27;
        let signature = Signature::try_from(sig.as_slice()).unwrap();
        let eth = EthWallet::from_private_key_hex(PRIVATE_KEY, 1).unwrap();
        assert_eq!(signature.recover(H256::from(sent[0].txid())).unwrap(), eth.h160());
    }

    #[test]
    fn test_transfer_validation() {
        let node = StubNode::default();
        let wallet = TronWallet::from_private_key_hex(PRIVATE_KEY).unwrap();
        assert!(transfer_trx(&node, &wallet, &wallet.address(), 0)
            .unwrap_err()
            .is(ErrorCode::InvalidInput));
        assert!(transfer_trx(&node, &wallet, "0x942429aA212ef7cb14DfE06ed0EE78EB82BD298f", 1)
            .unwrap_err()
            .is(ErrorCode::InvalidInput));
        assert!(node.broadcasts.borrow().is_empty());
    }

    #[test]
    fn test_unsigned_send_refused() {
        let node = StubNode::default();
        let tx = TronTransaction::new(vec![1, 2, 3]);
        assert!(tx.send(&node).unwrap_err().is(ErrorCode::SigningFailed));
    }
}
