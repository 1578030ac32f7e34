//! End-to-end UTXO flow: derive, select, sign, verify, broadcast

use bitcoin::consensus::deserialize;
use bitcoin::{Amount, Transaction};
use hdwallet_core::chain::{account_chain_ids, utxo_chain_ids};
use hdwallet_core::fees::{estimate_fee, InputMix};
use hdwallet_core::tx::{UnspentOutput, UtxoBackend, UtxoOutput, UtxoTransactionBuilder};
use hdwallet_core::types::{AddressScheme, ChangeType};
use hdwallet_core::wallet::bitcoin::UtxoWallet;
use hdwallet_core::wallet::{ChainWallet, DerivationMode, HdWallet};
use hdwallet_core::{BuilderConfig, ErrorCode, WalletError, WalletResult};
use std::cell::RefCell;

const PHRASE: &str = "purse cheese cage reason cost flat jump usage hospital grit delay loan";
const RECIPIENT: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

struct MockNode {
    fee_per_kb: u64,
    accept: bool,
    sent: RefCell<Vec<(String, bool)>>,
}

impl MockNode {
    fn new(fee_per_kb: u64) -> Self {
        Self {
            fee_per_kb,
            accept: true,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl UtxoBackend for MockNode {
    fn estimate_fee_per_kb(&self) -> WalletResult<u64> {
        Ok(self.fee_per_kb)
    }

    fn send_raw_transaction(&self, raw_tx_hex: &str, allow_high_fees: bool) -> WalletResult<String> {
        if !self.accept {
            return Err(WalletError::upstream("node rejected transaction"));
        }
        self.sent.borrow_mut().push((raw_tx_hex.to_string(), allow_high_fees));
        let raw = hex::decode(raw_tx_hex).map_err(|e| WalletError::upstream(e.to_string()))?;
        let tx: Transaction = deserialize(&raw).map_err(|e| WalletError::upstream(e.to_string()))?;
        Ok(tx.compute_txid().to_string())
    }
}

fn native_wallet() -> UtxoWallet {
    let hd = HdWallet::new(PHRASE, "", utxo_chain_ids::TESTNET3, account_chain_ids::ETH_GOERLI).unwrap();
    let wallet = hd
        .new_native_segwit_wallet(0, ChangeType::External, 0, DerivationMode::Standard)
        .unwrap();
    wallet.as_utxo().unwrap().clone()
}

fn unspent(wallet: &UtxoWallet, seq: u8, sats: u64) -> UnspentOutput {
    UnspentOutput {
        txid: format!("{:02x}", seq).repeat(32),
        vout: 0,
        script_pub_key: wallet.bitcoin_address().script_pubkey().to_hex_string(),
        redeem_script: None,
        amount: Amount::from_sat(sats).to_btc(),
    }
}

#[test]
fn build_sign_and_broadcast() {
    let wallet = native_wallet();
    let node = MockNode::new(5_000);
    let fee_rate = node.estimate_fee_per_kb().unwrap() / 1000;

    let unspents = vec![unspent(&wallet, 1, 40_000), unspent(&wallet, 2, 40_000)];
    let builder = UtxoTransactionBuilder::new(utxo_chain_ids::TESTNET3, unspents, &wallet.address(), fee_rate).unwrap();
    assert_eq!(builder.fee_per_kb(), 5_000);

    let signed = builder
        .build(&[UtxoOutput::new(RECIPIENT, 60_000)])
        .unwrap()
        .sign(&wallet)
        .unwrap();

    assert_eq!(signed.tx().input.len(), 2);
    assert_eq!(signed.total_input(), signed.total_output() + signed.fee());

    let estimate = estimate_fee(
        InputMix {
            p2wpkh: 2,
            ..InputMix::default()
        },
        &[UtxoOutput::new(RECIPIENT, 60_000)],
        5_000,
        None,
        utxo_chain_ids::TESTNET3,
    )
    .unwrap();
    assert_eq!(signed.fee(), Amount::from_sat(estimate.fee));
    assert!(signed.vsize() <= estimate.vsize);

    let txid = signed.send(&node, false).unwrap();
    assert_eq!(txid, signed.txid().to_string());
    let sent = node.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, signed.serialize());
    assert!(!sent[0].1);
}

#[test]
fn configured_version_and_fixed_change_position() {
    let wallet = native_wallet();
    let config = BuilderConfig::from_json(r#"{"tx_version": 2, "randomize_change": false}"#).unwrap();
    let signed = UtxoTransactionBuilder::new(
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 3, 90_000)],
        &wallet.address(),
        2,
    )
    .unwrap()
    .with_config(config)
    .unwrap()
    .build(&[UtxoOutput::new(RECIPIENT, 10_000), UtxoOutput::new(RECIPIENT, 20_000)])
    .unwrap()
    .sign(&wallet)
    .unwrap();

    assert_eq!(signed.tx().version.0, 2);
    assert_eq!(signed.change_index(), Some(2));
    let decoded = signed.decode();
    assert_eq!(decoded.vout.len(), 3);
    assert_eq!(decoded.vout[2].address.as_deref(), Some(wallet.address().as_str()));
}

#[test]
fn insufficient_funds_before_signing() {
    let wallet = native_wallet();
    let err = UtxoTransactionBuilder::new(
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 4, 10_000)],
        &wallet.address(),
        1,
    )
    .unwrap()
    .build(&[UtxoOutput::new(RECIPIENT, 10_000)])
    .unwrap_err();
    assert!(err.is(ErrorCode::InsufficientFunds));
}

#[test]
fn upstream_failure_passes_through() {
    let wallet = native_wallet();
    let mut node = MockNode::new(1_000);
    node.accept = false;
    let signed = UtxoTransactionBuilder::new(
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 5, 50_000)],
        &wallet.address(),
        1,
    )
    .unwrap()
    .build(&[UtxoOutput::new(RECIPIENT, 20_000)])
    .unwrap()
    .sign(&wallet)
    .unwrap();

    let err = signed.send(&node, true).unwrap_err();
    assert!(err.is(ErrorCode::UpstreamFailure));
    assert!(node.sent.borrow().is_empty());
}

#[test]
fn wallet_of_another_scheme_cannot_sign() {
    let wallet = native_wallet();
    let legacy = UtxoWallet::from_wif(&wallet.private_key_export(), utxo_chain_ids::TESTNET3, AddressScheme::Legacy)
        .unwrap();
    let mut nested_unspent = unspent(&wallet, 6, 50_000);
    nested_unspent.script_pub_key = legacy
        .address_for(AddressScheme::NestedSegwit)
        .script_pubkey()
        .to_hex_string();
    nested_unspent.redeem_script = Some(legacy.witness_program().to_hex_string());

    // same key, but the wallet only answers for its own scheme's address
    let unsigned = UtxoTransactionBuilder::new(
        utxo_chain_ids::TESTNET3,
        vec![nested_unspent],
        &wallet.address(),
        1,
    )
    .unwrap()
    .build(&[UtxoOutput::new(RECIPIENT, 20_000)])
    .unwrap();
    let err = unsigned.clone().sign(&legacy).unwrap_err();
    assert!(err.is(ErrorCode::SigningFailed));

    let nested = UtxoWallet::from_wif(
        &wallet.private_key_export(),
        utxo_chain_ids::TESTNET3,
        AddressScheme::NestedSegwit,
    )
    .unwrap();
    let signed = unsigned.sign(&nested).unwrap();
    assert_eq!(signed.tx().input[0].witness.len(), 2);
}

#[test]
fn builder_takes_fee_rate_from_node() {
    let wallet = native_wallet();
    let node = MockNode::new(5_000);
    let builder = UtxoTransactionBuilder::from_backend(
        &node,
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 7, 40_000)],
        &wallet.address(),
    )
    .unwrap();
    assert_eq!(builder.fee_per_kb(), 5_000);

    let err = UtxoTransactionBuilder::from_backend(
        &MockNode::new(0),
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 7, 40_000)],
        &wallet.address(),
    )
    .unwrap_err();
    assert!(err.is(ErrorCode::UpstreamFailure));
}

struct OddTxidNode;

impl UtxoBackend for OddTxidNode {
    fn estimate_fee_per_kb(&self) -> WalletResult<u64> {
        Ok(1_000)
    }

    fn send_raw_transaction(&self, _raw_tx_hex: &str, _allow_high_fees: bool) -> WalletResult<String> {
        Ok(format!("a{}", "é".repeat(20)))
    }
}

#[test]
fn non_ascii_txid_from_node_is_returned() {
    let wallet = native_wallet();
    let signed = UtxoTransactionBuilder::from_backend(
        &OddTxidNode,
        utxo_chain_ids::TESTNET3,
        vec![unspent(&wallet, 8, 50_000)],
        &wallet.address(),
    )
    .unwrap()
    .build(&[UtxoOutput::new(RECIPIENT, 20_000)])
    .unwrap()
    .sign(&wallet)
    .unwrap();

    let txid = signed.send(&OddTxidNode, false).unwrap();
    assert_eq!(txid, format!("a{}", "é".repeat(20)));
}
