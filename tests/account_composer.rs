//! Account-model composition against a scripted node

use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::keccak256;
use hdwallet_core::chain::{account_chain_ids, utxo_chain_ids};
use hdwallet_core::tx::{AccountBackend, ChainHeader, FeeModel, GasParams, TransactionComposer, TransferOptions};
use hdwallet_core::types::{ChangeType, Symbol};
use hdwallet_core::wallet::ethereum::EthWallet;
use hdwallet_core::wallet::{DerivationMode, HdWallet};
use hdwallet_core::{ComposerConfig, ErrorCode, WalletError, WalletResult};
use std::cell::{Cell, RefCell};

const PHRASE: &str = "purse cheese cage reason cost flat jump usage hospital grit delay loan";

struct ScriptedNode {
    base_fee: Option<U256>,
    gas_price: U256,
    tip_cap: U256,
    nonce: u64,
    estimated_gas: u64,
    fail_header: bool,
    nonce_calls: Cell<usize>,
    estimate_calls: Cell<usize>,
    sent: RefCell<Vec<Bytes>>,
}

impl ScriptedNode {
    fn london() -> Self {
        Self {
            base_fee: Some(U256::from(30_000_000_000u64)),
            gas_price: U256::from(40_000_000_000u64),
            tip_cap: U256::from(1_500_000_000u64),
            nonce: 9,
            estimated_gas: 55_000,
            fail_header: false,
            nonce_calls: Cell::new(0),
            estimate_calls: Cell::new(0),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn pre_london() -> Self {
        Self {
            base_fee: None,
            ..Self::london()
        }
    }
}

impl AccountBackend for ScriptedNode {
    fn header(&self) -> WalletResult<ChainHeader> {
        if self.fail_header {
            return Err(WalletError::upstream("header request timed out"));
        }
        Ok(ChainHeader {
            number: 17_000_000,
            base_fee: self.base_fee,
        })
    }

    fn suggest_gas_price(&self) -> WalletResult<U256> {
        Ok(self.gas_price)
    }

    fn suggest_gas_tip_cap(&self) -> WalletResult<U256> {
        Ok(self.tip_cap)
    }

    fn pending_nonce(&self, _address: Address) -> WalletResult<u64> {
        self.nonce_calls.set(self.nonce_calls.get() + 1);
        Ok(self.nonce)
    }

    fn estimate_gas(&self, _tx: &TypedTransaction) -> WalletResult<u64> {
        self.estimate_calls.set(self.estimate_calls.get() + 1);
        Ok(self.estimated_gas)
    }

    fn send_raw_transaction(&self, raw: &Bytes) -> WalletResult<H256> {
        self.sent.borrow_mut().push(raw.clone());
        Ok(H256::from(keccak256(raw)))
    }
}

fn eth_wallet() -> EthWallet {
    let hd = HdWallet::new(PHRASE, "", utxo_chain_ids::TESTNET3, account_chain_ids::ETH_GOERLI).unwrap();
    let wallet = hd
        .new_wallet(Symbol::Eth, 0, ChangeType::External, 0, DerivationMode::Legacy)
        .unwrap();
    wallet.as_ethereum().unwrap().clone()
}

fn recipient() -> Address {
    "0x3295Db1E775723c752511c4E4caA400dbaf2240F".parse().unwrap()
}

#[test]
fn dynamic_fee_transfer_is_broadcast() {
    let node = ScriptedNode::london();
    let wallet = eth_wallet();
    let composer = TransactionComposer::new(&node);

    let params = GasParams::new(wallet.h160(), U256::exp10(16));
    let signed = composer
        .compose_transfer(&wallet, &params, recipient(), &TransferOptions::default())
        .unwrap();

    assert!(signed.broadcast);
    assert_eq!(signed.nonce, 9);
    assert_eq!(signed.gas_limit, 21_000);
    assert_eq!(node.estimate_calls.get(), 0);
    assert_eq!(
        signed.fee_model,
        FeeModel::Dynamic {
            fee_cap: U256::from(61_500_000_000u64),
            tip_cap: U256::from(1_500_000_000u64),
            base_fee: U256::from(30_000_000_000u64),
        }
    );
    assert!(matches!(signed.tx, TypedTransaction::Eip1559(_)));
    assert_eq!(signed.raw.as_ref()[0], 0x02);

    let sent = node.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], signed.raw);
    assert_eq!(signed.signature.recover(signed.tx.sighash()).unwrap(), wallet.h160());
}

#[test]
fn legacy_node_uses_suggested_gas_price() {
    let node = ScriptedNode::pre_london();
    let wallet = eth_wallet();
    let composer = TransactionComposer::new(&node);

    let params = GasParams::new(wallet.h160(), U256::one());
    let signed = composer
        .compose_transfer(
            &wallet,
            &params,
            recipient(),
            &TransferOptions {
                nonce: Some(3),
                dry_run: true,
                ..TransferOptions::default()
            },
        )
        .unwrap();

    assert!(!signed.broadcast);
    assert_eq!(signed.nonce, 3);
    assert_eq!(node.nonce_calls.get(), 0);
    assert!(node.sent.borrow().is_empty());
    assert_eq!(
        signed.fee_model,
        FeeModel::Legacy {
            gas_price: U256::from(40_000_000_000u64)
        }
    );
    assert!(matches!(signed.tx, TypedTransaction::Legacy(_)));
    assert_eq!(signed.max_fee(), U256::from(40_000_000_000u64) * U256::from(21_000u64));
}

#[test]
fn calldata_triggers_gas_estimation() {
    let node = ScriptedNode::london();
    let wallet = eth_wallet();
    let composer = TransactionComposer::new(&node);

    let params = GasParams::new(wallet.h160(), U256::zero());
    let signed = composer
        .compose_transfer(
            &wallet,
            &params,
            recipient(),
            &TransferOptions {
                gas_limit: Some(0),
                data: Some(Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb])),
                dry_run: true,
                ..TransferOptions::default()
            },
        )
        .unwrap();
    assert_eq!(signed.gas_limit, 55_000);
    assert_eq!(node.estimate_calls.get(), 1);
}

#[test]
fn fee_cap_below_tip_is_rejected() {
    let node = ScriptedNode::london();
    let wallet = eth_wallet();
    let composer = TransactionComposer::new(&node);

    let params = GasParams::new(wallet.h160(), U256::one())
        .gas_fee_cap(U256::from(1_000u64))
        .gas_tip_cap(U256::from(2_000u64));
    let err = composer
        .compose_transfer(&wallet, &params, recipient(), &TransferOptions::default())
        .unwrap_err();
    assert!(err.is(ErrorCode::FeeCapBelowTipCap));
    assert!(node.sent.borrow().is_empty());
}

#[test]
fn upstream_failure_is_not_rewrapped() {
    let mut node = ScriptedNode::london();
    node.fail_header = true;
    let wallet = eth_wallet();
    let composer = TransactionComposer::new(&node);

    let err = composer
        .compose_transfer(
            &wallet,
            &GasParams::new(wallet.h160(), U256::one()),
            recipient(),
            &TransferOptions::default(),
        )
        .unwrap_err();
    assert!(err.is(ErrorCode::UpstreamFailure));
    assert!(err.to_string().contains("header request timed out"));
}

#[test]
fn configured_multiplier_and_gas() {
    let node = ScriptedNode::london();
    let wallet = eth_wallet();
    let config = ComposerConfig::from_json(r#"{"default_gas_limit": 30000, "base_fee_multiplier": 3}"#).unwrap();
    let composer = TransactionComposer::with_config(&node, config).unwrap();

    let signed = composer
        .compose_transfer(
            &wallet,
            &GasParams::new(wallet.h160(), U256::one()),
            recipient(),
            &TransferOptions {
                dry_run: true,
                ..TransferOptions::default()
            },
        )
        .unwrap();
    assert_eq!(signed.gas_limit, 30_000);
    assert_eq!(signed.fee_model.fee_cap(), Some(U256::from(91_500_000_000u64)));
}
