//! Account Transaction Composer
//!
//! Resolves one of two mutually exclusive fee models from the latest
//! header, fills in nonce and gas limit, and signs a legacy (EIP-155) or
//! dynamic-fee (EIP-1559) envelope. Every node call goes through an
//! [`AccountBackend`]; its errors are returned as-is and nothing is
//! retried.

use crate::config::ComposerConfig;
use crate::error::{WalletError, WalletResult};
use crate::tx::backend::{AccountBackend, ChainHeader};
use crate::utils::crypto::keccak256;
use crate::utils::units::{calc_eth_fee, wei_to_gwei};
use crate::wallet::ethereum::EthWallet;
use crate::wallet::ChainWallet;
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, Eip1559TransactionRequest, Signature, TransactionRequest, H256, U256};
use serde::{Deserialize, Serialize};

/// Caller-side gas settings for one transaction
///
/// `gas_price` is only consulted on chains without a base fee;
/// `gas_fee_cap` and `gas_tip_cap` only on chains with one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasParams {
    pub from: Address,
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas_fee_cap: Option<U256>,
    pub gas_tip_cap: Option<U256>,
}

impl GasParams {
    pub fn new(from: Address, value: U256) -> Self {
        Self {
            from,
            value,
            ..Default::default()
        }
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn gas_fee_cap(mut self, fee_cap: U256) -> Self {
        self.gas_fee_cap = Some(fee_cap);
        self
    }

    pub fn gas_tip_cap(mut self, tip_cap: U256) -> Self {
        self.gas_tip_cap = Some(tip_cap);
        self
    }
}

/// Resolved fee model; exactly one variant is ever populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeModel {
    Legacy {
        gas_price: U256,
    },
    Dynamic {
        fee_cap: U256,
        tip_cap: U256,
        base_fee: U256,
    },
}

impl FeeModel {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, FeeModel::Dynamic { .. })
    }

    pub fn gas_price(&self) -> Option<U256> {
        match self {
            FeeModel::Legacy { gas_price } => Some(*gas_price),
            FeeModel::Dynamic { .. } => None,
        }
    }

    pub fn fee_cap(&self) -> Option<U256> {
        match self {
            FeeModel::Dynamic { fee_cap, .. } => Some(*fee_cap),
            FeeModel::Legacy { .. } => None,
        }
    }

    pub fn tip_cap(&self) -> Option<U256> {
        match self {
            FeeModel::Dynamic { tip_cap, .. } => Some(*tip_cap),
            FeeModel::Legacy { .. } => None,
        }
    }

    /// Per-gas price paid at the resolved base fee
    pub fn effective_gas_price(&self) -> U256 {
        match self {
            FeeModel::Legacy { gas_price } => *gas_price,
            FeeModel::Dynamic {
                fee_cap,
                tip_cap,
                base_fee,
            } => base_fee.saturating_add(*tip_cap).min(*fee_cap),
        }
    }

    /// Highest per-gas price the sender can be charged
    pub fn max_gas_price(&self) -> U256 {
        match self {
            FeeModel::Legacy { gas_price } => *gas_price,
            FeeModel::Dynamic { fee_cap, .. } => *fee_cap,
        }
    }
}

/// Per-transfer knobs; everything left `None` is resolved from the node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Zero is treated as unset
    pub gas_limit: Option<u64>,
    pub nonce: Option<u64>,
    pub data: Option<Bytes>,
    /// Sign only; skip the broadcast
    pub dry_run: bool,
}

/// Signed account-model transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub tx: TypedTransaction,
    pub signature: Signature,
    pub raw: Bytes,
    pub hash: H256,
    pub fee_model: FeeModel,
    pub nonce: u64,
    pub gas_limit: u64,
    pub broadcast: bool,
}

impl SignedEnvelope {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn effective_gas_price(&self) -> U256 {
        self.fee_model.effective_gas_price()
    }

    /// Upper bound on the fee: `gas_limit * max_gas_price`
    pub fn max_fee(&self) -> U256 {
        calc_eth_fee(self.gas_limit, self.fee_model.max_gas_price())
    }
}

/// Composes transfers against one node
pub struct TransactionComposer<'a, B: ?Sized> {
    backend: &'a B,
    config: ComposerConfig,
}

impl<'a, B: AccountBackend + ?Sized> TransactionComposer<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            config: ComposerConfig::default(),
        }
    }

    pub fn with_config(backend: &'a B, config: ComposerConfig) -> WalletResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Pick the fee model implied by `header`
    ///
    /// With a base fee: suggest a tip if none is given, default the cap to
    /// `tip + multiplier * base_fee`, and reject a cap below the tip.
    /// Without one: suggest a gas price if none is given.
    pub fn resolve_fee_model(&self, header: &ChainHeader, params: &GasParams) -> WalletResult<FeeModel> {
        let model = match header.base_fee {
            None => {
                let gas_price = match params.gas_price {
                    Some(price) => price,
                    None => self.backend.suggest_gas_price()?,
                };
                FeeModel::Legacy { gas_price }
            }
            Some(base_fee) => {
                let tip_cap = match params.gas_tip_cap {
                    Some(tip) => tip,
                    None => self.backend.suggest_gas_tip_cap()?,
                };
                let fee_cap = match params.gas_fee_cap {
                    Some(cap) => cap,
                    None => base_fee
                        .checked_mul(U256::from(self.config.base_fee_multiplier))
                        .and_then(|b| b.checked_add(tip_cap))
                        .ok_or_else(|| WalletError::invalid_input("fee cap overflows"))?,
                };
                if fee_cap < tip_cap {
                    return Err(WalletError::fee_cap_below_tip_cap(format!(
                        "maxFeePerGas ({}) < maxPriorityFeePerGas ({})",
                        fee_cap, tip_cap
                    )));
                }
                FeeModel::Dynamic {
                    fee_cap,
                    tip_cap,
                    base_fee,
                }
            }
        };

        log_info!(
            "account",
            "resolved fee model",
            dynamic = model.is_dynamic(),
            max_gas_price_gwei = wei_to_gwei(model.max_gas_price()),
            block = header.number
        );
        Ok(model)
    }

    /// Explicit nonce, or the sender's pending nonce
    pub fn resolve_nonce(&self, from: Address, nonce: Option<u64>) -> WalletResult<u64> {
        let nonce = match nonce {
            Some(n) => n,
            None => self.backend.pending_nonce(from)?,
        };
        log_debug!("account", "resolved nonce", nonce = nonce);
        Ok(nonce)
    }

    /// Build, sign and (unless `dry_run`) broadcast a transfer to `to`
    pub fn compose_transfer(
        &self,
        wallet: &EthWallet,
        params: &GasParams,
        to: Address,
        options: &TransferOptions,
    ) -> WalletResult<SignedEnvelope> {
        if params.from != wallet.h160() {
            return Err(WalletError::invalid_input(format!(
                "sender {:?} is not the wallet address {}",
                params.from,
                wallet.address()
            )));
        }

        let nonce = self.resolve_nonce(params.from, options.nonce)?;
        let header = self.backend.header()?;
        let fee_model = self.resolve_fee_model(&header, params)?;

        let data = options.data.clone().unwrap_or_default();
        let mut tx = envelope(&fee_model, params, to, nonce, data.clone(), wallet.chain_id());

        let gas_limit = match options.gas_limit.filter(|g| *g > 0) {
            Some(gas) => gas,
            None if !data.is_empty() => self.backend.estimate_gas(&tx)?,
            None => self.config.default_gas_limit,
        };
        tx.set_gas(gas_limit);

        let signature = wallet.sign_transaction(&tx)?;
        let raw = tx.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));

        let mut signed = SignedEnvelope {
            tx,
            signature,
            raw,
            hash,
            fee_model,
            nonce,
            gas_limit,
            broadcast: false,
        };

        if options.dry_run {
            log_info!("account", "dry run, not broadcasting", tx_hash = format!("{:?}", hash));
            return Ok(signed);
        }

        let reported = self.backend.send_raw_transaction(&signed.raw)?;
        if reported != hash {
            log_warn!(
                "account",
                "node reported a different transaction hash",
                tx_hash = format!("{:?}", hash),
                reported_hash = format!("{:?}", reported)
            );
        }
        signed.broadcast = true;
        log_info!("account", "transaction broadcast", tx_hash = format!("{:?}", hash), nonce = nonce);
        Ok(signed)
    }
}

fn envelope(
    fee_model: &FeeModel,
    params: &GasParams,
    to: Address,
    nonce: u64,
    data: Bytes,
    chain_id: u64,
) -> TypedTransaction {
    match *fee_model {
        FeeModel::Legacy { gas_price } => TransactionRequest::new()
            .from(params.from)
            .to(to)
            .value(params.value)
            .gas_price(gas_price)
            .nonce(nonce)
            .data(data)
            .chain_id(chain_id)
            .into(),
        FeeModel::Dynamic { fee_cap, tip_cap, .. } => Eip1559TransactionRequest::new()
            .from(params.from)
            .to(to)
            .value(params.value)
            .max_fee_per_gas(fee_cap)
            .max_priority_fee_per_gas(tip_cap)
            .nonce(nonce)
            .data(data)
            .chain_id(chain_id)
            .into(),
    }
}
