//! UTXO Transaction Builder
//!
//! Coin selection walks the caller's unspent outputs in order, growing the
//! input set until it covers the outputs plus a fee sized for the inputs
//! picked so far. Change goes back to a caller address at a random
//! position. Signing consumes the unsigned transaction and every input is
//! replayed through libbitcoinconsensus before a signed transaction is
//! handed back.

use crate::chain::{self, UtxoChainParams};
use crate::config::BuilderConfig;
use crate::error::{WalletError, WalletResult};
use crate::fees::rules::{check_output, fee_for_serialize_size, is_dust_amount};
use crate::fees::sizes::InputMix;
use crate::tx::backend::UtxoBackend;
use crate::types::AddressScheme;
use crate::utils::logging::{LogEntry, LogLevel};
use crate::utils::units::{btc_to_satoshi, format_btc};
use crate::{log_debug, log_error, log_info};
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey, Signing};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    ecdsa, Address, Amount, CompressedPublicKey, Network, OutPoint, PublicKey, Script, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness, Wtxid,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Resolves the secret key controlling an address
pub trait SecretsSource {
    fn get_key(&self, address: &Address) -> WalletResult<SecretKey>;
}

/// Spendable output as reported by a node's `listunspent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(rename = "redeemScript", default, skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
    /// Value in BTC
    pub amount: f64,
}

/// Payment to an address, in satoshis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoOutput {
    pub address: String,
    pub amount: u64,
}

impl UtxoOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Parse `address` and require it to belong to `chain`
pub fn parse_address(address: &str, chain: &UtxoChainParams) -> WalletResult<Address> {
    let unchecked = Address::from_str(address.trim())?;
    if !unchecked.is_valid_for_network(chain.network) {
        return Err(WalletError::invalid_input(format!(
            "{} is not a {} address",
            address, chain.name
        )));
    }
    Ok(unchecked.assume_checked())
}

/// Turn payments into outputs, rejecting wrong-network addresses and
/// outputs that fail the dust check at `fee_per_kb`
pub fn make_tx_outputs(outputs: &[UtxoOutput], fee_per_kb: u64, chain: &UtxoChainParams) -> WalletResult<Vec<TxOut>> {
    if outputs.is_empty() {
        return Err(WalletError::invalid_input("tx output is empty"));
    }

    outputs
        .iter()
        .map(|out| {
            let address = parse_address(&out.address, chain)?;
            let tx_out = TxOut {
                value: Amount::from_sat(out.amount),
                script_pubkey: address.script_pubkey(),
            };
            check_output(&tx_out, fee_per_kb)?;
            Ok(tx_out)
        })
        .collect()
}

#[derive(Debug)]
struct SelectedInput {
    tx_in: TxIn,
    value: Amount,
    prev_script: ScriptBuf,
    redeem_script: Option<ScriptBuf>,
}

impl UnspentOutput {
    fn to_selected(&self, sequence: Sequence) -> WalletResult<SelectedInput> {
        let txid = Txid::from_str(self.txid.trim())
            .map_err(|e| WalletError::invalid_input(format!("invalid txid {}: {}", self.txid, e)))?;
        let prev_script = ScriptBuf::from_bytes(hex::decode(self.script_pub_key.trim())?);
        let redeem_script = match self.redeem_script.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(ScriptBuf::from_bytes(hex::decode(s)?)),
            _ => None,
        };
        let value = Amount::from_sat(btc_to_satoshi(self.amount)?);

        Ok(SelectedInput {
            tx_in: TxIn {
                previous_output: OutPoint::new(txid, self.vout),
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::default(),
            },
            value,
            prev_script,
            redeem_script,
        })
    }
}

/// Running state of in-order coin selection
#[derive(Debug)]
struct InputSelector {
    remaining: std::vec::IntoIter<UnspentOutput>,
    sequence: Sequence,
    total: u64,
    selected: Vec<SelectedInput>,
}

impl InputSelector {
    fn new(unspents: Vec<UnspentOutput>, sequence: Sequence) -> Self {
        Self {
            selected: Vec::with_capacity(unspents.len()),
            remaining: unspents.into_iter(),
            sequence,
            total: 0,
        }
    }

    /// Take unspent outputs until `target` is covered or none are left
    fn fill(&mut self, target: u64) -> WalletResult<u64> {
        while self.total < target {
            let Some(next) = self.remaining.next() else {
                break;
            };
            let input = next.to_selected(self.sequence)?;
            self.total = self
                .total
                .checked_add(input.value.to_sat())
                .ok_or_else(|| WalletError::invalid_input("unspent total overflows"))?;
            self.selected.push(input);
        }
        Ok(self.total)
    }

    fn mix(&self) -> InputMix {
        InputMix::classify(self.selected.iter().map(|s| s.prev_script.as_script()))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Single-use builder for one UTXO transaction
///
/// [`build`](Self::build) consumes the builder, so selection state never
/// leaks into a second transaction.
#[derive(Debug)]
pub struct UtxoTransactionBuilder {
    chain: &'static UtxoChainParams,
    change_address: Address,
    change_script: ScriptBuf,
    fee_per_kb: u64,
    config: BuilderConfig,
    selector: InputSelector,
}

impl UtxoTransactionBuilder {
    /// `fee_rate` is in satoshis per virtual byte
    pub fn new(
        chain_id: u32,
        unspents: Vec<UnspentOutput>,
        change_address: &str,
        fee_rate: u64,
    ) -> WalletResult<Self> {
        if fee_rate == 0 {
            return Err(WalletError::invalid_input("fee rate must be positive"));
        }
        let fee_per_kb = fee_rate
            .checked_mul(1000)
            .ok_or_else(|| WalletError::invalid_input(format!("fee rate {} is too large", fee_rate)))?;
        Self::with_fee_per_kb(chain_id, unspents, change_address, fee_per_kb)
    }

    /// Price the transaction at the node's current fee estimate
    pub fn from_backend<B: UtxoBackend + ?Sized>(
        backend: &B,
        chain_id: u32,
        unspents: Vec<UnspentOutput>,
        change_address: &str,
    ) -> WalletResult<Self> {
        let fee_per_kb = backend.estimate_fee_per_kb()?;
        if fee_per_kb == 0 {
            return Err(WalletError::upstream("node returned a zero fee estimate"));
        }
        log_debug!("utxo", "using node fee estimate", fee_per_kb = fee_per_kb);
        Self::with_fee_per_kb(chain_id, unspents, change_address, fee_per_kb)
    }

    fn with_fee_per_kb(
        chain_id: u32,
        unspents: Vec<UnspentOutput>,
        change_address: &str,
        fee_per_kb: u64,
    ) -> WalletResult<Self> {
        let chain = chain::utxo_chain(chain_id)?;
        if unspents.is_empty() {
            return Err(WalletError::invalid_input("no unspent outputs to spend"));
        }
        if change_address.trim().is_empty() {
            return Err(WalletError::invalid_input("change address is required"));
        }
        let change_address = parse_address(change_address, chain)?;

        let config = BuilderConfig::default();
        Ok(Self {
            chain,
            change_script: change_address.script_pubkey(),
            change_address,
            fee_per_kb,
            selector: InputSelector::new(unspents, Sequence(config.input_sequence)),
            config,
        })
    }

    pub fn with_config(mut self, config: BuilderConfig) -> WalletResult<Self> {
        config.validate()?;
        self.selector.sequence = Sequence(config.input_sequence);
        self.config = config;
        Ok(self)
    }

    pub fn fee_per_kb(&self) -> u64 {
        self.fee_per_kb
    }

    pub fn build(self, outputs: &[UtxoOutput]) -> WalletResult<BtcTransaction> {
        self.build_with_rng(outputs, &mut rand::thread_rng())
    }

    /// Build with a caller-supplied RNG for the change position
    pub fn build_with_rng<R: Rng + ?Sized>(
        mut self,
        outputs: &[UtxoOutput],
        rng: &mut R,
    ) -> WalletResult<BtcTransaction> {
        let tx_outs = make_tx_outputs(outputs, self.fee_per_kb, self.chain)?;
        let target_amount = tx_outs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value.to_sat()))
            .ok_or_else(|| WalletError::invalid_input("output total overflows"))?;
        let change_script_size = self.change_script.len();

        // first guess: one P2WPKH input
        let first_guess = InputMix {
            p2wpkh: 1,
            ..InputMix::default()
        };
        let mut target_fee =
            fee_for_serialize_size(self.fee_per_kb, first_guess.virtual_size(&tx_outs, change_script_size)).to_sat();

        let (input_amount, required_fee) = loop {
            let needed = target_amount.saturating_add(target_fee);
            let input_amount = self.selector.fill(needed)?;
            if input_amount < needed {
                return Err(WalletError::insufficient_funds(format!(
                    "have {} sat, need {} sat",
                    input_amount, needed
                )));
            }

            let max_signed_size = self.selector.mix().virtual_size(&tx_outs, change_script_size);
            let max_required_fee = fee_for_serialize_size(self.fee_per_kb, max_signed_size).to_sat();
            if input_amount - target_amount < max_required_fee {
                target_fee = max_required_fee;
                continue;
            }
            break (input_amount, max_required_fee);
        };

        log_debug!(
            "utxo",
            "coin selection done",
            inputs = self.selector.selected.len(),
            total_input = input_amount,
            fee = required_fee
        );

        let mut tx_outs = tx_outs;
        let mut change_index = None;
        let change_amount = input_amount - target_amount - required_fee;
        if change_amount != 0 && !is_dust_amount(change_amount, change_script_size, self.fee_per_kb) {
            tx_outs.push(TxOut {
                value: Amount::from_sat(change_amount),
                script_pubkey: self.change_script.clone(),
            });
            let last = tx_outs.len() - 1;
            let position = if self.config.randomize_change {
                let r = rng.gen_range(0..tx_outs.len());
                tx_outs.swap(r, last);
                r
            } else {
                last
            };
            change_index = Some(position);
            LogEntry::new(LogLevel::Debug, "utxo", "added change output")
                .field("change", change_amount)
                .field("position", position)
                .address_field("change_output", &self.change_address)
                .log();
        } else {
            log_debug!("utxo", "change folded into fee", change = change_amount);
        }

        let mut inputs = Vec::with_capacity(self.selector.selected.len());
        let mut prev_scripts = Vec::with_capacity(inputs.capacity());
        let mut prev_values = Vec::with_capacity(inputs.capacity());
        let mut redeem_scripts = Vec::with_capacity(inputs.capacity());
        for selected in self.selector.selected {
            inputs.push(selected.tx_in);
            prev_scripts.push(selected.prev_script);
            prev_values.push(selected.value);
            redeem_scripts.push(selected.redeem_script);
        }

        let tx = Transaction {
            version: Version(self.config.tx_version),
            lock_time: LockTime::ZERO,
            input: inputs,
            output: tx_outs,
        };

        Ok(BtcTransaction {
            chain: self.chain,
            tx,
            prev_scripts,
            prev_values,
            redeem_scripts,
            total_input: Amount::from_sat(input_amount),
            change_index,
        })
    }
}

// =============================================================================
// Unsigned Transaction
// =============================================================================

/// Selected, unsigned transaction
#[derive(Debug, Clone)]
pub struct BtcTransaction {
    chain: &'static UtxoChainParams,
    tx: Transaction,
    prev_scripts: Vec<ScriptBuf>,
    prev_values: Vec<Amount>,
    redeem_scripts: Vec<Option<ScriptBuf>>,
    total_input: Amount,
    change_index: Option<usize>,
}

struct InputToSign<'a> {
    index: usize,
    prev_script: &'a Script,
    value: Amount,
    redeem_script: Option<&'a Script>,
}

impl BtcTransaction {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn total_input(&self) -> Amount {
        self.total_input
    }

    pub fn total_output(&self) -> Amount {
        total_output(&self.tx)
    }

    pub fn fee(&self) -> Amount {
        self.total_input - self.total_output()
    }

    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    pub fn prev_scripts(&self) -> &[ScriptBuf] {
        &self.prev_scripts
    }

    pub fn prev_values(&self) -> &[Amount] {
        &self.prev_values
    }

    pub fn decode(&self) -> DecodedTransaction {
        decode_transaction(&self.tx, self.chain.network)
    }

    /// Sign every input and replay its script
    ///
    /// Fails with `SignatureValidationFailure` if any input does not
    /// verify; nothing partially signed is returned.
    pub fn sign<S: SecretsSource + ?Sized>(self, secrets: &S) -> WalletResult<SignedBtcTransaction> {
        let secp = Secp256k1::signing_only();
        let mut unlocks = Vec::with_capacity(self.tx.input.len());
        {
            let mut cache = SighashCache::new(&self.tx);
            for (index, prev_script) in self.prev_scripts.iter().enumerate() {
                let input = InputToSign {
                    index,
                    prev_script,
                    value: self.prev_values[index],
                    redeem_script: self.redeem_scripts[index].as_deref(),
                };
                unlocks.push(sign_input(&secp, &mut cache, &input, self.chain.network, secrets)?);
            }
        }

        let BtcTransaction {
            chain,
            mut tx,
            prev_scripts,
            prev_values,
            total_input,
            change_index,
            ..
        } = self;
        for (txin, (script_sig, witness)) in tx.input.iter_mut().zip(unlocks) {
            txin.script_sig = script_sig;
            txin.witness = witness;
        }

        let signed = SignedBtcTransaction {
            chain,
            tx,
            prev_scripts,
            prev_values,
            total_input,
            change_index,
        };
        signed.verify()?;

        log_info!(
            "utxo",
            "signed transaction",
            txid = signed.txid(),
            inputs = signed.tx.input.len(),
            fee_btc = format_btc(signed.fee().to_sat())
        );
        Ok(signed)
    }
}

fn spend_scheme(script: &Script) -> Option<AddressScheme> {
    if script.is_p2pkh() {
        Some(AddressScheme::Legacy)
    } else if script.is_p2wpkh() {
        Some(AddressScheme::NativeSegwit)
    } else if script.is_p2sh() {
        Some(AddressScheme::NestedSegwit)
    } else {
        None
    }
}

fn sign_input<C: Signing, S: SecretsSource + ?Sized>(
    secp: &Secp256k1<C>,
    cache: &mut SighashCache<&Transaction>,
    input: &InputToSign<'_>,
    network: Network,
    secrets: &S,
) -> WalletResult<(ScriptBuf, Witness)> {
    let index = input.index;
    let scheme = spend_scheme(input.prev_script).ok_or_else(|| {
        WalletError::invalid_input(format!("input {}: unsupported previous output script", index))
    })?;
    let address = Address::from_script(input.prev_script, network)
        .map_err(|e| WalletError::invalid_input(format!("input {}: {}", index, e)))?;
    let secret = secrets.get_key(&address)?;
    let public_key = CompressedPublicKey(secret.public_key(secp));

    let sign = |digest: [u8; 32]| {
        ecdsa::Signature::sighash_all(secp.sign_ecdsa(&Message::from_digest(digest), &secret))
    };

    match scheme {
        AddressScheme::Legacy => {
            let sighash = cache
                .legacy_signature_hash(index, input.prev_script, EcdsaSighashType::All.to_u32())
                .map_err(|e| WalletError::internal(format!("input {}: {}", index, e)))?;
            let signature = sign(sighash.to_byte_array());
            let push = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| WalletError::internal(format!("input {}: {}", index, e)))?;
            let script_sig = Builder::new()
                .push_slice(push)
                .push_key(&PublicKey::new(public_key.0))
                .into_script();
            Ok((script_sig, Witness::default()))
        }
        AddressScheme::NativeSegwit => {
            let sighash = cache
                .p2wpkh_signature_hash(index, input.prev_script, input.value, EcdsaSighashType::All)
                .map_err(|e| WalletError::internal(format!("input {}: {}", index, e)))?;
            let signature = sign(sighash.to_byte_array());
            Ok((ScriptBuf::new(), p2wpkh_witness(&signature, &public_key)))
        }
        AddressScheme::NestedSegwit => {
            let program = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash());
            if let Some(redeem) = input.redeem_script {
                if redeem != program.as_script() {
                    return Err(WalletError::signing_failed(format!(
                        "input {}: redeem script is not the key's witness program",
                        index
                    )));
                }
            }
            let sighash = cache
                .p2wpkh_signature_hash(index, &program, input.value, EcdsaSighashType::All)
                .map_err(|e| WalletError::internal(format!("input {}: {}", index, e)))?;
            let signature = sign(sighash.to_byte_array());
            let push = PushBytesBuf::try_from(program.into_bytes())
                .map_err(|e| WalletError::internal(format!("input {}: {}", index, e)))?;
            let script_sig = Builder::new().push_slice(push).into_script();
            Ok((script_sig, p2wpkh_witness(&signature, &public_key)))
        }
    }
}

/// `<sig || sighash flag> <compressed pubkey>`
fn p2wpkh_witness(signature: &ecdsa::Signature, public_key: &CompressedPublicKey) -> Witness {
    let mut witness = Witness::new();
    witness.push(signature.to_vec());
    witness.push(public_key.to_bytes());
    witness
}

// =============================================================================
// Signed Transaction
// =============================================================================

/// Fully signed and verified transaction
#[derive(Debug, Clone)]
pub struct SignedBtcTransaction {
    chain: &'static UtxoChainParams,
    tx: Transaction,
    prev_scripts: Vec<ScriptBuf>,
    prev_values: Vec<Amount>,
    total_input: Amount,
    change_index: Option<usize>,
}

impl SignedBtcTransaction {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn total_input(&self) -> Amount {
        self.total_input
    }

    pub fn total_output(&self) -> Amount {
        total_output(&self.tx)
    }

    /// `total_input - total_output`
    pub fn fee(&self) -> Amount {
        self.total_input - self.total_output()
    }

    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    pub fn raw_bytes(&self) -> Vec<u8> {
        encode::serialize(&self.tx)
    }

    /// Consensus encoding as hex, witness included
    pub fn serialize(&self) -> String {
        hex::encode(self.raw_bytes())
    }

    /// Double SHA-256 of the encoding without witness data
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    pub fn wtxid(&self) -> Wtxid {
        self.tx.compute_wtxid()
    }

    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }

    pub fn decode(&self) -> DecodedTransaction {
        decode_transaction(&self.tx, self.chain.network)
    }

    /// Broadcast through `backend`; returns the node-reported txid
    pub fn send<B: UtxoBackend + ?Sized>(&self, backend: &B, allow_high_fees: bool) -> WalletResult<String> {
        let txid = backend.send_raw_transaction(&self.serialize(), allow_high_fees)?;
        log_info!("utxo", "transaction broadcast", txid = txid);
        Ok(txid)
    }

    fn verify(&self) -> WalletResult<()> {
        let raw = self.raw_bytes();
        for (index, (script, value)) in self.prev_scripts.iter().zip(&self.prev_values).enumerate() {
            if let Err(e) = script.verify(index, *value, &raw) {
                log_error!("utxo", "input failed script verification", index = index);
                return Err(WalletError::signature_validation(format!(
                    "cannot validate input {}: {}",
                    index, e
                )));
            }
        }
        Ok(())
    }
}

fn total_output(tx: &Transaction) -> Amount {
    tx.output.iter().map(|o| o.value).sum()
}

// =============================================================================
// Decoded View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedInput {
    pub txid: String,
    pub vout: u32,
    pub script_sig: String,
    pub witness: Vec<String>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedOutput {
    /// Value in BTC
    pub value: f64,
    pub n: u32,
    pub script_pub_key: String,
    pub address: Option<String>,
}

/// `decoderawtransaction`-style view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub txid: String,
    pub hash: String,
    pub version: i32,
    pub size: usize,
    pub vsize: usize,
    pub weight: u64,
    pub locktime: u32,
    pub vin: Vec<DecodedInput>,
    pub vout: Vec<DecodedOutput>,
}

pub fn decode_transaction(tx: &Transaction, network: Network) -> DecodedTransaction {
    DecodedTransaction {
        txid: tx.compute_txid().to_string(),
        hash: tx.compute_wtxid().to_string(),
        version: tx.version.0,
        size: tx.total_size(),
        vsize: tx.vsize(),
        weight: tx.weight().to_wu(),
        locktime: tx.lock_time.to_consensus_u32(),
        vin: tx
            .input
            .iter()
            .map(|input| DecodedInput {
                txid: input.previous_output.txid.to_string(),
                vout: input.previous_output.vout,
                script_sig: hex::encode(input.script_sig.as_bytes()),
                witness: input.witness.iter().map(hex::encode).collect(),
                sequence: input.sequence.0,
            })
            .collect(),
        vout: tx
            .output
            .iter()
            .enumerate()
            .map(|(n, output)| DecodedOutput {
                value: output.value.to_btc(),
                n: n as u32,
                script_pub_key: hex::encode(output.script_pubkey.as_bytes()),
                address: Address::from_script(&output.script_pubkey, network)
                    .ok()
                    .map(|a| a.to_string()),
            })
            .collect(),
    }
}
