//! Bitcoin-style wallets
//!
//! One compressed secp256k1 key bound to a chain and an address scheme.

use crate::chain::{self, UtxoChainParams};
use crate::error::{WalletError, WalletResult};
use crate::tx::utxo::SecretsSource;
use crate::types::{AddressScheme, Symbol};
use crate::utils::crypto::{base58check_decode, base58check_encode};
use crate::wallet::derivation_path::DerivationPath;
use crate::wallet::hd::{master_node, DerivationMode, KeyNode, Seed};
use crate::wallet::ChainWallet;
use bitcoin::bech32::{segwit, Hrp};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use bitcoin::{Address, CompressedPublicKey, ScriptBuf};
use zeroize::Zeroizing;

/// Flag appended to WIF payloads of compressed keys
const WIF_COMPRESSED: u8 = 0x01;

/// UTXO-chain signing identity
#[derive(Clone)]
pub struct UtxoWallet {
    chain: &'static UtxoChainParams,
    scheme: AddressScheme,
    secret_key: SecretKey,
    public_key: CompressedPublicKey,
    address: String,
}

impl std::fmt::Debug for UtxoWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtxoWallet")
            .field("chain", &self.chain.name)
            .field("scheme", &self.scheme)
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl UtxoWallet {
    pub fn from_secret(secret_key: SecretKey, chain_id: u32, scheme: AddressScheme) -> WalletResult<Self> {
        let chain = chain::utxo_chain(chain_id)?;
        let secp = Secp256k1::signing_only();
        let public_key = CompressedPublicKey(secret_key.public_key(&secp));
        Ok(Self {
            chain,
            scheme,
            secret_key,
            address: encode_address(chain, &public_key, scheme)?,
            public_key,
        })
    }

    /// Wallet for the private key of a derived node
    pub fn from_node(node: &KeyNode, chain_id: u32, scheme: AddressScheme) -> WalletResult<Self> {
        let secret = node
            .private_key()
            .ok_or_else(|| WalletError::derivation("key node has no private key"))?;
        Self::from_secret(*secret, chain_id, scheme)
    }

    /// Derive `path` from `seed` under this chain's master-key domain
    pub fn from_path(
        seed: &Seed,
        path: &DerivationPath,
        chain_id: u32,
        scheme: AddressScheme,
        mode: DerivationMode,
    ) -> WalletResult<Self> {
        let chain = chain::utxo_chain(chain_id)?;
        let master = master_node(seed, chain.hd_seed_key)?;
        let node = master.derive_path(path, mode)?;
        Self::from_node(&node, chain_id, scheme)
    }

    /// Import a compressed-key WIF; its version byte must be the chain's
    pub fn from_wif(wif: &str, chain_id: u32, scheme: AddressScheme) -> WalletResult<Self> {
        let chain = chain::utxo_chain(chain_id)?;
        let payload = Zeroizing::new(base58check_decode(wif.trim())?);
        let (version, body) = payload
            .split_first()
            .ok_or_else(|| WalletError::invalid_input("empty WIF payload"))?;
        if body.len() != 33 || body[32] != WIF_COMPRESSED {
            return Err(WalletError::invalid_input("WIF does not hold a compressed private key"));
        }
        if *version != chain.private_key_id {
            return Err(WalletError::network_mismatch(format!(
                "WIF version 0x{:02x} doesn't match {} (0x{:02x})",
                version, chain.name, chain.private_key_id
            )));
        }
        Self::from_secret(SecretKey::from_slice(&body[..32])?, chain_id, scheme)
    }

    pub fn chain(&self) -> &'static UtxoChainParams {
        self.chain
    }

    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    pub fn public_key(&self) -> &CompressedPublicKey {
        &self.public_key
    }

    /// Address for the bound scheme
    pub fn bitcoin_address(&self) -> Address {
        self.address_for(self.scheme)
    }

    /// Address this key would have under `scheme`
    pub fn address_for(&self, scheme: AddressScheme) -> Address {
        match scheme {
            AddressScheme::Legacy => Address::p2pkh(self.public_key.pubkey_hash(), self.chain.network),
            AddressScheme::NestedSegwit => Address::p2shwpkh(&self.public_key, self.chain.network),
            AddressScheme::NativeSegwit => Address::p2wpkh(&self.public_key, self.chain.network),
        }
    }

    /// Witness program `OP_0 <hash160(pubkey)>` used as P2SH redeem script
    pub fn witness_program(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&self.public_key.wpubkey_hash())
    }

    /// True only for the address of the bound scheme
    pub fn owns(&self, address: &Address) -> bool {
        address.script_pubkey() == self.bitcoin_address().script_pubkey()
    }

    pub fn private_key_wif(&self) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(self.chain.private_key_id);
        payload.extend_from_slice(&self.secret_key.secret_bytes());
        payload.push(WIF_COMPRESSED);
        base58check_encode(&payload)
    }

    pub fn sign_digest(&self, digest: [u8; 32]) -> ecdsa::Signature {
        let secp = Secp256k1::signing_only();
        secp.sign_ecdsa(&Message::from_digest(digest), &self.secret_key)
    }
}

impl ChainWallet for UtxoWallet {
    fn symbol(&self) -> Symbol {
        Symbol::Btc
    }

    fn chain_id(&self) -> u64 {
        self.chain.chain_id as u64
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.to_bytes())
    }

    fn private_key_export(&self) -> String {
        self.private_key_wif()
    }

    /// DER-encoded ECDSA signature
    fn sign_hash(&self, digest: &[u8; 32]) -> WalletResult<Vec<u8>> {
        Ok(self.sign_digest(*digest).serialize_der().to_vec())
    }
}

impl SecretsSource for UtxoWallet {
    fn get_key(&self, address: &Address) -> WalletResult<SecretKey> {
        if self.owns(address) {
            Ok(self.secret_key)
        } else {
            Err(WalletError::signing_failed(format!(
                "address not match: {}",
                address
            )))
        }
    }
}

/// Address string of `scheme` built from the registry's version bytes and HRP
fn encode_address(
    chain: &UtxoChainParams,
    public_key: &CompressedPublicKey,
    scheme: AddressScheme,
) -> WalletResult<String> {
    let pubkey_hash = hash160::Hash::hash(&public_key.to_bytes());
    match scheme {
        AddressScheme::Legacy => Ok(versioned(chain.pubkey_hash_addr_id, pubkey_hash.as_byte_array())),
        AddressScheme::NestedSegwit => {
            let program = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash());
            let script_hash = hash160::Hash::hash(program.as_bytes());
            Ok(versioned(chain.script_hash_addr_id, script_hash.as_byte_array()))
        }
        AddressScheme::NativeSegwit => {
            let hrp = Hrp::parse(chain.bech32_hrp)
                .map_err(|e| WalletError::internal(format!("invalid HRP {}: {}", chain.bech32_hrp, e)))?;
            segwit::encode_v0(hrp, pubkey_hash.as_byte_array())
                .map_err(|e| WalletError::internal(format!("bech32 encoding failed: {}", e)))
        }
    }
}

fn versioned(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(version);
    bytes.extend_from_slice(payload);
    base58check_encode(&bytes)
}
