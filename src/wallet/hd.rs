//! HD Key Tree
//!
//! BIP-32 master-key generation and child derivation over secp256k1.
//!
//! Two derivation modes are supported and must be chosen per call:
//!
//! - [`DerivationMode::Standard`]: BIP-32 as written.
//! - [`DerivationMode::Legacy`]: reproduces wallets that kept non-root
//!   private keys without their leading zero bytes and fed that short key
//!   into the hardened-child HMAC. Only nodes whose private key starts with
//!   a zero byte are affected; every other node derives identically in
//!   both modes.

use crate::error::{WalletError, WalletResult};
use crate::log_warn;
use crate::wallet::derivation_path::{DerivationComponent, DerivationPath};
use bitcoin::hashes::{hash160, Hash};
use hmac::{Hmac, Mac};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

pub const MIN_SEED_BYTES: usize = 16;
pub const MAX_SEED_BYTES: usize = 64;
pub const MAX_DEPTH: u8 = u8::MAX;

/// Child derivation algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationMode {
    Standard,
    Legacy,
}

/// Root seed material, zeroized on drop
pub struct Seed(Zeroizing<Vec<u8>>);

impl Seed {
    pub fn new(bytes: &[u8]) -> WalletResult<Self> {
        if !(MIN_SEED_BYTES..=MAX_SEED_BYTES).contains(&bytes.len()) {
            return Err(WalletError::invalid_input(format!(
                "seed length must be between {} and {} bytes, got {}",
                MIN_SEED_BYTES,
                MAX_SEED_BYTES,
                bytes.len()
            )));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed([REDACTED:{}bytes])", self.0.len())
    }
}

/// One node of the key tree
#[derive(Clone)]
pub struct KeyNode {
    private_key: Option<SecretKey>,
    public_key: PublicKey,
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: DerivationComponent,
}

impl fmt::Debug for KeyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNode")
            .field("private", &self.private_key.is_some())
            .field("public_key", &self.public_key)
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number.to_string())
            .finish()
    }
}

/// Derive the root node of a seed under an HMAC domain key
pub fn master_node(seed: &Seed, domain_key: &[u8]) -> WalletResult<KeyNode> {
    let digest = hmac_sha512(domain_key, seed.as_bytes())?;
    let (il, ir) = digest.split_at(32);

    let secret = SecretKey::from_slice(il)
        .map_err(|_| WalletError::derivation("seed produces an unusable master key"))?;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(ir);

    let secp = Secp256k1::new();
    Ok(KeyNode {
        private_key: Some(secret),
        public_key: PublicKey::from_secret_key(&secp, &secret),
        chain_code,
        depth: 0,
        parent_fingerprint: [0u8; 4],
        child_number: DerivationComponent::from_full_index(0),
    })
}

/// Parse `path` and derive it from `master`
pub fn derive_by_path(master: &KeyNode, path: &str, mode: DerivationMode) -> WalletResult<KeyNode> {
    let parsed: DerivationPath = path.parse()?;
    master.derive_path(&parsed, mode)
}

impl KeyNode {
    /// Rebuild a private node from its serialized parts
    pub fn from_private_parts(
        private_key: SecretKey,
        chain_code: [u8; 32],
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: DerivationComponent,
    ) -> Self {
        let secp = Secp256k1::signing_only();
        Self {
            private_key: Some(private_key),
            public_key: PublicKey::from_secret_key(&secp, &private_key),
            chain_code,
            depth,
            parent_fingerprint,
            child_number,
        }
    }

    pub fn private_key(&self) -> Option<&SecretKey> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> DerivationComponent {
        self.child_number
    }

    pub fn is_private(&self) -> bool {
        self.private_key.is_some()
    }

    /// First four bytes of hash160 of the compressed public key
    pub fn fingerprint(&self) -> [u8; 4] {
        let hash = hash160::Hash::hash(&self.public_key.serialize());
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&hash.as_byte_array()[..4]);
        fingerprint
    }

    /// Same node without private material
    pub fn neuter(&self) -> KeyNode {
        KeyNode {
            private_key: None,
            ..self.clone()
        }
    }

    /// True when hardened children of this node differ between modes
    pub fn is_legacy_divergent(&self) -> bool {
        match &self.private_key {
            Some(secret) => self.depth > 0 && secret.secret_bytes()[0] == 0,
            None => false,
        }
    }

    /// Derive the child at `component`
    pub fn derive_child(&self, component: DerivationComponent, mode: DerivationMode) -> WalletResult<KeyNode> {
        let secp = Secp256k1::new();
        self.derive_child_with(&secp, component, mode)
    }

    /// Derive every component of `path` in order, starting from this node
    pub fn derive_path(&self, path: &DerivationPath, mode: DerivationMode) -> WalletResult<KeyNode> {
        let secp = Secp256k1::new();
        let mut node = self.clone();
        for component in path.components() {
            node = node.derive_child_with(&secp, *component, mode)?;
        }
        Ok(node)
    }

    fn derive_child_with(
        &self,
        secp: &Secp256k1<All>,
        component: DerivationComponent,
        mode: DerivationMode,
    ) -> WalletResult<KeyNode> {
        if self.depth == MAX_DEPTH {
            return Err(WalletError::derivation("cannot derive beyond depth 255"));
        }

        let mut data = Zeroizing::new(Vec::with_capacity(37));
        if component.is_hardened() {
            let secret = self.private_key.as_ref().ok_or_else(|| {
                WalletError::derivation("cannot derive a hardened child from a public key")
            })?;
            data.push(0u8);
            match mode {
                DerivationMode::Standard => data.extend_from_slice(&secret.secret_bytes()),
                DerivationMode::Legacy => {
                    if self.is_legacy_divergent() {
                        log_warn!(
                            "hd",
                            "legacy derivation diverges from BIP32 at this node",
                            depth = self.depth,
                            child = component
                        );
                    }
                    data.extend_from_slice(&self.legacy_key_bytes(secret));
                    data.resize(33, 0);
                }
            }
        } else {
            data.extend_from_slice(&self.public_key.serialize());
        }
        data.extend_from_slice(&component.full_index().to_be_bytes());

        let digest = hmac_sha512(&self.chain_code, &data)?;
        let (il, ir) = digest.split_at(32);
        let tweak = SecretKey::from_slice(il).map_err(|_| {
            WalletError::derivation(format!("child {} is invalid, use the next index", component))
        })?;

        let (private_key, public_key) = match &self.private_key {
            Some(parent) => {
                let child = tweak.add_tweak(&Scalar::from(*parent)).map_err(|_| {
                    WalletError::derivation(format!("child {} is invalid, use the next index", component))
                })?;
                (Some(child), PublicKey::from_secret_key(secp, &child))
            }
            None => {
                let child = self
                    .public_key
                    .add_exp_tweak(secp, &Scalar::from(tweak))
                    .map_err(|_| {
                        WalletError::derivation(format!("child {} is invalid, use the next index", component))
                    })?;
                (None, child)
            }
        };

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(KeyNode {
            private_key,
            public_key,
            chain_code,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: component,
        })
    }

    /// Private key bytes as legacy wallets kept them
    fn legacy_key_bytes(&self, secret: &SecretKey) -> Zeroizing<Vec<u8>> {
        let bytes = secret.secret_bytes();
        if self.depth == 0 {
            return Zeroizing::new(bytes.to_vec());
        }
        let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Zeroizing::new(bytes[first_nonzero..].to_vec())
    }
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| WalletError::internal("invalid HMAC key length"))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BITCOIN_SEED_KEY;
    use crate::error::ErrorCode;
    use std::str::FromStr;

    fn tv1_seed() -> Seed {
        Seed::new(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()).unwrap()
    }

    fn node_with_key(first_byte: u8, depth: u8) -> KeyNode {
        let mut key = [0x11u8; 32];
        key[0] = first_byte;
        KeyNode::from_private_parts(
            SecretKey::from_slice(&key).unwrap(),
            [0x22u8; 32],
            depth,
            [0u8; 4],
            DerivationComponent::from_full_index(0),
        )
    }

    #[test]
    fn test_master_matches_bip32_vector() {
        let master = master_node(&tv1_seed(), BITCOIN_SEED_KEY).unwrap();
        assert_eq!(
            hex::encode(master.private_key().unwrap().secret_bytes()),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(master.depth(), 0);
        assert_eq!(master.parent_fingerprint(), [0u8; 4]);
    }

    #[test]
    fn test_standard_mode_matches_reference_bip32() {
        let seed = tv1_seed();
        let master = master_node(&seed, BITCOIN_SEED_KEY).unwrap();
        let secp = Secp256k1::new();
        let reference_master =
            bitcoin::bip32::Xpriv::new_master(bitcoin::Network::Bitcoin, seed.as_bytes()).unwrap();

        for path in ["m/0'", "m/0'/1", "m/0'/1/2'/2/1000000000", "m/44'/60'/0'/0/7"] {
            let ours = derive_by_path(&master, path, DerivationMode::Standard).unwrap();
            let reference_path = bitcoin::bip32::DerivationPath::from_str(path).unwrap();
            let reference = reference_master.derive_priv(&secp, &reference_path).unwrap();
            assert_eq!(ours.private_key().unwrap(), &reference.private_key, "path {}", path);
            assert_eq!(ours.depth() as usize, reference_path.len());
        }
    }

    #[test]
    fn test_modes_agree_without_leading_zero() {
        let node = node_with_key(0x11, 3);
        assert!(!node.is_legacy_divergent());
        let child = DerivationComponent::hardened(5).unwrap();
        let standard = node.derive_child(child, DerivationMode::Standard).unwrap();
        let legacy = node.derive_child(child, DerivationMode::Legacy).unwrap();
        assert_eq!(standard.private_key(), legacy.private_key());
        assert_eq!(standard.chain_code(), legacy.chain_code());
    }

    #[test]
    fn test_modes_diverge_for_leading_zero_key() {
        let node = node_with_key(0x00, 3);
        assert!(node.is_legacy_divergent());

        let hardened = DerivationComponent::hardened(0).unwrap();
        let standard = node.derive_child(hardened, DerivationMode::Standard).unwrap();
        let legacy = node.derive_child(hardened, DerivationMode::Legacy).unwrap();
        assert_ne!(standard.private_key(), legacy.private_key());

        let normal = DerivationComponent::normal(0).unwrap();
        let standard = node.derive_child(normal, DerivationMode::Standard).unwrap();
        let legacy = node.derive_child(normal, DerivationMode::Legacy).unwrap();
        assert_eq!(standard.private_key(), legacy.private_key());
    }

    #[test]
    fn test_root_keeps_full_width_in_legacy_mode() {
        let root = node_with_key(0x00, 0);
        assert!(!root.is_legacy_divergent());
        let hardened = DerivationComponent::hardened(1).unwrap();
        let standard = root.derive_child(hardened, DerivationMode::Standard).unwrap();
        let legacy = root.derive_child(hardened, DerivationMode::Legacy).unwrap();
        assert_eq!(standard.private_key(), legacy.private_key());
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let master = master_node(&tv1_seed(), BITCOIN_SEED_KEY).unwrap();
        let account = derive_by_path(&master, "m/44'/0'/0'", DerivationMode::Standard).unwrap();
        let normal = DerivationComponent::normal(3).unwrap();

        let private_child = account.derive_child(normal, DerivationMode::Standard).unwrap();
        let public_child = account.neuter().derive_child(normal, DerivationMode::Standard).unwrap();
        assert!(!public_child.is_private());
        assert_eq!(private_child.public_key(), public_child.public_key());
        assert_eq!(private_child.chain_code(), public_child.chain_code());
        assert_eq!(public_child.parent_fingerprint(), account.fingerprint());

        let err = account
            .neuter()
            .derive_child(DerivationComponent::hardened(0).unwrap(), DerivationMode::Standard)
            .unwrap_err();
        assert!(err.is(ErrorCode::DerivationFailure));
    }

    #[test]
    fn test_depth_limit() {
        let node = node_with_key(0x11, MAX_DEPTH);
        let err = node
            .derive_child(DerivationComponent::normal(0).unwrap(), DerivationMode::Standard)
            .unwrap_err();
        assert!(err.is(ErrorCode::DerivationFailure));
    }

    #[test]
    fn test_seed_length_bounds() {
        assert!(Seed::new(&[0u8; 15]).is_err());
        assert!(Seed::new(&[0u8; 16]).is_ok());
        assert!(Seed::new(&[0u8; 64]).is_ok());
        assert!(Seed::new(&[0u8; 65]).unwrap_err().is(ErrorCode::InvalidInput));
        assert!(!format!("{:?}", Seed::new(&[7u8; 32]).unwrap()).contains('7'));
    }

    #[test]
    fn test_bad_path_is_derivation_failure() {
        let master = master_node(&tv1_seed(), BITCOIN_SEED_KEY).unwrap();
        let err = derive_by_path(&master, "44'/0'", DerivationMode::Legacy).unwrap_err();
        assert!(err.is(ErrorCode::DerivationFailure));
    }
}
