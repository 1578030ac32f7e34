//! Unified error types for the wallet core
//!
//! Every fallible operation returns a [`WalletError`] carrying one
//! [`ErrorCode`] from a closed taxonomy, so callers can branch on the
//! failing stage without string matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all wallet operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl WalletError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn derivation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DerivationFailure, msg)
    }

    pub fn network_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkMismatch, msg)
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientFunds, msg)
    }

    pub fn fee_cap_below_tip_cap(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FeeCapBelowTipCap, msg)
    }

    pub fn signature_validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignatureValidationFailure, msg)
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamFailure, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalletError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed path segment, wrong-network address, empty unspent set,
    /// non-positive fee rate, dust output, unknown chain
    InvalidInput,
    /// Path parse error, invalid hardening boundary, unusable derived key
    DerivationFailure,
    /// Key or address network differs from the requested chain
    NetworkMismatch,
    /// Coin selection ran out of unspent outputs
    InsufficientFunds,
    FeeCapBelowTipCap,
    /// Post-sign script replay failed
    SignatureValidationFailure,
    /// Any collaborator (RPC, broadcast) failure
    UpstreamFailure,
    /// No secret available for an input, or the signer refused
    SigningFailed,
    Internal,
}

/// Result type alias for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

// Conversions from common error types

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::invalid_input(format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(e: hex::FromHexError) -> Self {
        WalletError::invalid_input(format!("Hex error: {}", e))
    }
}

impl From<bip39::Error> for WalletError {
    fn from(e: bip39::Error) -> Self {
        WalletError::invalid_input(format!("BIP39 error: {}", e))
    }
}

impl From<secp256k1::Error> for WalletError {
    fn from(e: secp256k1::Error) -> Self {
        WalletError::derivation(format!("Secp256k1 error: {}", e))
    }
}

impl From<bitcoin::address::ParseError> for WalletError {
    fn from(e: bitcoin::address::ParseError) -> Self {
        WalletError::invalid_input(format!("Address error: {}", e))
    }
}

impl From<bitcoin::amount::ParseAmountError> for WalletError {
    fn from(e: bitcoin::amount::ParseAmountError) -> Self {
        WalletError::invalid_input(format!("Amount error: {}", e))
    }
}

impl From<ethers_signers::WalletError> for WalletError {
    fn from(e: ethers_signers::WalletError) -> Self {
        WalletError::signing_failed(format!("Signer error: {}", e))
    }
}
