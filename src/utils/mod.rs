//! Utilities Module
//!
//! Hashing and encoding helpers, redacting log entries, and unit
//! conversions.

pub mod crypto;
pub mod logging;
pub mod units;

pub use crypto::*;
