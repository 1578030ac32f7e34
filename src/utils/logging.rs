//! Redacting log events
//!
//! Every log line in the crate is built as a [`LogEntry`] and emitted as a
//! `tracing` event. Each field is classified by its key before rendering:
//! key material is replaced outright, while addresses and transaction ids
//! are cut down to a head and a tail. Cuts are made on `char` boundaries,
//! so values handed back by a node can be logged whatever they contain.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Rendering applied to a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Plain,
    /// Never rendered; only its length survives
    Secret,
    /// `head...tail`, 6 + 4 chars (8 + 4 with a `0x` prefix)
    Address,
    /// `head...tail`, 10 + 6 chars (12 + 6 with a `0x` prefix)
    Digest,
}

const SECRET_KEYS: &[&str] = &[
    "private_key",
    "secret",
    "seed",
    "mnemonic",
    "passphrase",
    "wif",
    "entropy",
    "chain_code",
];

const DIGEST_KEYS: &[&str] = &["txid", "hash", "raw_tx"];

const ADDRESS_KEYS: &[&str] = &["address", "to", "from", "recipient"];

impl FieldClass {
    /// Classify a field by its key
    pub fn for_key(key: &str) -> Self {
        let key = key.to_ascii_lowercase();
        if SECRET_KEYS.iter().any(|s| key.contains(s)) {
            FieldClass::Secret
        } else if ADDRESS_KEYS.contains(&key.as_str()) || key.ends_with("_address") {
            FieldClass::Address
        } else if DIGEST_KEYS.iter().any(|s| key.contains(s)) {
            FieldClass::Digest
        } else {
            FieldClass::Plain
        }
    }

    pub fn render(self, value: &str) -> String {
        let value = value.trim();
        let hex_prefixed = value.starts_with("0x");
        match self {
            FieldClass::Plain => value.to_string(),
            FieldClass::Secret => format!("[REDACTED:{}]", value.chars().count()),
            FieldClass::Address if hex_prefixed => shorten(value, 8, 4),
            FieldClass::Address => shorten(value, 6, 4),
            FieldClass::Digest if hex_prefixed => shorten(value, 12, 6),
            FieldClass::Digest => shorten(value, 10, 6),
        }
    }
}

/// Keep `head` leading and `tail` trailing chars
fn shorten(value: &str, head: usize, tail: usize) -> String {
    let count = value.chars().count();
    if count <= head + tail + 3 {
        return value.to_string();
    }
    let prefix: String = value.chars().take(head).collect();
    let suffix: String = value.chars().skip(count - tail).collect();
    format!("{}...{}", prefix, suffix)
}

/// One log line with its rendered fields
#[derive(Debug)]
pub struct LogEntry {
    level: LogLevel,
    module: &'static str,
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, rendered according to [`FieldClass::for_key`]
    pub fn field(self, key: &'static str, value: impl fmt::Display) -> Self {
        self.classified(key, FieldClass::for_key(key), value)
    }

    /// Add a field that holds an address whatever its key
    pub fn address_field(self, key: &'static str, value: impl fmt::Display) -> Self {
        self.classified(key, FieldClass::Address, value)
    }

    fn classified(mut self, key: &'static str, class: FieldClass, value: impl fmt::Display) -> Self {
        let rendered = class.render(&value.to_string());
        self.fields.push((key, rendered));
        self
    }

    pub fn fields_string(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn log(self) {
        let fields = self.fields_string();
        let module = self.module;
        let message = self.message.as_str();
        match self.level {
            LogLevel::Debug => tracing::debug!(module, fields = %fields, "{}", message),
            LogLevel::Info => tracing::info!(module, fields = %fields, "{}", message),
            LogLevel::Warn => tracing::warn!(module, fields = %fields, "{}", message),
            LogLevel::Error => tracing::error!(module, fields = %fields, "{}", message),
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_entry {
    ($level:ident, $module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg).log()
    };
    ($level:ident, $module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
            $(.field(stringify!($key), &$value))*
            .log()
    };
}

/// `log_debug!(module, message, key = value, ...)`
#[macro_export]
macro_rules! log_debug {
    ($($args:tt)+) => {
        $crate::__log_entry!(Debug, $($args)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)+) => {
        $crate::__log_entry!(Info, $($args)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)+) => {
        $crate::__log_entry!(Warn, $($args)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)+) => {
        $crate::__log_entry!(Error, $($args)+)
    };
}
