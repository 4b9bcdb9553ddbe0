//! Error taxonomy for a snapshot run
//!
//! Configuration problems are reported as [`ConfigError`] and are detected
//! before any network work. Everything that can go wrong while talking to
//! the chain, the explorer, the price service or the store is a
//! [`SnapshotError`].

use alloy_primitives::Address;
use thiserror::Error;

/// Structural problems in settings, query config or token table
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config structure: {0}")]
    Schema(String),

    #[error("unknown provider '{0}' (expected one of: g-uni, gamma, lixir, charm, popsicle)")]
    UnknownProvider(String),

    #[error("pool '{0}' has no entry in uni_pools")]
    MissingPoolAddress(String),

    #[error("invalid address '{value}' for {context}: {reason}")]
    InvalidAddress {
        context: String,
        value: String,
        reason: String,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Everything that can abort (or, when isolated, skip) part of a run
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("token {0} is not in the token table")]
    UnknownToken(Address),

    #[error("price service returned no usd price for '{0}'")]
    MissingPrice(String),

    #[error("vault {vault} has zero total supply, share price is undefined")]
    ZeroTotalSupply { vault: Address },

    #[error("chain '{0}' is not supported for {1}")]
    UnsupportedChain(String, &'static str),

    #[error("rpc call {method} on {to} failed: {source}")]
    Rpc {
        to: Address,
        method: String,
        #[source]
        source: alloy_transport::TransportError,
    },

    #[error("failed to decode {method} returned by {to}: {source}")]
    Decode {
        to: Address,
        method: String,
        #[source]
        source: alloy_sol_types::Error,
    },

    #[error("unusable abi: {0}")]
    InvalidAbi(String),

    #[error("abi of {to} does not declare {method}")]
    MethodNotInAbi { to: Address, method: String },

    #[error("explorer request '{action}' failed: {message}")]
    Explorer { action: String, message: String },

    #[error("price service error: {0}")]
    PriceService(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("store '{store}': {message}")]
    Store { store: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
