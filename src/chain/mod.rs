//! Chain access
//!
//! Read-only connection to an EVM chain: the table of supported chains and
//! their endpoints, strict address normalisation, and contract handles that
//! call view methods and decode typed returns.

mod contract;

pub use contract::{
    AbiLoader, AbiRef, ChainAccessor, ContractCaller, ContractHandle, RpcCaller,
};

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ConfigError, SnapshotError};

// ============================================
// SUPPORTED CHAINS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Celo,
    Avalanche,
    Fantom,
}

impl Default for Chain {
    fn default() -> Self {
        Chain::Ethereum
    }
}

impl Chain {
    /// Default public RPC endpoint
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://eth.llamarpc.com",
            Chain::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Chain::Celo => "https://forno.celo.org",
            Chain::Avalanche => "https://api.avax.network/ext/bc/C/rpc",
            Chain::Fantom => "https://rpc.ftm.tools/",
        }
    }

    /// Block-explorer API endpoint, where one is known
    pub fn explorer_url(&self) -> Option<&'static str> {
        match self {
            Chain::Ethereum => Some("https://api.etherscan.io/api"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Ethereum => f.pad("ethereum"),
            Chain::Arbitrum => f.pad("arbitrum"),
            Chain::Celo => f.pad("celo"),
            Chain::Avalanche => f.pad("avalanche"),
            Chain::Fantom => f.pad("fantom"),
        }
    }
}

impl FromStr for Chain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" => Ok(Chain::Ethereum),
            "arbitrum" => Ok(Chain::Arbitrum),
            "celo" => Ok(Chain::Celo),
            "avalanche" => Ok(Chain::Avalanche),
            "fantom" => Ok(Chain::Fantom),
            other => Err(ConfigError::InvalidValue {
                key: "CHAIN".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// ============================================
// ADDRESSES
// ============================================

/// Parse an address into its canonical form.
///
/// All-lower or all-upper hex is accepted as is. Mixed case is taken to be a
/// checksum encoding and must verify, so a typo fails here instead of
/// silently querying another account.
pub fn checksum_address(value: &str) -> Result<Address, SnapshotError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());

    let parsed = if has_lower && has_upper {
        Address::parse_checksummed(trimmed, None).map_err(|e| e.to_string())
    } else {
        Address::from_str(trimmed).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| SnapshotError::InvalidAddress {
        value: value.to_string(),
        reason,
    })
}

// ============================================
// ACCOUNTS
// ============================================

/// Local account from a hex private key (optional `0x` prefix)
pub fn account_from_key(key: &str) -> Result<PrivateKeySigner, ConfigError> {
    PrivateKeySigner::from_str(key.trim().trim_start_matches("0x")).map_err(|_| {
        ConfigError::InvalidValue {
            key: "WALLET_PRIVATE_KEY".to_string(),
            value: "<redacted>".to_string(),
        }
    })
}
