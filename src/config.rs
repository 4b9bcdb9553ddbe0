//! Runtime settings and the query configuration
//!
//! Settings come from the environment (and `.env`) or a TOML file. The query
//! configuration says which vaults to snapshot; it is validated completely
//! on load so that structural mistakes surface before any network call.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::chain::{checksum_address, AbiLoader, Chain};
use crate::error::{ConfigError, SnapshotError};
use crate::explorer::ExplorerClient;
use crate::pricing::COINGECKO_API_URL;
use crate::vaults::Provider;

// ============================================
// ABI MODE
// ============================================

/// Where contract ABIs are taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiMode {
    /// Fetched by address from the block explorer
    #[default]
    Explorer,
    /// Read from `<abi_dir>/<name>.json`
    Local,
    /// Not loaded; calls are not checked against an ABI
    Skip,
}

impl std::fmt::Display for AbiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbiMode::Explorer => f.pad("explorer"),
            AbiMode::Local => f.pad("local"),
            AbiMode::Skip => f.pad("skip"),
        }
    }
}

impl FromStr for AbiMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "explorer" | "etherscan" => Ok(AbiMode::Explorer),
            "local" => Ok(AbiMode::Local),
            "skip" | "none" => Ok(AbiMode::Skip),
            other => Err(ConfigError::InvalidValue {
                key: "ABI_MODE".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// ============================================
// FAILURE POLICY
// ============================================

/// What a failing pool or vault does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First error aborts the run; nothing is persisted
    #[default]
    FailFast,
    /// Failures are recorded and skipped; collected snapshots are kept
    Isolate,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => f.pad("fail_fast"),
            FailurePolicy::Isolate => f.pad("isolate"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_fast" | "failfast" | "fail-fast" => Ok(FailurePolicy::FailFast),
            "isolate" => Ok(FailurePolicy::Isolate),
            other => Err(ConfigError::InvalidValue {
                key: "FAILURE_POLICY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// ============================================
// RUNTIME SETTINGS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network ==========
    pub chain: Chain,

    /// Overrides the chain's default endpoint
    pub rpc_url: Option<String>,

    // ========== Block explorer ==========
    pub etherscan_api_key: Option<String>,

    /// Overrides the chain's explorer endpoint
    pub explorer_url: Option<String>,

    // ========== Price service ==========
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,

    // ========== Inputs and output ==========
    pub query_config_path: String,
    pub token_table_path: String,
    pub store_path: String,

    // ========== Behaviour ==========
    pub abi_mode: AbiMode,
    pub abi_dir: String,
    pub failure_policy: FailurePolicy,

    /// Only used to report a wallet in `diagnose`
    pub wallet_private_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            chain: var("CHAIN")
                .map(|s| s.parse::<Chain>())
                .transpose()?
                .unwrap_or(defaults.chain),
            rpc_url: var("RPC_URL"),

            etherscan_api_key: var("ETHERSCAN_API_KEY"),
            explorer_url: var("EXPLORER_URL"),

            coingecko_api_url: var("COINGECKO_API_URL").unwrap_or(defaults.coingecko_api_url),
            coingecko_api_key: var("COINGECKO_API_KEY"),

            query_config_path: var("QUERY_CONFIG_PATH").unwrap_or(defaults.query_config_path),
            token_table_path: var("TOKEN_TABLE_PATH").unwrap_or(defaults.token_table_path),
            store_path: var("STORE_PATH").unwrap_or(defaults.store_path),

            abi_mode: var("ABI_MODE")
                .map(|s| s.parse::<AbiMode>())
                .transpose()?
                .unwrap_or(defaults.abi_mode),
            abi_dir: var("ABI_DIR").unwrap_or(defaults.abi_dir),
            failure_policy: var("FAILURE_POLICY")
                .map(|s| s.parse::<FailurePolicy>())
                .transpose()?
                .unwrap_or(defaults.failure_policy),

            wallet_private_key: var("WALLET_PRIVATE_KEY"),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Schema(format!("{}: {}", path.display(), e)))
    }

    /// RPC endpoint in effect
    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or(self.chain.rpc_url())
    }

    pub fn explorer(&self) -> Result<ExplorerClient, SnapshotError> {
        ExplorerClient::for_chain(
            self.chain,
            self.etherscan_api_key.clone(),
            self.explorer_url.as_deref(),
        )
    }

    pub fn abi_loader(&self) -> Result<AbiLoader, SnapshotError> {
        Ok(match self.abi_mode {
            AbiMode::Explorer => AbiLoader::Explorer(self.explorer()?),
            AbiMode::Local => AbiLoader::Local(self.abi_dir.clone().into()),
            AbiMode::Skip => AbiLoader::Skip,
        })
    }

    /// Check settings that would otherwise fail halfway through a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rpc_url = self.rpc_url();
        if rpc_url.is_empty() || rpc_url.contains("YOUR_API_KEY") {
            return Err(ConfigError::InvalidValue {
                key: "RPC_URL".to_string(),
                value: rpc_url.to_string(),
            });
        }

        if self.abi_mode == AbiMode::Explorer
            && self.explorer_url.is_none()
            && self.chain.explorer_url().is_none()
        {
            return Err(ConfigError::InvalidValue {
                key: "ABI_MODE".to_string(),
                value: format!("explorer (no explorer api known for {}, set EXPLORER_URL)", self.chain),
            });
        }

        if self.abi_mode == AbiMode::Local && !Path::new(&self.abi_dir).is_dir() {
            return Err(ConfigError::InvalidValue {
                key: "ABI_DIR".to_string(),
                value: self.abi_dir.clone(),
            });
        }

        if self.store_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "STORE_PATH".to_string(),
                value: String::new(),
            });
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let set = |v: &Option<String>| if v.is_some() { "✓ Configured" } else { "✗ Not Set" };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              VAULTWATCH - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain:             {:^40} ║", self.chain);
        println!("║ RPC:               {:^40} ║", truncate(self.rpc_url(), 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ INPUTS                                                     ║");
        println!("║ • Query Config:    {:^40} ║", truncate(&self.query_config_path, 40));
        println!("║ • Token Table:     {:^40} ║", truncate(&self.token_table_path, 40));
        println!("║ • Store:           {:^40} ║", truncate(&self.store_path, 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SERVICES                                                   ║");
        println!("║ • Etherscan API:   {:^40} ║", set(&self.etherscan_api_key));
        println!("║ • CoinGecko API:   {:^40} ║", set(&self.coingecko_api_key));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ BEHAVIOUR                                                  ║");
        println!("║ • ABI Mode:        {:^40} ║", self.abi_mode);
        println!("║ • Failure Policy:  {:^40} ║", self.failure_policy);
        println!("║ • Wallet Key:      {:^40} ║", set(&self.wallet_private_key));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: Chain::Ethereum,
            rpc_url: None,
            etherscan_api_key: None,
            explorer_url: None,
            coingecko_api_url: COINGECKO_API_URL.to_string(),
            coingecko_api_key: None,
            query_config_path: "./query_config.json".to_string(),
            token_table_path: "./contracts.json".to_string(),
            store_path: "./data/v3-optimizer-data.json".to_string(),
            abi_mode: AbiMode::Explorer,
            abi_dir: "./abis".to_string(),
            failure_policy: FailurePolicy::FailFast,
            wallet_private_key: None,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

// ============================================
// QUERY CONFIGURATION
// ============================================

/// One vault to snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultQuery {
    pub provider: Provider,
    pub address: Address,
}

/// One Uniswap V3 pool and the vaults managing liquidity in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolQuery {
    pub pool_id: String,
    pub pool_address: Address,
    pub vaults: Vec<VaultQuery>,
}

/// Validated query configuration, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryConfig {
    pub pools: Vec<PoolQuery>,
}

impl QueryConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content, &path.display().to_string())
    }

    /// Parse `{"query": {pool: {provider: vault}}, "uni_pools": {pool: address}}`
    pub fn from_json(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        let query = section(&root, "query")?;
        let uni_pools = section(&root, "uni_pools")?;

        let mut pools = Vec::with_capacity(query.len());
        for (pool_id, providers) in query {
            let providers = providers.as_object().ok_or_else(|| {
                ConfigError::Schema(format!("query.{} must map provider names to vaults", pool_id))
            })?;

            let mut vaults = Vec::with_capacity(providers.len());
            for (name, vault) in providers {
                let provider: Provider = name.parse()?;
                let context = format!("query.{}.{}", pool_id, name);
                vaults.push(VaultQuery {
                    provider,
                    address: address_field(&context, vault)?,
                });
            }

            let pool_address = uni_pools
                .get(pool_id)
                .ok_or_else(|| ConfigError::MissingPoolAddress(pool_id.clone()))?;

            pools.push(PoolQuery {
                pool_id: pool_id.clone(),
                pool_address: address_field(&format!("uni_pools.{}", pool_id), pool_address)?,
                vaults,
            });
        }

        Ok(Self { pools })
    }

    pub fn vault_count(&self) -> usize {
        self.pools.iter().map(|p| p.vaults.len()).sum()
    }
}

fn section<'a>(root: &'a Value, key: &str) -> Result<&'a Map<String, Value>, ConfigError> {
    root.get(key)
        .ok_or_else(|| ConfigError::Schema(format!("missing '{}' section", key)))?
        .as_object()
        .ok_or_else(|| ConfigError::Schema(format!("'{}' must be an object", key)))
}

fn address_field(context: &str, value: &Value) -> Result<Address, ConfigError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ConfigError::Schema(format!("{} must be an address string", context)))?;

    checksum_address(raw).map_err(|e| {
        let reason = match e {
            SnapshotError::InvalidAddress { reason, .. } => reason,
            other => other.to_string(),
        };
        ConfigError::InvalidAddress {
            context: context.to_string(),
            value: raw.to_string(),
            reason,
        }
    })
}

// ============================================
// TESTS
// ============================================
