//! Liquidity-manager vaults
//!
//! Five protocols manage Uniswap V3 positions behind their own vault
//! contracts. Each exposes balances and the active range under different
//! method names and return shapes; an adapter per protocol hides that, and
//! [`snapshot_vault`] turns the raw reads into one [`VaultSnapshot`].

mod charm;
mod g_uni;
mod gamma;
mod lixir;
mod popsicle;
mod snapshot;

pub use snapshot::{value_vault, VaultSnapshot, SNAPSHOT_COLUMNS};

use alloy_primitives::{Address, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::chain::{AbiRef, ChainAccessor, ContractHandle};
use crate::error::{ConfigError, Result};
use crate::tokens::scale_units;

// ============================================
// PROVIDERS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "g-uni")]
    GUni,
    #[serde(rename = "gamma")]
    Gamma,
    #[serde(rename = "lixir")]
    Lixir,
    #[serde(rename = "charm")]
    Charm,
    #[serde(rename = "popsicle")]
    Popsicle,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::GUni,
        Provider::Gamma,
        Provider::Lixir,
        Provider::Charm,
        Provider::Popsicle,
    ];

    /// Name used in query configs and in the `manager` column
    pub fn name(&self) -> &'static str {
        match self {
            Provider::GUni => "g-uni",
            Provider::Gamma => "gamma",
            Provider::Lixir => "lixir",
            Provider::Charm => "charm",
            Provider::Popsicle => "popsicle",
        }
    }

    pub fn adapter(&self) -> &'static dyn VaultAdapter {
        match self {
            Provider::GUni => &g_uni::GUniAdapter,
            Provider::Gamma => &gamma::GammaAdapter,
            Provider::Lixir => &lixir::LixirAdapter,
            Provider::Charm => &charm::CharmAdapter,
            Provider::Popsicle => &popsicle::PopsicleAdapter,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

// ============================================
// ADAPTER SEAM
// ============================================

sol! {
    /// Share token view common to every vault
    interface IVaultShares {
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

/// Underlying token amounts held by a vault, unscaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBalances {
    pub amount0: U256,
    pub amount1: U256,
}

/// Active liquidity range in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

/// Protocol-specific reads of one vault contract
#[async_trait]
pub trait VaultAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn abi(&self) -> AbiRef;

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances>;

    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange>;
}

// ============================================
// SNAPSHOT
// ============================================

/// One token of the pool pair, with what valuation needs
#[derive(Debug, Clone, PartialEq)]
pub struct PricedToken {
    pub address: Address,
    pub decimals: u8,
    pub usd_price: f64,
}

/// Everything shared by the vaults of one pool
#[derive(Debug, Clone, PartialEq)]
pub struct PoolContext {
    pub pool_id: String,
    pub token0: PricedToken,
    pub token1: PricedToken,
}

/// Read one vault and normalise it.
///
/// Order of operations: share decimals and supply, balances, valuation (which
/// fails on zero supply), range, timestamp.
pub async fn snapshot_vault(
    accessor: &ChainAccessor,
    provider: Provider,
    vault: Address,
    pool: &PoolContext,
) -> Result<VaultSnapshot> {
    let adapter = provider.adapter();
    let handle = accessor.contract_at(vault, adapter.abi()).await?;

    let decimals = handle.call(IVaultShares::decimalsCall {}).await?;
    let supply_raw = handle.call(IVaultShares::totalSupplyCall {}).await?;
    let total_supply = scale_units(supply_raw, decimals);

    let raw = adapter.raw_balances(&handle).await?;
    let token0_balance = scale_units(raw.amount0, pool.token0.decimals);
    let token1_balance = scale_units(raw.amount1, pool.token1.decimals);
    debug!(
        "{} vault {}: supply {} balances ({}, {})",
        provider, vault, total_supply, token0_balance, token1_balance
    );

    let valuation = value_vault(
        vault,
        total_supply,
        (token0_balance, pool.token0.usd_price),
        (token1_balance, pool.token1.usd_price),
    )?;

    let range = adapter.tick_range(&handle).await?;

    Ok(VaultSnapshot {
        timestamp: Utc::now().timestamp(),
        pool_id: pool.pool_id.clone(),
        manager: provider,
        total_supply,
        token0_balance,
        token0_contract: pool.token0.address.to_checksum(None),
        token0_price: pool.token0.usd_price,
        token0_value: valuation.token0_value,
        token1_contract: pool.token1.address.to_checksum(None),
        token1_balance,
        token1_price: pool.token1.usd_price,
        token1_value: valuation.token1_value,
        vault_value: valuation.vault_value,
        vault_token_price: valuation.vault_token_price,
        upper_bound: range.upper,
        lower_bound: range.lower,
    })
}
