//! G-UNI (Gelato Uniswap) pools
//!
//! Vaults are proxies, so the explorer ABI is taken from the shared
//! implementation contract rather than the vault address.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;
use async_trait::async_trait;

use super::{Provider, RawBalances, TickRange, VaultAdapter};
use crate::chain::{AbiRef, ContractHandle};
use crate::error::Result;

/// G-UNI pool implementation
pub const G_UNI_ABI: Address = address!("b542d5Cb34ef265fB87c170181127332f7797369");

sol! {
    interface IGUniPool {
        function getUnderlyingBalances() external view returns (uint256 amount0Current, uint256 amount1Current);
        function upperTick() external view returns (int24);
        function lowerTick() external view returns (int24);
    }
}

pub struct GUniAdapter;

#[async_trait]
impl VaultAdapter for GUniAdapter {
    fn provider(&self) -> Provider {
        Provider::GUni
    }

    fn abi(&self) -> AbiRef {
        AbiRef::at(G_UNI_ABI, "g-uni")
    }

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances> {
        let balances = vault.call(IGUniPool::getUnderlyingBalancesCall {}).await?;
        Ok(RawBalances {
            amount0: balances.amount0Current,
            amount1: balances.amount1Current,
        })
    }

    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange> {
        let upper = vault.call(IGUniPool::upperTickCall {}).await?;
        let lower = vault.call(IGUniPool::lowerTickCall {}).await?;
        Ok(TickRange {
            lower: lower.as_i32(),
            upper: upper.as_i32(),
        })
    }
}
