//! Charm Alpha vaults

use alloy_sol_types::sol;
use async_trait::async_trait;

use super::{Provider, RawBalances, TickRange, VaultAdapter};
use crate::chain::{AbiRef, ContractHandle};
use crate::error::Result;

sol! {
    interface IAlphaVault {
        function getTotalAmounts() external view returns (uint256 total0, uint256 total1);
        function baseLower() external view returns (int24);
        function baseUpper() external view returns (int24);
    }
}

pub struct CharmAdapter;

#[async_trait]
impl VaultAdapter for CharmAdapter {
    fn provider(&self) -> Provider {
        Provider::Charm
    }

    fn abi(&self) -> AbiRef {
        AbiRef::own("charm")
    }

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances> {
        let totals = vault.call(IAlphaVault::getTotalAmountsCall {}).await?;
        Ok(RawBalances {
            amount0: totals.total0,
            amount1: totals.total1,
        })
    }

    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange> {
        let lower = vault.call(IAlphaVault::baseLowerCall {}).await?;
        let upper = vault.call(IAlphaVault::baseUpperCall {}).await?;
        Ok(TickRange {
            lower: lower.as_i32(),
            upper: upper.as_i32(),
        })
    }
}
