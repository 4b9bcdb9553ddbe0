//! Gamma (Visor) hypervisors

use alloy_sol_types::sol;
use async_trait::async_trait;

use super::{Provider, RawBalances, TickRange, VaultAdapter};
use crate::chain::{AbiRef, ContractHandle};
use crate::error::Result;

sol! {
    interface IHypervisor {
        function getTotalAmounts() external view returns (uint256 total0, uint256 total1);
        function baseUpper() external view returns (int24);
        function baseLower() external view returns (int24);
    }
}

pub struct GammaAdapter;

#[async_trait]
impl VaultAdapter for GammaAdapter {
    fn provider(&self) -> Provider {
        Provider::Gamma
    }

    fn abi(&self) -> AbiRef {
        AbiRef::own("gamma")
    }

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances> {
        let totals = vault.call(IHypervisor::getTotalAmountsCall {}).await?;
        Ok(RawBalances {
            amount0: totals.total0,
            amount1: totals.total1,
        })
    }

    // base position only; the limit position is ignored
    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange> {
        let upper = vault.call(IHypervisor::baseUpperCall {}).await?;
        let lower = vault.call(IHypervisor::baseLowerCall {}).await?;
        Ok(TickRange {
            lower: lower.as_i32(),
            upper: upper.as_i32(),
        })
    }
}
