//! Lixir vaults

use alloy_sol_types::sol;
use async_trait::async_trait;

use super::{Provider, RawBalances, TickRange, VaultAdapter};
use crate::chain::{AbiRef, ContractHandle};
use crate::error::Result;

sol! {
    interface ILixirVault {
        function calculateTotals() external view returns (uint256 total0, uint256 total1, uint128 mL, uint128 rL);
        function mainPosition() external view returns (int24 tickLower, int24 tickUpper);
    }
}

pub struct LixirAdapter;

#[async_trait]
impl VaultAdapter for LixirAdapter {
    fn provider(&self) -> Provider {
        Provider::Lixir
    }

    fn abi(&self) -> AbiRef {
        AbiRef::own("lixir")
    }

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances> {
        // liquidity of the main and range positions is not reported
        let totals = vault.call(ILixirVault::calculateTotalsCall {}).await?;
        Ok(RawBalances {
            amount0: totals.total0,
            amount1: totals.total1,
        })
    }

    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange> {
        let position = vault.call(ILixirVault::mainPositionCall {}).await?;
        Ok(TickRange {
            lower: position.tickLower.as_i32(),
            upper: position.tickUpper.as_i32(),
        })
    }
}
