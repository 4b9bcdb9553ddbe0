//! Popsicle Finance V3 optimizers

use alloy_sol_types::sol;
use async_trait::async_trait;

use super::{Provider, RawBalances, TickRange, VaultAdapter};
use crate::chain::{AbiRef, ContractHandle};
use crate::error::Result;

sol! {
    interface IPopsicleV3Optimizer {
        function usersAmounts() external view returns (uint256 amount0, uint256 amount1);
        function tickLower() external view returns (int24);
        function tickUpper() external view returns (int24);
    }
}

pub struct PopsicleAdapter;

#[async_trait]
impl VaultAdapter for PopsicleAdapter {
    fn provider(&self) -> Provider {
        Provider::Popsicle
    }

    fn abi(&self) -> AbiRef {
        AbiRef::own("popsicle")
    }

    async fn raw_balances(&self, vault: &ContractHandle<'_>) -> Result<RawBalances> {
        let amounts = vault.call(IPopsicleV3Optimizer::usersAmountsCall {}).await?;
        Ok(RawBalances {
            amount0: amounts.amount0,
            amount1: amounts.amount1,
        })
    }

    async fn tick_range(&self, vault: &ContractHandle<'_>) -> Result<TickRange> {
        let lower = vault.call(IPopsicleV3Optimizer::tickLowerCall {}).await?;
        let upper = vault.call(IPopsicleV3Optimizer::tickUpperCall {}).await?;
        Ok(TickRange {
            lower: lower.as_i32(),
            upper: upper.as_i32(),
        })
    }
}
