//! Query orchestration
//!
//! One linear pass over the query configuration: for each pool, read its
//! token pair, price both tokens once, then snapshot every configured vault
//! with that shared context. Rows come out in configuration order.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::{AbiRef, ChainAccessor};
use crate::config::{FailurePolicy, PoolQuery, QueryConfig};
use crate::error::{Result, SnapshotError};
use crate::pricing::{lookup_usd_price, PriceSource};
use crate::store::{persist, Dataset, TableStore};
use crate::tokens::TokenTable;
use crate::vaults::{snapshot_vault, PoolContext, PricedToken, Provider, VaultSnapshot};

/// Uniswap V3 pool implementation, used for the pool ABI
pub const UNI_POOL_ABI: Address = address!("8f8ef111b67c04eb1641f5ff19ee54cda062f163");

sol! {
    interface IUniswapV3Pool {
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

/// A pool or vault that was skipped under [`FailurePolicy::Isolate`]
#[derive(Debug)]
pub struct QueryFailure {
    pub pool_id: String,
    /// `None` when the whole pool failed
    pub provider: Option<Provider>,
    pub error: SnapshotError,
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.provider {
            Some(provider) => write!(f, "{} vault of pool {}: {}", provider, self.pool_id, self.error),
            None => write!(f, "pool {}: {}", self.pool_id, self.error),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Default)]
pub struct RunReport {
    pub snapshots: Vec<VaultSnapshot>,
    pub failures: Vec<QueryFailure>,
    /// Rows in the store after persisting; `None` if nothing was written
    pub stored_rows: Option<usize>,
}

pub struct Orchestrator {
    accessor: ChainAccessor,
    prices: Arc<dyn PriceSource>,
    tokens: TokenTable,
    query: QueryConfig,
    policy: FailurePolicy,
}

impl Orchestrator {
    pub fn new(
        accessor: ChainAccessor,
        prices: Arc<dyn PriceSource>,
        tokens: TokenTable,
        query: QueryConfig,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            accessor,
            prices,
            tokens,
            query,
            policy,
        }
    }

    /// Snapshot every configured vault
    pub async fn compile(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        for pool in &self.query.pools {
            let context = match self.resolve_pool(pool).await {
                Ok(context) => {
                    info!("querying uni vault {}", pool.pool_id);
                    context
                }
                Err(error) => {
                    self.record(&mut report, &pool.pool_id, None, error)?;
                    continue;
                }
            };

            for vault in &pool.vaults {
                match snapshot_vault(&self.accessor, vault.provider, vault.address, &context).await {
                    Ok(snapshot) => {
                        info!("queried {} vault for uni vault {}", vault.provider, pool.pool_id);
                        report.snapshots.push(snapshot);
                    }
                    Err(error) => {
                        self.record(&mut report, &pool.pool_id, Some(vault.provider), error)?;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Snapshot everything and append the rows to `store`
    pub async fn run(&self, store: &dyn TableStore) -> Result<RunReport> {
        let mut report = self.compile().await?;
        let dataset = Dataset::from_snapshots(&report.snapshots)?;
        report.stored_rows = persist(store, dataset)?;
        Ok(report)
    }

    /// Token pair of the pool, each with decimals and USD price
    async fn resolve_pool(&self, pool: &PoolQuery) -> Result<PoolContext> {
        let contract = self
            .accessor
            .contract_at(pool.pool_address, AbiRef::at(UNI_POOL_ABI, "uni-pool"))
            .await?;
        let token0 = contract.call(IUniswapV3Pool::token0Call {}).await?;
        let token1 = contract.call(IUniswapV3Pool::token1Call {}).await?;
        info!("tokens of uni pool {} retrieved", pool.pool_id);

        let (price0, price1) = futures::try_join!(
            lookup_usd_price(self.prices.as_ref(), &self.tokens, token0),
            lookup_usd_price(self.prices.as_ref(), &self.tokens, token1),
        )?;

        Ok(PoolContext {
            pool_id: pool.pool_id.clone(),
            token0: PricedToken {
                address: token0,
                decimals: self.tokens.get(&token0)?.decimals,
                usd_price: price0,
            },
            token1: PricedToken {
                address: token1,
                decimals: self.tokens.get(&token1)?.decimals,
                usd_price: price1,
            },
        })
    }

    fn record(
        &self,
        report: &mut RunReport,
        pool_id: &str,
        provider: Option<Provider>,
        error: SnapshotError,
    ) -> Result<()> {
        match self.policy {
            FailurePolicy::FailFast => Err(error),
            FailurePolicy::Isolate => {
                let failure = QueryFailure {
                    pool_id: pool_id.to_string(),
                    provider,
                    error,
                };
                warn!("skipping {}", failure);
                report.failures.push(failure);
                Ok(())
            }
        }
    }
}
