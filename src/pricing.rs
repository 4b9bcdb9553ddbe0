//! USD spot prices
//!
//! A token address is mapped to its price-service id through the token
//! table, then the id is quoted against USD. No caching: the orchestrator
//! asks once per token per pool and reuses the answer for every vault.

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::SnapshotError;
use crate::tokens::TokenTable;

/// CoinGecko public API
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

const API_TIMEOUT_SECS: u64 = 20;

/// Quotes a price-service id in USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn usd_price(&self, price_id: &str) -> Result<f64, SnapshotError>;
}

/// USD price of a token contract.
///
/// Fails with `UnknownToken` before any request when the address is not in
/// the table.
pub async fn lookup_usd_price(
    source: &dyn PriceSource,
    tokens: &TokenTable,
    token: Address,
) -> Result<f64, SnapshotError> {
    let meta = tokens.get(&token)?;
    let price = source.usd_price(&meta.price_id).await?;
    debug!("price of {} ({}): ${}", token, meta.price_id, price);
    Ok(price)
}

// ============================================
// COINGECKO
// ============================================

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, SnapshotError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn usd_price(&self, price_id: &str) -> Result<f64, SnapshotError> {
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("ids", price_id), ("vs_currencies", "usd")]);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("x_cg_demo_api_key", api_key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SnapshotError::PriceService(format!(
                "{} for '{}': {}",
                status, price_id, body
            )));
        }

        // { "<id>": { "usd": <price> } }, or {} for unknown ids
        let quotes: HashMap<String, HashMap<String, f64>> = response.json().await?;
        quotes
            .get(price_id)
            .and_then(|q| q.get("usd"))
            .copied()
            .ok_or_else(|| SnapshotError::MissingPrice(price_id.to_string()))
    }
}
