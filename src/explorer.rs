//! Block-explorer API client (Etherscan-style)
//!
//! Every request is a GET with query-string parameters against the chain's
//! explorer endpoint, optionally carrying the API key as `apikey`. Responses
//! come back in a `{status, message, result}` envelope; an error shows up as a
//! string `result` (rate limit, invalid address, unverified contract, ...).

use alloy_primitives::{Address, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace};

use crate::chain::Chain;
use crate::error::SnapshotError;

/// Timeout for API calls
const API_TIMEOUT_SECS: u64 = 20;

/// Block range used for every transaction list query
const START_BLOCK: &str = "1";
const END_BLOCK: &str = "99999999";

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GasTrackerResult {
    #[serde(rename = "LastBlock")]
    last_block: Option<String>,
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: Option<String>,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: Option<String>,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: Option<String>,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: Option<String>,
}

/// One entry of a transaction or transfer list.
///
/// The explorer returns different fields per list type; only the ones shared
/// by most of them are kept, everything as the explorer's own strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transfer {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub contract_address: String,
    pub token_symbol: Option<String>,
    #[serde(rename = "tokenID")]
    pub token_id: Option<String>,
    pub is_error: Option<String>,
}

/// Gas oracle snapshot, prices in gwei
#[derive(Debug, Clone, PartialEq)]
pub struct GasPrices {
    pub last_block: u64,
    pub safe_gwei: f64,
    pub propose_gwei: f64,
    pub fast_gwei: f64,
    pub base_fee_gwei: Option<f64>,
}

/// Which transaction list to fetch for an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransferKind {
    Normal,
    Internal,
    Token,
    Nft,
}

impl TransferKind {
    fn action(&self) -> &'static str {
        match self {
            TransferKind::Normal => "txlist",
            TransferKind::Internal => "txlistinternal",
            TransferKind::Token => "tokentx",
            TransferKind::Nft => "tokennfttx",
        }
    }
}

// ============================================
// EXPLORER CLIENT
// ============================================

#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ExplorerClient {
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

    /// Client for the chain's known explorer, unless `url_override` is given
    pub fn for_chain(
        chain: Chain,
        api_key: Option<String>,
        url_override: Option<&str>,
    ) -> Result<Self, SnapshotError> {
        let base_url = match url_override {
            Some(url) => url.to_string(),
            None => chain
                .explorer_url()
                .ok_or_else(|| SnapshotError::UnsupportedChain(chain.to_string(), "explorer api"))?
                .to_string(),
        };
        Self::new(base_url, api_key)
    }

    pub async fn normal_transactions(&self, address: Address) -> Result<Vec<Transfer>, SnapshotError> {
        self.transfers(TransferKind::Normal, address).await
    }

    pub async fn internal_transactions(&self, address: Address) -> Result<Vec<Transfer>, SnapshotError> {
        self.transfers(TransferKind::Internal, address).await
    }

    pub async fn token_transfers(&self, address: Address) -> Result<Vec<Transfer>, SnapshotError> {
        self.transfers(TransferKind::Token, address).await
    }

    pub async fn nft_transfers(&self, address: Address) -> Result<Vec<Transfer>, SnapshotError> {
        self.transfers(TransferKind::Nft, address).await
    }

    /// Transaction or transfer list for `address`, oldest first
    async fn transfers(
        &self,
        kind: TransferKind,
        address: Address,
    ) -> Result<Vec<Transfer>, SnapshotError> {
        let address = address.to_checksum(None);
        let result = self
            .execute(&[
                ("module", "account"),
                ("action", kind.action()),
                ("address", &address),
                ("startblock", START_BLOCK),
                ("endblock", END_BLOCK),
                ("sort", "asc"),
            ])
            .await?;

        let transfers: Vec<Transfer> = serde_json::from_value(result)?;
        debug!("{} {:?} entries for {}", transfers.len(), kind, address);
        Ok(transfers)
    }

    /// Native coin balance in wei
    pub async fn native_balance(&self, address: Address) -> Result<U256, SnapshotError> {
        let address = address.to_checksum(None);
        let result = self
            .execute(&[
                ("module", "account"),
                ("action", "balance"),
                ("address", &address),
                ("tag", "latest"),
            ])
            .await?;

        let text = expect_string(result, "balance")?;
        U256::from_str(&text).map_err(|e| SnapshotError::Explorer {
            action: "balance".to_string(),
            message: format!("unparseable balance '{}': {}", text, e),
        })
    }

    /// ABI JSON of a verified contract
    pub async fn contract_abi(&self, address: Address) -> Result<String, SnapshotError> {
        let address = address.to_checksum(None);
        let result = self
            .execute(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", &address),
            ])
            .await?;

        expect_string(result, "getabi")
    }

    pub async fn gas_oracle(&self) -> Result<GasPrices, SnapshotError> {
        let result = self
            .execute(&[("module", "gastracker"), ("action", "gasoracle")])
            .await?;
        let raw: GasTrackerResult = serde_json::from_value(result)?;

        let parse = |field: &Option<String>, name: &str| -> Result<f64, SnapshotError> {
            field
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| SnapshotError::Explorer {
                    action: "gasoracle".to_string(),
                    message: format!("missing or invalid {}", name),
                })
        };

        Ok(GasPrices {
            last_block: raw
                .last_block
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            safe_gwei: parse(&raw.safe_gas_price, "SafeGasPrice")?,
            propose_gwei: parse(&raw.propose_gas_price, "ProposeGasPrice")?,
            fast_gwei: parse(&raw.fast_gas_price, "FastGasPrice")?,
            base_fee_gwei: raw.suggest_base_fee.as_deref().and_then(|s| s.parse().ok()),
        })
    }

    /// Send one request and unwrap the `result` field of the envelope
    async fn execute(&self, params: &[(&str, &str)]) -> Result<Value, SnapshotError> {
        let action = params
            .iter()
            .find(|(k, _)| *k == "action")
            .map(|(_, v)| v.to_string())
            .unwrap_or_default();

        let mut request = self.http_client.get(&self.base_url).query(params);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("apikey", api_key.as_str())]);
        }

        trace!("explorer request: {}", action);
        let envelope: Envelope = request.send().await?.error_for_status()?.json().await?;

        let result = envelope.result.ok_or_else(|| SnapshotError::Explorer {
            action: action.clone(),
            message: envelope
                .message
                .clone()
                .unwrap_or_else(|| "response has no result".to_string()),
        })?;

        if envelope.status.as_deref() == Some("0") {
            match result {
                // "No transactions found" still carries an (empty) list
                Value::Array(_) => return Ok(result),
                other => {
                    let detail = match other {
                        Value::String(s) => s,
                        v => v.to_string(),
                    };
                    return Err(SnapshotError::Explorer {
                        action,
                        message: format!(
                            "{}: {}",
                            envelope.message.unwrap_or_else(|| "NOTOK".to_string()),
                            detail
                        ),
                    });
                }
            }
        }

        Ok(result)
    }
}

fn expect_string(result: Value, action: &str) -> Result<String, SnapshotError> {
    match result {
        Value::String(s) => Ok(s),
        other => Err(SnapshotError::Explorer {
            action: action.to_string(),
            message: format!("expected a string result, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: Address = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

    async fn client(server: &MockServer, api_key: Option<&str>) -> ExplorerClient {
        ExplorerClient::new(format!("{}/api", server.uri()), api_key.map(String::from)).unwrap()
    }

    #[tokio::test]
    async fn test_normal_transactions_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("module", "account"))
            .and(query_param("action", "txlist"))
            .and(query_param("address", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"))
            .and(query_param("startblock", "1"))
            .and(query_param("endblock", "99999999"))
            .and(query_param("sort", "asc"))
            .and(query_param("apikey", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "blockNumber": "14923678",
                    "timeStamp": "1654646411",
                    "hash": "0xabc",
                    "from": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
                    "to": "0x0000000000000000000000000000000000000001",
                    "value": "1000",
                    "isError": "0"
                }]
            })))
            .mount(&server)
            .await;

        let txs = client(&server, Some("KEY"))
            .await
            .normal_transactions(WALLET)
            .await
            .unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].block_number, "14923678");
        assert_eq!(txs[0].value, "1000");
        assert_eq!(txs[0].is_error.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_no_transactions_is_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "tokennfttx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0",
                "message": "No transactions found",
                "result": []
            })))
            .mount(&server)
            .await;

        let txs = client(&server, None).await.nft_transfers(WALLET).await.unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn test_internal_and_token_lists_use_their_actions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "txlistinternal"))
            .and(query_param("address", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "blockNumber": "15000001",
                    "timeStamp": "1655000000",
                    "hash": "0xdef",
                    "from": "0x0000000000000000000000000000000000000002",
                    "to": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
                    "value": "42",
                    "isError": "0"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("action", "tokentx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "blockNumber": "15000002",
                    "timeStamp": "1655000100",
                    "hash": "0x123",
                    "from": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
                    "to": "0x0000000000000000000000000000000000000003",
                    "value": "500000000",
                    "tokenSymbol": "USDC"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let explorer = client(&server, None).await;

        let internal = explorer.internal_transactions(WALLET).await.unwrap();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].hash, "0xdef");
        assert_eq!(internal[0].value, "42");

        let tokens = explorer.token_transfers(WALLET).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].block_number, "15000002");
        assert_eq!(tokens[0].token_symbol.as_deref(), Some("USDC"));
    }

    #[tokio::test]
    async fn test_error_result_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getabi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0",
                "message": "NOTOK",
                "result": "Max rate limit reached"
            })))
            .mount(&server)
            .await;

        let err = client(&server, None).await.contract_abi(WALLET).await.unwrap_err();
        match err {
            SnapshotError::Explorer { action, message } => {
                assert_eq!(action, "getabi");
                assert!(message.contains("Max rate limit reached"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_native_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "balance"))
            .and(query_param("tag", "latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": "40891626854930000000999"
            })))
            .mount(&server)
            .await;

        let balance = client(&server, None).await.native_balance(WALLET).await.unwrap();
        assert_eq!(balance, U256::from_str("40891626854930000000999").unwrap());
    }

    #[tokio::test]
    async fn test_gas_oracle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("module", "gastracker"))
            .and(query_param("action", "gasoracle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": {
                    "LastBlock": "17500000",
                    "SafeGasPrice": "12",
                    "ProposeGasPrice": "13",
                    "FastGasPrice": "15.5",
                    "suggestBaseFee": "11.8",
                    "gasUsedRatio": "0.4,0.5"
                }
            })))
            .mount(&server)
            .await;

        let gas = client(&server, None).await.gas_oracle().await.unwrap();
        assert_eq!(gas.last_block, 17_500_000);
        assert_eq!(gas.safe_gwei, 12.0);
        assert_eq!(gas.propose_gwei, 13.0);
        assert_eq!(gas.fast_gwei, 15.5);
        assert_eq!(gas.base_fee_gwei, Some(11.8));
    }

    #[tokio::test]
    async fn test_missing_result_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0",
                "message": "NOTOK"
            })))
            .mount(&server)
            .await;

        let result = client(&server, None).await.gas_oracle().await;
        assert!(matches!(result, Err(SnapshotError::Explorer { .. })));
    }

    #[test]
    fn test_unsupported_chain_has_no_explorer() {
        let result = ExplorerClient::for_chain(Chain::Celo, None, None);
        assert!(matches!(result, Err(SnapshotError::UnsupportedChain(..))));

        let overridden = ExplorerClient::for_chain(Chain::Celo, None, Some("http://localhost/api"));
        assert!(overridden.is_ok());
    }
}
