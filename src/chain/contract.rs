//! Contract handles and the RPC call path

use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use alloy_transport::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{checksum_address, Chain};
use crate::error::SnapshotError;
use crate::explorer::ExplorerClient;

// ============================================
// RAW CALL SEAM
// ============================================

/// Executes a read-only `eth_call` and returns the raw return data
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, TransportError>;
}

/// `eth_call` over HTTP JSON-RPC
pub struct RpcCaller {
    rpc_url: String,
}

impl RpcCaller {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
        }
    }
}

#[async_trait]
impl ContractCaller for RpcCaller {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, TransportError> {
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| TransportErrorKind::custom_str(&format!("invalid rpc url: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url);

        let tx = TransactionRequest::default().to(to).input(input.into());
        provider.call(tx).await
    }
}

// ============================================
// ABI SOURCES
// ============================================

/// Where a contract's ABI comes from: the explorer address to fetch it by,
/// or the name of a locally stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiRef {
    /// `None` means the contract's own address
    pub explorer: Option<Address>,
    pub local: &'static str,
}

impl AbiRef {
    pub const fn own(local: &'static str) -> Self {
        Self {
            explorer: None,
            local,
        }
    }

    pub const fn at(explorer: Address, local: &'static str) -> Self {
        Self {
            explorer: Some(explorer),
            local,
        }
    }
}

/// How ABIs are resolved for new contract handles
#[derive(Debug, Clone)]
pub enum AbiLoader {
    /// Trust the compiled interfaces, no ABI check
    Skip,
    /// Fetch by address from the block explorer
    Explorer(ExplorerClient),
    /// Read `<dir>/<name>.json`
    Local(PathBuf),
}

/// Names of the functions an ABI document declares
pub fn abi_methods(abi_json: &str) -> Result<HashSet<String>, SnapshotError> {
    let abi: Value = serde_json::from_str(abi_json)?;
    let entries = abi.as_array().ok_or_else(|| SnapshotError::InvalidAbi(
        "abi document is not a json array".to_string(),
    ))?;

    Ok(entries
        .iter()
        .filter(|entry| {
            // "type" defaults to "function" when omitted
            entry
                .get("type")
                .and_then(Value::as_str)
                .map_or(true, |t| t == "function")
        })
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(String::from)
        .collect())
}

// ============================================
// CHAIN ACCESSOR
// ============================================

pub struct ChainAccessor {
    caller: Arc<dyn ContractCaller>,
    abi_loader: AbiLoader,
}

impl ChainAccessor {
    pub fn new(caller: Arc<dyn ContractCaller>, abi_loader: AbiLoader) -> Self {
        Self {
            caller,
            abi_loader,
        }
    }

    /// Accessor on the real RPC endpoint
    pub fn connect(chain: Chain, rpc_url: &str, abi_loader: AbiLoader) -> Self {
        debug!("connecting to {} via {}", chain, rpc_url);
        Self::new(Arc::new(RpcCaller::new(rpc_url)), abi_loader)
    }

    /// Handle for the contract at `address` (any case; checksummed first)
    pub async fn contract(&self, address: &str, abi: AbiRef) -> Result<ContractHandle<'_>, SnapshotError> {
        let address = checksum_address(address)?;
        self.contract_at(address, abi).await
    }

    pub async fn contract_at(&self, address: Address, abi: AbiRef) -> Result<ContractHandle<'_>, SnapshotError> {
        let methods = match &self.abi_loader {
            AbiLoader::Skip => None,
            AbiLoader::Explorer(explorer) => {
                let abi_address = abi.explorer.unwrap_or(address);
                let json = explorer.contract_abi(abi_address).await?;
                Some(abi_methods(&json)?)
            }
            AbiLoader::Local(dir) => {
                let path = dir.join(format!("{}.json", abi.local));
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    SnapshotError::InvalidAbi(format!("{}: {}", path.display(), e))
                })?;
                Some(abi_methods(&json)?)
            }
        };

        Ok(ContractHandle {
            address,
            caller: self.caller.as_ref(),
            methods,
        })
    }
}

// ============================================
// CONTRACT HANDLE
// ============================================

/// A contract bound to an address, ready for typed view calls
pub struct ContractHandle<'a> {
    address: Address,
    caller: &'a dyn ContractCaller,
    methods: Option<HashSet<String>>,
}

impl ContractHandle<'_> {
    /// Call a view method and decode its typed return
    pub async fn call<C: SolCall + Send>(&self, call: C) -> Result<C::Return, SnapshotError> {
        let method = method_name::<C>();

        if let Some(methods) = &self.methods {
            if !methods.contains(method) {
                return Err(SnapshotError::MethodNotInAbi {
                    to: self.address,
                    method: method.to_string(),
                });
            }
        }

        trace!("{}.{} (0x{})", self.address, method, hex::encode(C::SELECTOR));
        let output = self
            .caller
            .call(self.address, call.abi_encode().into())
            .await
            .map_err(|source| SnapshotError::Rpc {
                to: self.address,
                method: method.to_string(),
                source,
            })?;

        C::abi_decode_returns(&output).map_err(|source| SnapshotError::Decode {
            to: self.address,
            method: method.to_string(),
            source,
        })
    }
}

fn method_name<C: SolCall>() -> &'static str {
    C::SIGNATURE.split('(').next().unwrap_or(C::SIGNATURE)
}
