//! Normalised vault record and its USD valuation

use alloy_primitives::Address;
use serde::Serialize;

use super::Provider;
use crate::error::{Result, SnapshotError};

/// Column order of a snapshot row
pub const SNAPSHOT_COLUMNS: [&str; 16] = [
    "timestamp",
    "poolId",
    "manager",
    "totalSupply",
    "token0Balance",
    "token0Contract",
    "token0Price",
    "token0Value",
    "token1Contract",
    "token1Balance",
    "token1Price",
    "token1Value",
    "vaultValue",
    "vaultTokenPrice",
    "upperBound",
    "lowerBound",
];

/// One vault at one point in time. Field order follows [`SNAPSHOT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    /// Unix seconds
    pub timestamp: i64,
    pub pool_id: String,
    pub manager: Provider,
    pub total_supply: f64,
    pub token0_balance: f64,
    /// Checksummed
    pub token0_contract: String,
    pub token0_price: f64,
    pub token0_value: f64,
    pub token1_contract: String,
    pub token1_balance: f64,
    pub token1_price: f64,
    pub token1_value: f64,
    pub vault_value: f64,
    pub vault_token_price: f64,
    pub upper_bound: i32,
    pub lower_bound: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub token0_value: f64,
    pub token1_value: f64,
    pub vault_value: f64,
    pub vault_token_price: f64,
}

/// USD value of a vault from scaled balances and prices.
///
/// `(balance, price)` per token. A zero share supply has no share price and
/// is an error rather than an infinite or NaN price.
pub fn value_vault(
    vault: Address,
    total_supply: f64,
    token0: (f64, f64),
    token1: (f64, f64),
) -> Result<Valuation> {
    let token0_value = token0.0 * token0.1;
    let token1_value = token1.0 * token1.1;
    let vault_value = token0_value + token1_value;

    if total_supply == 0.0 {
        return Err(SnapshotError::ZeroTotalSupply { vault });
    }

    Ok(Valuation {
        token0_value,
        token1_value,
        vault_value,
        vault_token_price: vault_value / total_supply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valuation() {
        let v = value_vault(Address::ZERO, 2.0, (1.0, 2000.0), (500.0, 1.0)).unwrap();
        assert_eq!(v.token0_value, 2000.0);
        assert_eq!(v.token1_value, 500.0);
        assert_eq!(v.vault_value, 2500.0);
        assert_eq!(v.vault_token_price, 1250.0);
    }

    #[test]
    fn test_zero_supply() {
        let result = value_vault(Address::ZERO, 0.0, (1.0, 2000.0), (0.0, 1.0));
        assert!(matches!(result, Err(SnapshotError::ZeroTotalSupply { .. })));

        // an empty vault with supply is fine
        let v = value_vault(Address::ZERO, 1.0, (0.0, 2000.0), (0.0, 1.0)).unwrap();
        assert_eq!(v.vault_token_price, 0.0);
        assert!(v.vault_token_price.is_finite());
    }

    #[test]
    fn test_serialized_field_order() {
        let snapshot = VaultSnapshot {
            timestamp: 1_700_000_000,
            pool_id: "0.3".to_string(),
            manager: Provider::Gamma,
            total_supply: 1.0,
            token0_balance: 1.0,
            token0_contract: "0x0".to_string(),
            token0_price: 1.0,
            token0_value: 1.0,
            token1_contract: "0x1".to_string(),
            token1_balance: 1.0,
            token1_price: 1.0,
            token1_value: 1.0,
            vault_value: 2.0,
            vault_token_price: 2.0,
            upper_bound: 10,
            lower_bound: -10,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, SNAPSHOT_COLUMNS.to_vec());
        assert_eq!(value["manager"], "gamma");
    }
}
