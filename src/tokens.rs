//! Token metadata table
//!
//! Maps an ERC-20 contract address to the id the price service knows it by
//! and its decimal precision. The table is loaded from a JSON document of the
//! form `{ "<lower-case address>": ["<price id>", <decimals>] }`.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, SnapshotError};

/// Metadata for one tracked token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    /// Id used by the price service (e.g. "weth", "usd-coin")
    pub price_id: String,
    pub decimals: u8,
}

/// Lookup table keyed by token address
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    entries: HashMap<Address, TokenMeta>,
}

impl TokenTable {
    /// Load the table from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        Self::from_json(&content, &path_str)
    }

    /// Parse the table from JSON text; `origin` only labels errors
    pub fn from_json(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, (String, u8)> =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, (price_id, decimals)) in raw {
            // keys are stored lower-cased, so no checksum to verify here
            let address = Address::from_str(&key.to_lowercase()).map_err(|e| {
                ConfigError::InvalidAddress {
                    context: format!("token table {}", origin),
                    value: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            entries.insert(address, TokenMeta { price_id, decimals });
        }

        Ok(Self { entries })
    }

    pub fn insert(&mut self, address: Address, price_id: impl Into<String>, decimals: u8) {
        self.entries.insert(
            address,
            TokenMeta {
                price_id: price_id.into(),
                decimals,
            },
        );
    }

    pub fn get(&self, address: &Address) -> Result<&TokenMeta, SnapshotError> {
        self.entries
            .get(address)
            .ok_or(SnapshotError::UnknownToken(*address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Convert a raw integer amount into a human-scaled quantity.
///
/// The result is the correctly rounded `f64` of the exact quotient
/// `raw / 10^decimals`, for any `U256`.
pub fn scale_units(raw: U256, decimals: u8) -> f64 {
    // digits followed by a decimal exponent always parse
    format!("{}e-{}", raw, decimals)
        .parse::<f64>()
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TABLE: &str = r#"{
        "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2": ["weth", 18],
        "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48": ["usd-coin", 6]
    }"#;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = TokenTable::from_json(TABLE, "test").unwrap();
        assert_eq!(table.len(), 2);

        let weth = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let meta = table.get(&weth).unwrap();
        assert_eq!(meta.price_id, "weth");
        assert_eq!(meta.decimals, 18);

        let usdc = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        assert_eq!(table.get(&usdc).unwrap().decimals, 6);
    }

    #[test]
    fn test_unknown_token() {
        let table = TokenTable::from_json(TABLE, "test").unwrap();
        let dai = address!("6B175474E89094C44Da98b954EedcdeCB5BE3830");
        assert!(matches!(
            table.get(&dai),
            Err(SnapshotError::UnknownToken(a)) if a == dai
        ));
    }

    #[test]
    fn test_malformed_entries_are_rejected() {
        let bad_shape = r#"{ "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2": "weth" }"#;
        assert!(matches!(
            TokenTable::from_json(bad_shape, "test"),
            Err(ConfigError::Parse { .. })
        ));

        let bad_key = r#"{ "0x1234": ["weth", 18] }"#;
        assert!(matches!(
            TokenTable::from_json(bad_key, "test"),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_scale_units_basic() {
        assert_eq!(scale_units(U256::from(2_000_000_000_000_000_000u128), 18), 2.0);
        assert_eq!(scale_units(U256::from(500_000_000u64), 6), 500.0);
        assert_eq!(scale_units(U256::from(12345u64), 0), 12345.0);
        assert_eq!(scale_units(U256::ZERO, 18), 0.0);
        assert_eq!(scale_units(U256::from(1u64), 18), 1e-18);
    }

    #[test]
    fn test_scale_units_matches_float_division() {
        let samples: [(u128, u8); 6] = [
            (1_234_567_890_123_456_789, 18),
            (987_654_321, 6),
            (31_415_926_535, 8),
            (u64::MAX as u128, 18),
            (7, 2),
            (100_000_000_000_000_000_000_000, 18),
        ];

        for (raw, decimals) in samples {
            let scaled = scale_units(U256::from(raw), decimals);
            let divisor = 10f64.powi(decimals as i32);
            let back = scaled * divisor;
            let expected = raw as f64;
            assert!(
                ((back - expected) / expected).abs() <= f64::EPSILON * 2.0,
                "{} / 10^{} round-trips to {}",
                raw,
                decimals,
                back
            );
            assert!(((scaled - expected / divisor) / scaled).abs() <= f64::EPSILON);
        }
    }

    #[test]
    fn test_scale_units_beyond_u128() {
        let huge = U256::from(10u64).pow(U256::from(60));
        assert_eq!(scale_units(huge, 18), 1e42);
    }
}
