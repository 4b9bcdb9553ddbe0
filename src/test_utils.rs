//! Shared test doubles: a recording chain mock, a fixed price source, an
//! in-memory table store and a log capture

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use alloy_transport::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::chain::ContractCaller;
use crate::error::SnapshotError;
use crate::pricing::PriceSource;
use crate::store::{Dataset, TableStore};

/// One 32-byte ABI word holding an unsigned integer
pub fn word_u256(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

pub fn word_u64(value: u64) -> Vec<u8> {
    word_u256(U256::from(value))
}

/// One ABI word holding a signed integer (two's complement)
pub fn word_i32(value: i32) -> Vec<u8> {
    let raw = if value >= 0 {
        U256::from(value as u64)
    } else {
        U256::MAX - U256::from((-(value as i64) - 1) as u64)
    };
    word_u256(raw)
}

pub fn word_address(address: Address) -> Vec<u8> {
    let mut word = vec![0u8; 12];
    word.extend_from_slice(address.as_slice());
    word
}

pub fn words(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Chain mock keyed by (contract, selector); unknown calls revert
#[derive(Clone, Default)]
pub struct MockChain {
    responses: Arc<Mutex<HashMap<(Address, [u8; 4]), Vec<u8>>>>,
    calls: Arc<Mutex<Vec<(Address, [u8; 4])>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond<C: SolCall>(&self, to: Address, output: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert((to, C::SELECTOR), output);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Selectors called on `to`, in call order
    pub fn calls_to(&self, to: Address) -> Vec<[u8; 4]> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(addr, _)| *addr == to)
            .map(|(_, selector)| *selector)
            .collect()
    }
}

#[async_trait]
impl ContractCaller for MockChain {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, TransportError> {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&input[..4]);
        self.calls.lock().unwrap().push((to, selector));

        self.responses
            .lock()
            .unwrap()
            .get(&(to, selector))
            .cloned()
            .map(Bytes::from)
            .ok_or_else(|| TransportErrorKind::custom_str("execution reverted"))
    }
}

/// Price source with fixed quotes that counts lookups
#[derive(Clone, Default)]
pub struct FixedPrices {
    prices: HashMap<String, f64>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl FixedPrices {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(id, p)| (id.to_string(), *p)).collect(),
            lookups: Arc::default(),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    async fn usd_price(&self, price_id: &str) -> Result<f64, SnapshotError> {
        self.lookups.lock().unwrap().push(price_id.to_string());
        self.prices
            .get(price_id)
            .copied()
            .ok_or_else(|| SnapshotError::MissingPrice(price_id.to_string()))
    }
}

/// Table store held in memory that counts writes
#[derive(Clone, Default)]
pub struct MemoryStore {
    name: String,
    contents: Arc<Mutex<Dataset>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Dataset {
        self.contents.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl TableStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_all(&self) -> Result<Dataset, SnapshotError> {
        Ok(self.contents())
    }

    fn write_all(&self, dataset: &Dataset) -> Result<(), SnapshotError> {
        *self.contents.lock().unwrap() = dataset.clone();
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Collects formatted log lines for ordering checks
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Subscriber writing plain text into this capture; install it with
    /// `tracing::subscriber::set_default` on a current-thread runtime
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).lines().map(String::from).collect()
    }

    /// Index of the first line containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(needle))
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
