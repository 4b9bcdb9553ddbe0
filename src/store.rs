//! Historical snapshot store
//!
//! The store holds one table that only ever grows: every run reads it in
//! full, appends its rows and writes the whole table back. The file-backed
//! store keeps the spreadsheet layout (header row, then data rows) as a JSON
//! array of arrays.

use serde_json::{Number, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SnapshotError};
use crate::vaults::{VaultSnapshot, SNAPSHOT_COLUMNS};

// ============================================
// DATASET
// ============================================

/// Named columns and rows of JSON cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(SnapshotError::Store {
                store: "dataset".to_string(),
                message: format!(
                    "row {} has {} cells, expected {}",
                    bad,
                    rows[bad].len(),
                    columns.len()
                ),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn from_snapshots(snapshots: &[VaultSnapshot]) -> Result<Self> {
        let columns: Vec<String> = SNAPSHOT_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut rows = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let value = serde_json::to_value(snapshot)?;
            let row = columns
                .iter()
                .map(|c| value.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Header row followed by data rows
    pub fn from_table(mut table: Vec<Vec<Value>>) -> Result<Self> {
        if table.is_empty() {
            return Ok(Self::default());
        }
        let header = table.remove(0);
        let columns = header
            .into_iter()
            .map(|cell| match cell {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>();

        // short rows are padded, as trailing empty cells often are dropped
        let width = columns.len();
        let rows = table
            .into_iter()
            .map(|mut row| {
                row.resize(width.max(row.len()), Value::Null);
                row
            })
            .collect();

        Self::new(columns, rows)
    }

    pub fn to_table(&self) -> Vec<Vec<Value>> {
        let header = self.columns.iter().cloned().map(Value::String).collect();
        std::iter::once(header).chain(self.rows.iter().cloned()).collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows of `self` followed by rows of `newer`.
    ///
    /// Existing columns keep their position, columns only `newer` has are
    /// appended, and cells a side does not have are null.
    pub fn concat(self, newer: Dataset) -> Dataset {
        if self.columns.is_empty() && self.rows.is_empty() {
            return newer;
        }

        let mut columns = self.columns;
        for column in &newer.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        let width = columns.len();

        let mut rows = self.rows;
        for row in &mut rows {
            row.resize(width, Value::Null);
        }

        let positions: Vec<usize> = newer
            .columns
            .iter()
            .filter_map(|c| columns.iter().position(|x| x == c))
            .collect();
        for row in newer.rows {
            let mut merged = vec![Value::Null; width];
            for (cell, &idx) in row.into_iter().zip(&positions) {
                merged[idx] = cell;
            }
            rows.push(merged);
        }

        Dataset { columns, rows }
    }

    /// Tighten column types from the values already held: a column whose
    /// non-null cells are all whole numbers is stored as integers. Strings
    /// are never parsed, so text such as pool ids keeps its exact form.
    pub fn convert_types(&mut self) {
        for idx in 0..self.columns.len() {
            let integral = self
                .rows
                .iter()
                .map(|r| &r[idx])
                .filter(|cell| !cell.is_null())
                .all(|cell| as_integer(cell).is_some());
            if !integral {
                continue;
            }
            for row in &mut self.rows {
                if let Some(n) = as_integer(&row[idx]) {
                    row[idx] = Value::Number(n);
                }
            }
        }
    }
}

/// Whole-valued JSON numbers as an integer `Number`
fn as_integer(cell: &Value) -> Option<Number> {
    let Value::Number(n) = cell else {
        return None;
    };
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    // beyond 2^53 a float no longer names a single integer
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_992.0)
        .map(|f| Number::from(f as i64))
}

// ============================================
// STORES
// ============================================

/// Whole-table read and replace
pub trait TableStore {
    fn name(&self) -> &str;

    fn read_all(&self) -> Result<Dataset>;

    fn write_all(&self, dataset: &Dataset) -> Result<()>;
}

/// Table kept in one JSON file
#[derive(Debug, Clone)]
pub struct JsonTableStore {
    path: PathBuf,
}

impl JsonTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl std::fmt::Display) -> SnapshotError {
        SnapshotError::Store {
            store: self.path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl TableStore for JsonTableStore {
    fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("store")
    }

    fn read_all(&self) -> Result<Dataset> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(Dataset::default());
            }
            Err(e) => return Err(self.error(e)),
        };
        if content.trim().is_empty() {
            return Ok(Dataset::default());
        }

        let table: Vec<Vec<Value>> = serde_json::from_str(&content).map_err(|e| self.error(e))?;
        Dataset::from_table(table)
    }

    /// Written to a sibling temp file first, then renamed over the target
    fn write_all(&self, dataset: &Dataset) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, &dataset.to_table())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| self.error(e.error))?;
        Ok(())
    }
}

// ============================================
// PERSISTENCE
// ============================================

/// Append `new_rows` to the store. Returns the number of rows now stored,
/// or `None` when there was nothing to write.
pub fn persist(store: &dyn TableStore, new_rows: Dataset) -> Result<Option<usize>> {
    if new_rows.is_empty() {
        info!("no new rows, {} left untouched", store.name());
        return Ok(None);
    }

    let existing = store.read_all()?;
    debug!("{} holds {} rows", store.name(), existing.len());

    let mut merged = existing.concat(new_rows);
    merged.convert_types();
    store.write_all(&merged)?;

    info!("new dataset written into store: {}", store.name());
    Ok(Some(merged.len()))
}
