//! Persistence and query translation for the index entities.
//!
//! Two records back the index: one table-level entry marking a feature
//! table as indexed, and one envelope entry per feature row. This
//! module provides the trait-based store abstraction for them plus the
//! range-predicate translation the query engine consumes. The logical
//! relational layout is `table_index(table_name PK, geometry_column,
//! last_indexed nullable)` and `geometry_index(table_name, geom_id,
//! min_x, max_x, min_y, max_y, min_z?, max_z?, min_m?, max_m?,
//! PK(table_name, geom_id))`; the in-memory store realizes the
//! composite key as per-table maps.

use crate::error::{IndexError, Result};
use crate::table::{ColumnValue, CompareOp, FeatureId, Predicate};
use featurebox_types::envelope::GeometryEnvelope;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Table-level index record.
///
/// Its presence marks the table as carrying an index; a null
/// `last_indexed` means a build has started but never completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableIndexEntry {
    /// Feature table name (unique key)
    pub table_name: String,
    /// Name of the indexed geometry column
    pub geometry_column: String,
    /// When the index was last successfully built or refreshed
    pub last_indexed: Option<SystemTime>,
}

impl TableIndexEntry {
    /// Create an entry for a build that has not completed yet.
    pub fn new(table_name: impl Into<String>, geometry_column: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            geometry_column: geometry_column.into(),
            last_indexed: None,
        }
    }
}

/// Per-row envelope record.
///
/// Owned exclusively by the indexing engine and replaced wholesale on
/// re-index; query code only reads it. Z and M bounds are present only
/// when the source geometry carries that dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryIndexEntry {
    /// Feature row id (second half of the composite key)
    pub geom_id: FeatureId,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: Option<f64>,
    pub max_z: Option<f64>,
    pub min_m: Option<f64>,
    pub max_m: Option<f64>,
}

impl GeometryIndexEntry {
    /// Build an entry from a row's envelope.
    pub fn from_envelope(geom_id: FeatureId, envelope: &GeometryEnvelope) -> Self {
        Self {
            geom_id,
            min_x: envelope.min_x,
            max_x: envelope.max_x,
            min_y: envelope.min_y,
            max_y: envelope.max_y,
            min_z: envelope.min_z,
            max_z: envelope.max_z,
            min_m: envelope.min_m,
            max_m: envelope.max_m,
        }
    }

    /// The stored bounds as an envelope.
    pub fn envelope(&self) -> GeometryEnvelope {
        let mut envelope = GeometryEnvelope::new(self.min_x, self.min_y, self.max_x, self.max_y);
        if let (Some(min_z), Some(max_z)) = (self.min_z, self.max_z) {
            envelope = envelope.with_z(min_z, max_z);
        }
        if let (Some(min_m), Some(max_m)) = (self.min_m, self.max_m) {
            envelope = envelope.with_m(min_m, max_m);
        }
        envelope
    }
}

/// Range query over stored envelopes.
///
/// An entry matches when its rectangle overlaps the query rectangle,
/// boundary touching included:
/// `min_x <= q.max_x AND max_x >= q.min_x AND min_y <= q.max_y AND
/// max_y >= q.min_y`. Z and M bounds constrain the match only when both
/// the query and the entry carry that dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeRange {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub z: Option<(f64, f64)>,
    pub m: Option<(f64, f64)>,
}

impl EnvelopeRange {
    /// A range every entry matches.
    pub fn unbounded() -> Self {
        Self {
            min_x: f64::NEG_INFINITY,
            max_x: f64::INFINITY,
            min_y: f64::NEG_INFINITY,
            max_y: f64::INFINITY,
            z: None,
            m: None,
        }
    }

    /// Build the range from a query envelope.
    pub fn from_envelope(envelope: &GeometryEnvelope) -> Self {
        Self {
            min_x: envelope.min_x,
            max_x: envelope.max_x,
            min_y: envelope.min_y,
            max_y: envelope.max_y,
            z: envelope.z_range(),
            m: envelope.m_range(),
        }
    }

    /// Test a stored entry against the range.
    pub fn matches(&self, entry: &GeometryIndexEntry) -> bool {
        if entry.min_x > self.max_x
            || entry.max_x < self.min_x
            || entry.min_y > self.max_y
            || entry.max_y < self.min_y
        {
            return false;
        }
        if let (Some((q_min, q_max)), Some(min_z), Some(max_z)) =
            (self.z, entry.min_z, entry.max_z)
        {
            if min_z > q_max || max_z < q_min {
                return false;
            }
        }
        if let (Some((q_min, q_max)), Some(min_m), Some(max_m)) =
            (self.m, entry.min_m, entry.max_m)
        {
            if min_m > q_max || max_m < q_min {
                return false;
            }
        }
        true
    }

    /// Render the range as a typed predicate over the geometry-index
    /// columns, for stores that translate it to relational filters.
    ///
    /// Z and M terms accept entries without that dimension, mirroring
    /// `matches`.
    pub fn to_predicate(&self) -> Predicate {
        let mut terms = vec![
            Predicate::compare("min_x", CompareOp::Le, ColumnValue::Real(self.max_x)),
            Predicate::compare("max_x", CompareOp::Ge, ColumnValue::Real(self.min_x)),
            Predicate::compare("min_y", CompareOp::Le, ColumnValue::Real(self.max_y)),
            Predicate::compare("max_y", CompareOp::Ge, ColumnValue::Real(self.min_y)),
        ];
        if let Some((q_min, q_max)) = self.z {
            terms.push(Predicate::Or(vec![
                Predicate::IsNull {
                    column: "min_z".to_string(),
                },
                Predicate::And(vec![
                    Predicate::compare("min_z", CompareOp::Le, ColumnValue::Real(q_max)),
                    Predicate::compare("max_z", CompareOp::Ge, ColumnValue::Real(q_min)),
                ]),
            ]));
        }
        if let Some((q_min, q_max)) = self.m {
            terms.push(Predicate::Or(vec![
                Predicate::IsNull {
                    column: "min_m".to_string(),
                },
                Predicate::And(vec![
                    Predicate::compare("min_m", CompareOp::Le, ColumnValue::Real(q_max)),
                    Predicate::compare("max_m", CompareOp::Ge, ColumnValue::Real(q_min)),
                ]),
            ]));
        }
        Predicate::And(terms)
    }
}

/// Trait for index persistence backends.
///
/// The indexing engine is the sole writer; query engines only read.
/// `upsert_geometries` carries one chunk and must commit all-or-nothing.
pub trait IndexStore: Send + Sync {
    /// Fetch a table's index record.
    fn table_entry(&self, table: &str) -> Result<Option<TableIndexEntry>>;

    /// Insert or replace a table's index record.
    fn upsert_table(&self, entry: &TableIndexEntry) -> Result<()>;

    /// Refresh a table's `last_indexed` timestamp.
    /// Returns false when the table has no index record.
    fn touch_table(&self, table: &str, at: SystemTime) -> Result<bool>;

    /// Remove a table's index record and all of its geometry entries.
    /// Returns whether a record existed.
    fn delete_table(&self, table: &str) -> Result<bool>;

    /// Insert or replace a chunk of geometry entries in one
    /// transaction. Fails with `NotIndexed` when the table has no index
    /// record, since geometry entries must not outlive it.
    fn upsert_geometries(&self, table: &str, entries: &[GeometryIndexEntry]) -> Result<()>;

    /// Remove one geometry entry. Returns whether it existed.
    fn delete_geometry(&self, table: &str, id: FeatureId) -> Result<bool>;

    /// Remove all geometry entries for a table, returning how many.
    fn clear_geometries(&self, table: &str) -> Result<u64>;

    /// Fetch one geometry entry.
    fn geometry(&self, table: &str, id: FeatureId) -> Result<Option<GeometryIndexEntry>>;

    /// Number of geometry entries stored for a table.
    fn geometry_count(&self, table: &str) -> Result<u64>;

    /// Ids of entries whose envelope matches the range, in ascending id
    /// order. Fails with `NotIndexed` when the table has no index
    /// record.
    fn ids_in_range(&self, table: &str, range: &EnvelopeRange) -> Result<Vec<FeatureId>>;
}

#[derive(Default)]
struct StoreState {
    tables: FxHashMap<String, TableIndexEntry>,
    geometries: FxHashMap<String, BTreeMap<FeatureId, GeometryIndexEntry>>,
}

/// In-memory index store.
///
/// Chunk upserts apply under one write lock, so readers observe either
/// none or all of a chunk. The commit counter lets tests assert how
/// many chunk transactions a build issued.
#[derive(Default)]
pub struct MemoryIndexStore {
    state: RwLock<StoreState>,
    upsert_batches: AtomicU64,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunk upserts committed so far.
    pub fn upsert_batches(&self) -> u64 {
        self.upsert_batches.load(Ordering::Relaxed)
    }
}

impl IndexStore for MemoryIndexStore {
    fn table_entry(&self, table: &str) -> Result<Option<TableIndexEntry>> {
        Ok(self.state.read().tables.get(table).cloned())
    }

    fn upsert_table(&self, entry: &TableIndexEntry) -> Result<()> {
        self.state
            .write()
            .tables
            .insert(entry.table_name.clone(), entry.clone());
        Ok(())
    }

    fn touch_table(&self, table: &str, at: SystemTime) -> Result<bool> {
        match self.state.write().tables.get_mut(table) {
            Some(entry) => {
                entry.last_indexed = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_table(&self, table: &str) -> Result<bool> {
        let mut state = self.state.write();
        state.geometries.remove(table);
        Ok(state.tables.remove(table).is_some())
    }

    fn upsert_geometries(&self, table: &str, entries: &[GeometryIndexEntry]) -> Result<()> {
        let mut state = self.state.write();
        if !state.tables.contains_key(table) {
            return Err(IndexError::NotIndexed(table.to_string()));
        }
        let rows = state.geometries.entry(table.to_string()).or_default();
        for entry in entries {
            rows.insert(entry.geom_id, entry.clone());
        }
        self.upsert_batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete_geometry(&self, table: &str, id: FeatureId) -> Result<bool> {
        let mut state = self.state.write();
        let Some(rows) = state.geometries.get_mut(table) else {
            return Ok(false);
        };
        let removed = rows.remove(&id).is_some();
        if rows.is_empty() {
            state.geometries.remove(table);
        }
        Ok(removed)
    }

    fn clear_geometries(&self, table: &str) -> Result<u64> {
        let mut state = self.state.write();
        Ok(state
            .geometries
            .remove(table)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }

    fn geometry(&self, table: &str, id: FeatureId) -> Result<Option<GeometryIndexEntry>> {
        Ok(self
            .state
            .read()
            .geometries
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    fn geometry_count(&self, table: &str) -> Result<u64> {
        Ok(self
            .state
            .read()
            .geometries
            .get(table)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }

    fn ids_in_range(&self, table: &str, range: &EnvelopeRange) -> Result<Vec<FeatureId>> {
        let state = self.state.read();
        if !state.tables.contains_key(table) {
            return Err(IndexError::NotIndexed(table.to_string()));
        }
        let Some(rows) = state.geometries.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|entry| range.matches(entry))
            .map(|entry| entry.geom_id)
            .collect())
    }
}
