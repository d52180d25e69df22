//! Feature-table access abstraction.
//!
//! This module provides the trait-based seam between the index engine
//! and the host container's generic row storage, allowing different row
//! stores while maintaining a consistent API. Rows are fetched in
//! bounded chunks or by id set; predicates are typed values, never raw
//! SQL fragments.

use crate::error::Result;
use crate::geometry::StoredGeometry;
use crate::projection::SrsId;
use bytes::Bytes;
use featurebox_types::envelope::GeometryEnvelope;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Identifier of a feature row, as assigned by the row store.
pub type FeatureId = i64;

/// A typed column value.
///
/// Mirrors the storage classes of the host container's row layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Bytes),
}

impl ColumnValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Integer(v) => Some(*v as f64),
            ColumnValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

/// Compare two values, honoring numeric cross-type comparison.
///
/// Returns `None` when the values are incomparable (mixed non-numeric
/// types, or either side null), in which case a comparison predicate
/// does not match.
fn compare_values(a: &ColumnValue, b: &ColumnValue) -> Option<Ordering> {
    match (a, b) {
        (ColumnValue::Null, _) | (_, ColumnValue::Null) => None,
        (ColumnValue::Text(a), ColumnValue::Text(b)) => Some(a.cmp(b)),
        (ColumnValue::Blob(a), ColumnValue::Blob(b)) => Some(a.cmp(b)),
        _ => {
            let a = a.as_f64()?;
            let b = b.as_f64()?;
            a.partial_cmp(&b)
        }
    }
}

/// Comparison operator for predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// A typed row predicate.
///
/// Values are carried as data, so a relational backend can render them
/// with bound parameters; caller values are never concatenated into
/// query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Compare a column against a constant
    Compare {
        column: String,
        op: CompareOp,
        value: ColumnValue,
    },
    /// Match rows where the column is null or absent
    IsNull { column: String },
    /// All sub-predicates match
    And(Vec<Predicate>),
    /// Any sub-predicate matches
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Equality shorthand.
    pub fn eq(column: impl Into<String>, value: ColumnValue) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    /// Comparison shorthand.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: ColumnValue) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    /// Evaluate the predicate against a row.
    ///
    /// A comparison against a missing or null column value does not
    /// match; only `IsNull` does.
    pub fn matches(&self, row: &FeatureRow) -> bool {
        match self {
            Predicate::Compare { column, op, value } => match row.value(column) {
                Some(actual) => match compare_values(actual, value) {
                    Some(ordering) => op.accepts(ordering),
                    None => false,
                },
                None => false,
            },
            Predicate::IsNull { column } => {
                matches!(row.value(column), None | Some(ColumnValue::Null))
            }
            Predicate::And(preds) => preds.iter().all(|p| p.matches(row)),
            Predicate::Or(preds) => preds.iter().any(|p| p.matches(row)),
        }
    }
}

/// A feature row: id, optional geometry, and attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: FeatureId,
    pub geometry: Option<StoredGeometry>,
    pub values: FxHashMap<String, ColumnValue>,
}

impl FeatureRow {
    /// Create a row with no geometry and no attributes.
    pub fn new(id: FeatureId) -> Self {
        Self {
            id,
            geometry: None,
            values: FxHashMap::default(),
        }
    }

    /// Create a row carrying a geometry.
    pub fn with_geometry(id: FeatureId, geometry: StoredGeometry) -> Self {
        Self {
            id,
            geometry: Some(geometry),
            values: FxHashMap::default(),
        }
    }

    /// Attach an attribute value.
    pub fn with_value(mut self, column: impl Into<String>, value: ColumnValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Look up an attribute value.
    pub fn value(&self, column: &str) -> Option<&ColumnValue> {
        self.values.get(column)
    }

    /// The row's geometry envelope, if it has a geometry.
    ///
    /// Uses the stored envelope header when present; otherwise parses
    /// the geometry payload.
    pub fn envelope(&self) -> Result<Option<GeometryEnvelope>> {
        match &self.geometry {
            Some(geometry) => geometry.envelope().map(Some),
            None => Ok(None),
        }
    }
}

/// Parameters for a bounded sequential read.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Columns to materialize; `None` means all
    pub columns: Option<Vec<String>>,
    /// Row filter applied by the store
    pub predicate: Option<Predicate>,
    /// Sort column; `None` means id order
    pub order_by: Option<String>,
    /// Maximum rows returned by this call
    pub limit: usize,
    /// Rows to skip before returning any
    pub offset: usize,
}

impl ScanRequest {
    /// A plain id-ordered chunk request.
    pub fn chunk(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }
}

/// Parameters for an id-set fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Row filter ANDed with the id-set membership
    pub predicate: Option<Predicate>,
    /// Collapse rows with identical selected values
    pub distinct: bool,
    /// Columns to materialize; `None` means all
    pub columns: Option<Vec<String>>,
    /// Sort column; `None` means id order
    pub order_by: Option<String>,
}

impl FetchRequest {
    /// Whether this request needs anything beyond plain row lookup.
    pub fn is_plain(&self) -> bool {
        self.predicate.is_none() && !self.distinct && self.columns.is_none()
            && self.order_by.is_none()
    }
}

/// Trait for feature-table row stores.
///
/// This is the narrow interface the index engine consumes from the host
/// container. Implementations must tolerate concurrent readers; all
/// methods are synchronous and may block on I/O.
pub trait FeatureTable: Send + Sync {
    /// Name of the feature table.
    fn table_name(&self) -> &str;

    /// Primary-key column name.
    fn id_column(&self) -> &str;

    /// Geometry column name.
    fn geometry_column(&self) -> &str;

    /// Native spatial reference system of the geometry column.
    fn srs(&self) -> SrsId;

    /// Total number of rows.
    fn row_count(&self) -> Result<u64>;

    /// Read a bounded chunk of rows.
    ///
    /// Rows are returned in id order unless the request names a sort
    /// column. `offset`/`limit` apply after filtering and ordering.
    fn chunked_scan(&self, request: &ScanRequest) -> Result<Vec<FeatureRow>>;

    /// Fetch a single row by id.
    fn fetch_by_id(&self, id: FeatureId) -> Result<Option<FeatureRow>>;

    /// Fetch the rows whose id is in `ids`, filtered and shaped by the
    /// request. Missing ids are silently absent from the result.
    fn fetch_by_ids(&self, ids: &[FeatureId], request: &FetchRequest) -> Result<Vec<FeatureRow>>;

    /// Count the rows whose id is in `ids` and which match the
    /// predicate.
    fn count_by_ids(&self, ids: &[FeatureId], predicate: Option<&Predicate>) -> Result<u64>;
}

/// In-memory feature table.
///
/// Rows live in an id-ordered map behind a read-write lock, so scans
/// see a consistent snapshot while writers mutate between calls. Scan
/// and fetch counters let tests assert how many chunk reads and id
/// lookups an operation issued.
pub struct MemoryFeatureTable {
    name: String,
    id_column: String,
    geometry_column: String,
    srs: SrsId,
    rows: RwLock<BTreeMap<FeatureId, FeatureRow>>,
    scan_reads: AtomicU64,
    id_fetches: AtomicU64,
}

impl MemoryFeatureTable {
    /// Create a table named `name` with default column names
    /// (`id`, `geom`) and WGS 84 coordinates.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_columns(name, "id", "geom")
    }

    /// Create a table with explicit id and geometry column names.
    pub fn with_columns(
        name: impl Into<String>,
        id_column: impl Into<String>,
        geometry_column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Table name must not be empty");
        Self {
            name,
            id_column: id_column.into(),
            geometry_column: geometry_column.into(),
            srs: SrsId::WGS84,
            rows: RwLock::new(BTreeMap::new()),
            scan_reads: AtomicU64::new(0),
            id_fetches: AtomicU64::new(0),
        }
    }

    /// Set the table's native spatial reference system.
    pub fn with_srs(mut self, srs: SrsId) -> Self {
        self.srs = srs;
        self
    }

    /// Insert or replace a row.
    pub fn insert_row(&self, row: FeatureRow) {
        self.rows.write().insert(row.id, row);
    }

    /// Insert a point feature, the common test fixture.
    pub fn insert_point(&self, id: FeatureId, x: f64, y: f64) {
        self.insert_row(FeatureRow::with_geometry(id, StoredGeometry::point(x, y)));
    }

    /// Remove a row. Returns whether it existed.
    pub fn remove_row(&self, id: FeatureId) -> bool {
        self.rows.write().remove(&id).is_some()
    }

    /// Replace a row's geometry, keeping its attributes.
    /// Returns whether the row existed.
    pub fn set_geometry(&self, id: FeatureId, geometry: Option<StoredGeometry>) -> bool {
        match self.rows.write().get_mut(&id) {
            Some(row) => {
                row.geometry = geometry;
                true
            }
            None => false,
        }
    }

    /// Number of chunk reads issued so far.
    pub fn scan_reads(&self) -> u64 {
        self.scan_reads.load(AtomicOrdering::Relaxed)
    }

    /// Number of single-id fetches issued so far.
    pub fn id_fetches(&self) -> u64 {
        self.id_fetches.load(AtomicOrdering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn project(&self, row: &FeatureRow, columns: Option<&[String]>) -> FeatureRow {
        let Some(columns) = columns else {
            return row.clone();
        };
        let mut projected = FeatureRow::new(row.id);
        for column in columns {
            if column == &self.geometry_column {
                projected.geometry = row.geometry.clone();
            } else if let Some(value) = row.values.get(column) {
                projected.values.insert(column.clone(), value.clone());
            }
        }
        projected
    }

    fn order_rows(rows: &mut [FeatureRow], order_by: Option<&str>) {
        let Some(column) = order_by else { return };
        rows.sort_by(|a, b| {
            match (a.value(column), b.value(column)) {
                (Some(va), Some(vb)) => {
                    compare_values(va, vb).unwrap_or_else(|| a.id.cmp(&b.id))
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.id.cmp(&b.id),
            }
        });
    }
}

impl FeatureTable for MemoryFeatureTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn id_column(&self) -> &str {
        &self.id_column
    }

    fn geometry_column(&self) -> &str {
        &self.geometry_column
    }

    fn srs(&self) -> SrsId {
        self.srs
    }

    fn row_count(&self) -> Result<u64> {
        Ok(self.rows.read().len() as u64)
    }

    fn chunked_scan(&self, request: &ScanRequest) -> Result<Vec<FeatureRow>> {
        self.scan_reads.fetch_add(1, AtomicOrdering::Relaxed);
        let rows = self.rows.read();

        let mut matched: Vec<FeatureRow> = rows
            .values()
            .filter(|row| {
                request
                    .predicate
                    .as_ref()
                    .is_none_or(|p| p.matches(row))
            })
            .cloned()
            .collect();
        Self::order_rows(&mut matched, request.order_by.as_deref());

        Ok(matched
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|row| self.project(&row, request.columns.as_deref()))
            .collect())
    }

    fn fetch_by_id(&self, id: FeatureId) -> Result<Option<FeatureRow>> {
        self.id_fetches.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self.rows.read().get(&id).cloned())
    }

    fn fetch_by_ids(&self, ids: &[FeatureId], request: &FetchRequest) -> Result<Vec<FeatureRow>> {
        let rows = self.rows.read();

        let mut sorted_ids: Vec<FeatureId> = ids.to_vec();
        sorted_ids.sort_unstable();
        sorted_ids.dedup();

        let mut matched: Vec<FeatureRow> = sorted_ids
            .into_iter()
            .filter_map(|id| rows.get(&id))
            .filter(|row| {
                request
                    .predicate
                    .as_ref()
                    .is_none_or(|p| p.matches(row))
            })
            .map(|row| self.project(row, request.columns.as_deref()))
            .collect();
        Self::order_rows(&mut matched, request.order_by.as_deref());

        if request.distinct {
            let mut seen: Vec<FeatureRow> = Vec::with_capacity(matched.len());
            for row in matched {
                let duplicate = seen
                    .iter()
                    .any(|kept| kept.values == row.values && kept.geometry == row.geometry);
                if !duplicate {
                    seen.push(row);
                }
            }
            matched = seen;
        }

        Ok(matched)
    }

    fn count_by_ids(&self, ids: &[FeatureId], predicate: Option<&Predicate>) -> Result<u64> {
        let rows = self.rows.read();

        let mut sorted_ids: Vec<FeatureId> = ids.to_vec();
        sorted_ids.sort_unstable();
        sorted_ids.dedup();

        Ok(sorted_ids
            .into_iter()
            .filter_map(|id| rows.get(&id))
            .filter(|row| predicate.is_none_or(|p| p.matches(row)))
            .count() as u64)
    }
}
