//! Spatial queries against one feature table.
//!
//! `FeatureIndex` is the caller-facing handle. It owns the index
//! lifecycle for a table and answers bounding-box and envelope queries,
//! routing each request to the indexed path when a completed index
//! exists and to the chunked manual scan otherwise. Both paths return
//! the same matches for the same request, so callers never need to know
//! whether the table is indexed.

mod indexed;
mod scan;

use crate::error::{IndexError, Result};
use crate::indexer::TableIndexer;
use crate::projection::{geodesic_envelope, CoordTransform, ProjectionBridge, SrsId};
use crate::rowcache::RowCache;
use crate::store::{EnvelopeRange, IndexStore};
use crate::table::{FeatureId, FeatureRow, FeatureTable, FetchRequest, Predicate};
use crate::types::{IndexConfig, IndexOptions, IndexStatus};
use featurebox_types::bbox::BoundingBox;
use featurebox_types::envelope::GeometryEnvelope;
use std::sync::Arc;
use std::time::SystemTime;

/// Spatial restriction of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SpatialFilter {
    /// No spatial restriction; every row is a candidate.
    #[default]
    None,
    /// Rows whose envelope intersects the box. When `srs` names a
    /// system other than the table's native one, the box is projected
    /// before testing.
    BoundingBox {
        bbox: BoundingBox,
        srs: Option<SrsId>,
    },
    /// Rows whose envelope intersects this envelope, given in the
    /// table's native system. Z/M ranges participate only when both
    /// sides carry them.
    Envelope(GeometryEnvelope),
}

/// One spatial query or count.
///
/// Collapses the distinct/columns/predicate/order/limit/offset
/// parameter surface into a single shape; unset fields keep their
/// neutral meaning. `count` honors the filter and predicate but ignores
/// the shaping fields.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub filter: SpatialFilter,
    /// Extra row filter ANDed with the spatial match
    pub predicate: Option<Predicate>,
    pub distinct: bool,
    /// Columns to materialize; `None` means all
    pub columns: Option<Vec<String>>,
    /// Sort column; `None` means id order
    pub order_by: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl QueryRequest {
    /// Match every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match rows intersecting a box in the table's native system.
    pub fn bbox(bbox: BoundingBox) -> Self {
        Self {
            filter: SpatialFilter::BoundingBox { bbox, srs: None },
            ..Default::default()
        }
    }

    /// Match rows intersecting a box given in `srs`.
    pub fn bbox_in(bbox: BoundingBox, srs: SrsId) -> Self {
        Self {
            filter: SpatialFilter::BoundingBox {
                bbox,
                srs: Some(srs),
            },
            ..Default::default()
        }
    }

    /// Match rows intersecting an envelope in the table's native
    /// system.
    pub fn envelope(envelope: GeometryEnvelope) -> Self {
        Self {
            filter: SpatialFilter::Envelope(envelope),
            ..Default::default()
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether rows can be materialized one by one, without the
    /// whole-result shaping that distinct, projection, or ordering
    /// require.
    fn is_plain(&self) -> bool {
        !self.distinct && self.columns.is_none() && self.order_by.is_none()
    }

    fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            predicate: self.predicate.clone(),
            distinct: self.distinct,
            columns: self.columns.clone(),
            order_by: self.order_by.clone(),
        }
    }
}

enum CursorInner {
    Rows(std::vec::IntoIter<FeatureRow>),
    Lazy {
        ids: std::vec::IntoIter<FeatureId>,
        fetch: Box<dyn Fn(FeatureId) -> Result<Option<FeatureRow>> + Send>,
        predicate: Option<Predicate>,
        skip: usize,
        remaining: Option<usize>,
    },
}

/// Iterator over query results.
///
/// Indexed plain queries materialize rows lazily, one table fetch per
/// candidate id as the caller advances; shaped and scanned queries hold
/// their rows up front. Ids that matched the index but vanished from
/// the table before materialization are skipped.
pub struct RowCursor {
    inner: CursorInner,
}

impl RowCursor {
    fn from_rows(rows: Vec<FeatureRow>) -> Self {
        Self {
            inner: CursorInner::Rows(rows.into_iter()),
        }
    }

    fn lazy(
        ids: Vec<FeatureId>,
        fetch: Box<dyn Fn(FeatureId) -> Result<Option<FeatureRow>> + Send>,
        predicate: Option<Predicate>,
        skip: usize,
        remaining: Option<usize>,
    ) -> Self {
        Self {
            inner: CursorInner::Lazy {
                ids: ids.into_iter(),
                fetch,
                predicate,
                skip,
                remaining,
            },
        }
    }

    /// Drain the cursor into a vector, stopping at the first error.
    pub fn into_rows(self) -> Result<Vec<FeatureRow>> {
        self.collect()
    }
}

impl Iterator for RowCursor {
    type Item = Result<FeatureRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            CursorInner::Rows(rows) => rows.next().map(Ok),
            CursorInner::Lazy {
                ids,
                fetch,
                predicate,
                skip,
                remaining,
            } => {
                if *remaining == Some(0) {
                    return None;
                }
                loop {
                    let id = ids.next()?;
                    let row = match fetch(id) {
                        Ok(Some(row)) => row,
                        Ok(None) => continue,
                        Err(err) => return Some(Err(err)),
                    };
                    if let Some(predicate) = predicate {
                        if !predicate.matches(&row) {
                            continue;
                        }
                    }
                    if *skip > 0 {
                        *skip -= 1;
                        continue;
                    }
                    if let Some(remaining) = remaining {
                        *remaining -= 1;
                    }
                    return Some(Ok(row));
                }
            }
        }
    }
}

/// Spatial index handle for one feature table.
pub struct FeatureIndex<T, S> {
    table: Arc<T>,
    store: Arc<S>,
    config: IndexConfig,
    bridge: ProjectionBridge,
    cache: Arc<RowCache>,
    indexer: TableIndexer<T, S>,
}

impl<T: FeatureTable + 'static, S: IndexStore> FeatureIndex<T, S> {
    /// Create a handle with the default configuration.
    pub fn new(table: Arc<T>, store: Arc<S>) -> Self {
        Self::build(table, store, IndexConfig::default())
    }

    /// Create a handle with an explicit configuration.
    pub fn with_config(table: Arc<T>, store: Arc<S>, config: IndexConfig) -> Result<Self> {
        config.validate().map_err(IndexError::InvalidInput)?;
        Ok(Self::build(table, store, config))
    }

    fn build(table: Arc<T>, store: Arc<S>, config: IndexConfig) -> Self {
        let indexer = TableIndexer::new(Arc::clone(&table), Arc::clone(&store), config.clone());
        Self {
            table,
            store,
            config,
            bridge: ProjectionBridge::new(),
            cache: Arc::new(RowCache::new()),
            indexer,
        }
    }

    /// Register a coordinate transform for cross-projection queries.
    pub fn with_transform(mut self, transform: Arc<dyn CoordTransform>) -> Self {
        self.bridge.register(transform);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<T> {
        &self.table
    }

    // Index lifecycle, delegated to the indexing engine.

    /// Index the table if it is not indexed yet. See
    /// [`TableIndexer::index`].
    pub fn index(&self) -> Result<u64> {
        self.indexer.index()
    }

    /// Index the table with a force flag and/or progress token.
    pub fn index_with(&self, options: &IndexOptions) -> Result<u64> {
        self.indexer.index_with(options)
    }

    /// Refresh one row's index entry after a geometry write.
    pub fn index_row(&self, id: FeatureId) -> Result<bool> {
        self.indexer.index_row(id)
    }

    /// Drop one row's index entry after the row is deleted.
    pub fn delete_row(&self, id: FeatureId) -> Result<bool> {
        self.indexer.delete_row(id)
    }

    /// Drop the whole index.
    pub fn delete_index(&self) -> Result<u64> {
        self.indexer.delete_index()
    }

    pub fn is_indexed(&self) -> Result<bool> {
        self.indexer.is_indexed()
    }

    pub fn last_indexed(&self) -> Result<Option<SystemTime>> {
        self.indexer.last_indexed()
    }

    pub fn status(&self) -> Result<IndexStatus> {
        self.indexer.status()
    }

    // Query surface.

    /// Run a spatial query.
    ///
    /// Uses the index when the table carries a completed one, the
    /// chunked manual scan otherwise. On the manual path, offset-based
    /// pagination rescans from the start of the table on every call, so
    /// walking a large result set page by page costs O(n) per page.
    pub fn query(&self, request: &QueryRequest) -> Result<RowCursor> {
        match self.resolve_filter(&request.filter)? {
            Some(envelope) if self.is_indexed()? => self.indexed_query(&envelope, request),
            Some(envelope) => self.scan_query(Some(&envelope), request),
            None => self.scan_query(None, request),
        }
    }

    /// Count the rows a query would return, ignoring shaping and
    /// pagination. Always consistent with [`FeatureIndex::query`] for
    /// the same filter and predicate.
    pub fn count(&self, request: &QueryRequest) -> Result<u64> {
        match self.resolve_filter(&request.filter)? {
            Some(envelope) if self.is_indexed()? => {
                self.indexed_count(&envelope, request.predicate.as_ref())
            }
            Some(envelope) => self.scan_count(Some(&envelope), request.predicate.as_ref()),
            None => self.scan_count(None, request.predicate.as_ref()),
        }
    }

    /// Fetch one row by id, collapsing concurrent fetches of the same
    /// id into a single table read.
    pub fn row(&self, id: FeatureId) -> Result<Option<FeatureRow>> {
        let table = &self.table;
        self.cache.fetch_with(id, |id| table.fetch_by_id(id))
    }

    /// Ids of index entries matching the filter, in ascending order.
    ///
    /// This reads the index directly and fails with `NotIndexed` when
    /// the table has no completed index.
    pub fn indexed_ids(&self, filter: &SpatialFilter) -> Result<Vec<FeatureId>> {
        if !self.is_indexed()? {
            return Err(IndexError::NotIndexed(self.table.table_name().to_string()));
        }
        let range = match self.resolve_filter(filter)? {
            Some(envelope) => EnvelopeRange::from_envelope(&envelope),
            None => EnvelopeRange::unbounded(),
        };
        self.store.ids_in_range(self.table.table_name(), &range)
    }

    /// Bring the filter into the table's native system, widening it
    /// geodesically when the index was built that way.
    fn resolve_filter(&self, filter: &SpatialFilter) -> Result<Option<GeometryEnvelope>> {
        let envelope = match filter {
            SpatialFilter::None => return Ok(None),
            SpatialFilter::BoundingBox { bbox, srs } => {
                let native = match srs {
                    Some(from) => self.bridge.project_bbox(bbox, *from, self.table.srs())?,
                    None => bbox.clone(),
                };
                GeometryEnvelope::from_bbox(&native)
            }
            SpatialFilter::Envelope(envelope) => envelope.clone(),
        };
        if self.config.geodesic {
            Ok(Some(geodesic_envelope(&envelope)))
        } else {
            Ok(Some(envelope))
        }
    }
}

fn window(rows: Vec<FeatureRow>, offset: usize, limit: Option<usize>) -> Vec<FeatureRow> {
    match limit {
        Some(limit) => rows.into_iter().skip(offset).take(limit).collect(),
        None => rows.into_iter().skip(offset).collect(),
    }
}
