//! Bounding-box indexing and spatial queries for feature tables whose host
//! container has no native spatial index.
//!
//! ```rust
//! use featurebox::{BoundingBox, FeatureIndex, MemoryFeatureTable, MemoryIndexStore, QueryRequest};
//! use std::sync::Arc;
//!
//! let table = Arc::new(MemoryFeatureTable::new("cities"));
//! table.insert_point(1, -74.0060, 40.7128);
//! table.insert_point(2, 2.3522, 48.8566);
//!
//! let index = FeatureIndex::new(table, Arc::new(MemoryIndexStore::new()));
//! index.index()?;
//!
//! let atlantic_coast = BoundingBox::new(-80.0, 35.0, -70.0, 45.0);
//! assert_eq!(index.count(&QueryRequest::bbox(atlantic_coast))?, 1);
//! # Ok::<(), featurebox::IndexError>(())
//! ```

pub mod error;
pub mod geometry;
pub mod indexer;
pub mod progress;
pub mod projection;
pub mod query;
pub mod rowcache;
pub mod store;
pub mod table;
pub mod types;

pub use error::{IndexError, Result};
pub use query::{FeatureIndex, QueryRequest, RowCursor, SpatialFilter};

pub use featurebox_types::bbox::BoundingBox;
pub use featurebox_types::envelope::GeometryEnvelope;

pub use geo::{Geometry, Point, Rect};

pub use geometry::{parse_wkt, StoredGeometry};

pub use indexer::TableIndexer;

pub use progress::{BuildProgress, ProgressToken};

pub use projection::{geodesic_envelope, CoordTransform, ProjectionBridge, SrsId};

pub use rowcache::RowCache;

pub use store::{
    EnvelopeRange, GeometryIndexEntry, IndexStore, MemoryIndexStore, TableIndexEntry,
};

pub use table::{
    ColumnValue, CompareOp, FeatureId, FeatureRow, FeatureTable, FetchRequest,
    MemoryFeatureTable, Predicate, ScanRequest,
};

pub use types::{DEFAULT_CHUNK_SIZE, DEFAULT_TOLERANCE, IndexConfig, IndexOptions, IndexStatus};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{FeatureIndex, IndexError, QueryRequest, Result, RowCursor, SpatialFilter};

    pub use crate::{BoundingBox, GeometryEnvelope};

    pub use crate::{IndexConfig, IndexOptions, IndexStatus};

    pub use crate::{FeatureTable, MemoryFeatureTable};

    pub use crate::{IndexStore, MemoryIndexStore};

    pub use crate::{BuildProgress, ProgressToken};

    pub use std::sync::Arc;
}
