use featurebox::{
    BoundingBox, FeatureIndex, FeatureRow, GeometryEnvelope, IndexConfig, MemoryFeatureTable,
    MemoryIndexStore, QueryRequest, StoredGeometry,
};
use std::sync::Arc;

fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
    BoundingBox::new(min_x, min_y, max_x, max_y)
}

fn fresh(table: &Arc<MemoryFeatureTable>) -> FeatureIndex<MemoryFeatureTable, MemoryIndexStore> {
    FeatureIndex::new(Arc::clone(table), Arc::new(MemoryIndexStore::new()))
}

/// Test 1: Empty table
#[test]
fn test_empty_table() {
    let table = Arc::new(MemoryFeatureTable::new("empty"));
    let index = fresh(&table);

    // An empty build still completes and marks the table indexed
    assert_eq!(index.index().unwrap(), 0);
    assert!(index.is_indexed().unwrap());
    assert_eq!(index.status().unwrap().entry_count, 0);

    let probe = QueryRequest::bbox(bbox(-180.0, -90.0, 180.0, 90.0));
    assert_eq!(index.count(&probe).unwrap(), 0);
    assert!(index.query(&probe).unwrap().into_rows().unwrap().is_empty());
}

/// Test 2: Scan tolerance bridges float error but nothing more
#[test]
fn test_scan_tolerance_padding() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 10.0, 0.0);

    // Unindexed, so every query takes the padded scan path
    let tolerance = 0.5;
    let config = IndexConfig::default().with_tolerance(tolerance);
    let index =
        FeatureIndex::with_config(Arc::clone(&table), Arc::new(MemoryIndexStore::new()), config)
            .unwrap();
    assert!(!index.is_indexed().unwrap());

    // A gap smaller than the tolerance is absorbed
    let near = QueryRequest::bbox(bbox(10.0 + 0.6 * tolerance, -1.0, 12.0, 1.0));
    assert_eq!(index.count(&near).unwrap(), 1);

    // A gap of several tolerances must never match, however large the
    // configured value
    let far = QueryRequest::bbox(bbox(10.0 + 3.0 * tolerance, -1.0, 12.0, 1.0));
    assert_eq!(index.count(&far).unwrap(), 0);

    // At the default setting the padding is invisible at any human scale
    let default_index = fresh(&table);
    let gap = QueryRequest::bbox(bbox(10.0 + 1e-9, -1.0, 12.0, 1.0));
    assert_eq!(default_index.count(&gap).unwrap(), 0);
    let touch = QueryRequest::bbox(bbox(10.0, -1.0, 12.0, 1.0));
    assert_eq!(default_index.count(&touch).unwrap(), 1);
}

/// Test 3: Edge and corner touches are matches on both paths
#[test]
fn test_boundary_touch_inclusive() {
    let table = Arc::new(MemoryFeatureTable::new("parcels"));
    table.insert_row(FeatureRow::with_geometry(
        1,
        StoredGeometry::from_wkt("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))"),
    ));

    let indexed = fresh(&table);
    indexed.index().unwrap();
    let manual = fresh(&table);

    let corner = QueryRequest::bbox(bbox(4.0, 4.0, 6.0, 6.0));
    let edge = QueryRequest::bbox(bbox(4.0, 1.0, 6.0, 3.0));
    let past = QueryRequest::bbox(bbox(4.0 + 1e-9, 1.0, 6.0, 3.0));

    for index in [&indexed, &manual] {
        assert_eq!(index.count(&corner).unwrap(), 1);
        assert_eq!(index.count(&edge).unwrap(), 1);
        assert_eq!(index.count(&past).unwrap(), 0);
    }
}

/// Test 4: Degenerate geometry and zero-area query box
#[test]
fn test_degenerate_point_and_box() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 3.0, 3.0);

    let indexed = fresh(&table);
    indexed.index().unwrap();
    let manual = fresh(&table);

    let pin = QueryRequest::bbox(bbox(3.0, 3.0, 3.0, 3.0));
    assert_eq!(indexed.count(&pin).unwrap(), 1);
    assert_eq!(manual.count(&pin).unwrap(), 1);

    let miss = QueryRequest::bbox(bbox(3.1, 3.1, 3.1, 3.1));
    assert_eq!(indexed.count(&miss).unwrap(), 0);
    assert_eq!(manual.count(&miss).unwrap(), 0);
}

/// Test 5: Rows without geometry match no spatial filter
#[test]
fn test_null_geometry_rows() {
    let table = Arc::new(MemoryFeatureTable::new("mixed"));
    table.insert_point(1, 1.0, 1.0);
    table.insert_row(FeatureRow::new(2));
    table.insert_point(3, 3.0, 3.0);

    let indexed = fresh(&table);
    assert_eq!(indexed.index().unwrap(), 2);
    let manual = fresh(&table);

    let everywhere = QueryRequest::bbox(bbox(-10.0, -10.0, 10.0, 10.0));
    assert_eq!(indexed.count(&everywhere).unwrap(), 2);
    assert_eq!(manual.count(&everywhere).unwrap(), 2);

    // Without a spatial filter the geometry-less row is an ordinary row
    assert_eq!(indexed.count(&QueryRequest::all()).unwrap(), 3);
    assert_eq!(manual.count(&QueryRequest::all()).unwrap(), 3);
}

/// Test 6: Unreadable geometry is skipped, not fatal
#[test]
fn test_unparseable_geometry_skipped() {
    let table = Arc::new(MemoryFeatureTable::new("dirty"));
    table.insert_point(1, 1.0, 1.0);
    table.insert_row(FeatureRow::with_geometry(
        2,
        StoredGeometry::from_wkt("POINT(2 nowhere"),
    ));
    table.insert_point(3, 3.0, 3.0);

    let indexed = fresh(&table);
    assert_eq!(indexed.index().unwrap(), 2);
    let manual = fresh(&table);

    let everywhere = QueryRequest::bbox(bbox(-10.0, -10.0, 10.0, 10.0));
    assert_eq!(indexed.count(&everywhere).unwrap(), 2);
    assert_eq!(manual.count(&everywhere).unwrap(), 2);
}

/// Test 7: Index maintenance on a table that was never indexed
#[test]
fn test_maintenance_without_index() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 1.0, 1.0);
    let index = fresh(&table);

    assert_eq!(index.delete_index().unwrap(), 0);
    assert!(!index.delete_row(1).unwrap());
    assert!(!index.is_indexed().unwrap());
}

/// Test 8: Refreshing a row that does not exist clears its entry
#[test]
fn test_index_row_for_missing_row() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 1.0, 1.0);
    let index = fresh(&table);
    index.index().unwrap();

    assert!(!index.index_row(99).unwrap());
    assert_eq!(index.status().unwrap().entry_count, 1);

    table.remove_row(1);
    assert!(!index.index_row(1).unwrap());
    assert_eq!(index.status().unwrap().entry_count, 0);
    assert!(index.is_indexed().unwrap());
}

/// Test 9: Limit zero yields an empty result on both paths
#[test]
fn test_limit_zero() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 1.0, 1.0);
    table.insert_point(2, 2.0, 2.0);

    let indexed = fresh(&table);
    indexed.index().unwrap();
    let manual = fresh(&table);

    let nothing = QueryRequest::bbox(bbox(0.0, 0.0, 5.0, 5.0)).with_limit(0);
    assert!(indexed.query(&nothing).unwrap().into_rows().unwrap().is_empty());
    assert!(manual.query(&nothing).unwrap().into_rows().unwrap().is_empty());
}

/// Test 10: Wrapped antimeridian query in geodesic mode
#[test]
fn test_antimeridian_wrapped_query() {
    let table = Arc::new(MemoryFeatureTable::new("islands"));
    table.insert_point(1, 179.0, 0.0);
    table.insert_point(2, -179.0, 0.0);
    table.insert_point(3, 0.0, 0.0);

    let config = IndexConfig::default().with_geodesic(true);
    let geodesic =
        FeatureIndex::with_config(Arc::clone(&table), Arc::new(MemoryIndexStore::new()), config)
            .unwrap();
    geodesic.index().unwrap();

    // min_x > max_x marks a box crossing the antimeridian; the geodesic
    // envelope widens it to the full longitude span
    let wrapped = QueryRequest::envelope(GeometryEnvelope::new(170.0, -10.0, -170.0, 10.0));
    assert_eq!(geodesic.count(&wrapped).unwrap(), 3);

    // A planar build treats the inverted range as unsatisfiable
    let planar = fresh(&table);
    planar.index().unwrap();
    assert_eq!(planar.count(&wrapped).unwrap(), 0);
}

/// Test 11: Chunk size larger than the table
#[test]
fn test_oversized_chunk() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    for id in 1..=7 {
        table.insert_point(id, id as f64, 0.0);
    }
    let config = IndexConfig::default().with_chunk_size(100_000);
    let index =
        FeatureIndex::with_config(Arc::clone(&table), Arc::new(MemoryIndexStore::new()), config)
            .unwrap();

    assert_eq!(index.index().unwrap(), 7);
    assert_eq!(table.scan_reads(), 1);
    assert!(index.is_indexed().unwrap());
}

/// Test 12: Stale index entries for rows deleted behind the engine's back
#[test]
fn test_stale_entries_do_not_resurrect_rows() {
    let table = Arc::new(MemoryFeatureTable::new("points"));
    table.insert_point(1, 1.0, 1.0);
    table.insert_point(2, 2.0, 2.0);
    table.insert_point(3, 3.0, 3.0);
    let index = fresh(&table);
    index.index().unwrap();

    // Row 2 disappears without the caller telling the index
    table.remove_row(2);

    let everywhere = QueryRequest::bbox(bbox(0.0, 0.0, 5.0, 5.0));
    let ids: Vec<_> = index
        .query(&everywhere)
        .unwrap()
        .map(|row| row.unwrap().id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(index.count(&everywhere).unwrap(), 2);

    // The stale entry is still visible at the id level until maintenance
    assert_eq!(index.status().unwrap().entry_count, 3);
}
