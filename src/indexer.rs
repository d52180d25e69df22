//! Chunked index builds and per-row index maintenance.
//!
//! A build walks the feature table in id order, one chunk per store
//! transaction, so a crash or cancellation loses at most the chunk in
//! progress. The table entry is written up front with a null timestamp
//! and only stamped once the final short chunk has been committed, so
//! an interrupted build is never reported as complete. Rows whose
//! geometry cannot be read are logged and skipped rather than failing
//! the build; storage errors are fatal.

use crate::error::Result;
use crate::projection::geodesic_envelope;
use crate::progress::ProgressToken;
use crate::store::{GeometryIndexEntry, IndexStore, TableIndexEntry};
use crate::table::{FeatureId, FeatureRow, FeatureTable, ScanRequest};
use crate::types::{IndexConfig, IndexOptions, IndexStatus};
use std::sync::Arc;
use std::time::SystemTime;

/// Builds and maintains the index of one feature table.
pub struct TableIndexer<T, S> {
    table: Arc<T>,
    store: Arc<S>,
    config: IndexConfig,
}

impl<T: FeatureTable, S: IndexStore> TableIndexer<T, S> {
    pub fn new(table: Arc<T>, store: Arc<S>, config: IndexConfig) -> Self {
        Self {
            table,
            store,
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Index the table if it is not indexed yet.
    ///
    /// Returns the number of rows indexed, 0 when the table was already
    /// indexed and nothing was done.
    pub fn index(&self) -> Result<u64> {
        self.index_with(&IndexOptions::default())
    }

    /// Index the table, honoring a force flag and a progress token.
    ///
    /// Cancellation through the token stops the build at the next row
    /// boundary: chunks committed so far stay in the store, the chunk
    /// in progress is dropped, and the table keeps its null timestamp.
    pub fn index_with(&self, options: &IndexOptions) -> Result<u64> {
        let name = self.table.table_name();
        if !options.force && self.is_indexed()? {
            log::debug!("table '{name}' is already indexed");
            return Ok(0);
        }

        // Null-timestamp entry first, so per-row maintenance can
        // reference it while the build runs.
        self.store
            .upsert_table(&TableIndexEntry::new(name, self.table.geometry_column()))?;
        if options.force {
            self.store.clear_geometries(name)?;
        }

        let progress = options.progress.as_deref();
        let chunk_size = self.config.chunk_size;
        let mut offset = 0;
        let mut total = 0u64;

        loop {
            if !active(progress) {
                log::info!("index build for table '{name}' cancelled after {total} rows");
                return Ok(total);
            }

            let rows = self.table.chunked_scan(&ScanRequest::chunk(chunk_size, offset))?;
            let scanned = rows.len();

            let mut entries = Vec::with_capacity(scanned);
            for row in &rows {
                if !active(progress) {
                    log::info!("index build for table '{name}' cancelled after {total} rows");
                    return Ok(total);
                }
                match self.row_entry(row) {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("skipping row {} of table '{name}': {err}", row.id);
                    }
                }
                if let Some(progress) = progress {
                    progress.add_progress(1);
                }
            }

            if !entries.is_empty() {
                self.store.upsert_geometries(name, &entries)?;
                total += entries.len() as u64;
            }
            offset += scanned;

            // A short chunk means the scan is exhausted.
            if scanned < chunk_size {
                break;
            }
        }

        self.store.touch_table(name, SystemTime::now())?;
        log::info!("indexed {total} rows of table '{name}'");
        Ok(total)
    }

    /// Refresh the index entry of one row after an insert or update.
    ///
    /// A row that is missing, has a null geometry, or fails to parse is
    /// treated as unindexable and its entry is removed. Returns whether
    /// the row is indexed afterwards. Always refreshes the table's
    /// timestamp.
    pub fn index_row(&self, id: FeatureId) -> Result<bool> {
        let name = self.table.table_name();
        if self.store.table_entry(name)?.is_none() {
            self.store
                .upsert_table(&TableIndexEntry::new(name, self.table.geometry_column()))?;
        }

        let entry = match self.table.fetch_by_id(id)? {
            Some(row) => match self.row_entry(&row) {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("treating row {id} of table '{name}' as unindexable: {err}");
                    None
                }
            },
            None => None,
        };

        let indexed = match entry {
            Some(entry) => {
                self.store
                    .upsert_geometries(name, std::slice::from_ref(&entry))?;
                true
            }
            None => {
                self.store.delete_geometry(name, id)?;
                false
            }
        };
        self.store.touch_table(name, SystemTime::now())?;
        Ok(indexed)
    }

    /// Remove one row's index entry after the row is deleted.
    /// Returns whether an entry existed.
    pub fn delete_row(&self, id: FeatureId) -> Result<bool> {
        self.store.delete_geometry(self.table.table_name(), id)
    }

    /// Remove the table's index completely, returning the number of
    /// geometry entries removed. Safe to call whether or not the table
    /// is indexed.
    pub fn delete_index(&self) -> Result<u64> {
        let name = self.table.table_name();
        let removed = self.store.clear_geometries(name)?;
        self.store.delete_table(name)?;
        Ok(removed)
    }

    /// Whether the table has a completed index.
    pub fn is_indexed(&self) -> Result<bool> {
        Ok(self.last_indexed()?.is_some())
    }

    /// When the index was last built or refreshed. None while a first
    /// build is still running or after it was cancelled.
    pub fn last_indexed(&self) -> Result<Option<SystemTime>> {
        Ok(self
            .store
            .table_entry(self.table.table_name())?
            .and_then(|entry| entry.last_indexed))
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let name = self.table.table_name();
        let last_indexed = self
            .store
            .table_entry(name)?
            .and_then(|entry| entry.last_indexed);
        Ok(IndexStatus {
            indexed: last_indexed.is_some(),
            last_indexed,
            entry_count: self.store.geometry_count(name)?,
        })
    }

    fn row_entry(&self, row: &FeatureRow) -> Result<Option<GeometryIndexEntry>> {
        let Some(envelope) = row.envelope()? else {
            return Ok(None);
        };
        let envelope = if self.config.geodesic {
            geodesic_envelope(&envelope)
        } else {
            envelope
        };
        Ok(Some(GeometryIndexEntry::from_envelope(row.id, &envelope)))
    }
}

fn active(progress: Option<&dyn ProgressToken>) -> bool {
    progress.is_none_or(|progress| progress.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::StoredGeometry;
    use crate::progress::BuildProgress;
    use crate::store::MemoryIndexStore;
    use crate::table::MemoryFeatureTable;

    fn grid_table(rows: i64) -> Arc<MemoryFeatureTable> {
        let table = MemoryFeatureTable::new("features");
        for id in 1..=rows {
            table.insert_point(id, (id % 50) as f64, (id / 50) as f64);
        }
        Arc::new(table)
    }

    fn make_indexer(
        table: &Arc<MemoryFeatureTable>,
        config: IndexConfig,
    ) -> (TableIndexer<MemoryFeatureTable, MemoryIndexStore>, Arc<MemoryIndexStore>) {
        let store = Arc::new(MemoryIndexStore::new());
        (
            TableIndexer::new(Arc::clone(table), Arc::clone(&store), config),
            store,
        )
    }

    #[test]
    fn test_build_indexes_all_rows() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());

        assert!(!indexer.is_indexed()?);
        assert_eq!(indexer.index()?, 5);
        assert!(indexer.is_indexed()?);
        assert!(indexer.last_indexed()?.is_some());

        let status = indexer.status()?;
        assert!(status.indexed);
        assert_eq!(status.entry_count, 5);
        assert_eq!(store.geometry_count("features")?, 5);
        Ok(())
    }

    #[test]
    fn test_empty_table_indexes_clean() -> Result<()> {
        let table = Arc::new(MemoryFeatureTable::new("empty"));
        let (indexer, _) = make_indexer(&table, IndexConfig::default());

        assert_eq!(indexer.index()?, 0);
        assert!(indexer.is_indexed()?);
        assert_eq!(indexer.status()?.entry_count, 0);
        Ok(())
    }

    #[test]
    fn test_reindex_is_noop_without_force() -> Result<()> {
        let table = grid_table(5);
        let (indexer, _) = make_indexer(&table, IndexConfig::default());

        indexer.index()?;
        let reads = table.scan_reads();
        assert_eq!(indexer.index()?, 0);
        assert_eq!(table.scan_reads(), reads);
        Ok(())
    }

    #[test]
    fn test_force_rebuild_reproduces_bounds() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());

        indexer.index()?;
        let before = store.geometry("features", 3)?.unwrap();

        let rebuilt = indexer.index_with(&IndexOptions::force())?;
        assert_eq!(rebuilt, 5);
        assert_eq!(store.geometry("features", 3)?.unwrap(), before);
        assert_eq!(store.geometry_count("features")?, 5);
        Ok(())
    }

    #[test]
    fn test_chunked_build_reads_three_chunks() -> Result<()> {
        let table = grid_table(2500);
        let (indexer, store) = make_indexer(&table, IndexConfig::default().with_chunk_size(1000));

        assert_eq!(indexer.index()?, 2500);
        assert_eq!(table.scan_reads(), 3);
        assert_eq!(store.geometry_count("features")?, 2500);
        assert_eq!(store.upsert_batches(), 3);
        Ok(())
    }

    #[test]
    fn test_exact_multiple_sees_empty_final_chunk() -> Result<()> {
        let table = grid_table(2000);
        let (indexer, _) = make_indexer(&table, IndexConfig::default().with_chunk_size(1000));

        assert_eq!(indexer.index()?, 2000);
        assert_eq!(table.scan_reads(), 3);
        assert!(indexer.is_indexed()?);
        Ok(())
    }

    #[test]
    fn test_cancel_keeps_committed_chunks_only() -> Result<()> {
        let table = grid_table(2500);
        let (indexer, store) = make_indexer(&table, IndexConfig::default().with_chunk_size(1000));

        let progress = Arc::new(BuildProgress::with_limit(1000));
        let options = IndexOptions::default().with_progress(progress.clone());
        assert_eq!(indexer.index_with(&options)?, 1000);

        assert_eq!(progress.completed(), 1000);
        assert_eq!(store.geometry_count("features")?, 1000);
        assert_eq!(store.upsert_batches(), 1);
        assert!(!indexer.is_indexed()?);
        assert!(indexer.last_indexed()?.is_none());
        // The cancelled build still leaves the table entry behind.
        assert!(store.table_entry("features")?.is_some());
        Ok(())
    }

    #[test]
    fn test_null_and_unparseable_geometries_skipped() -> Result<()> {
        let table = Arc::new(MemoryFeatureTable::new("features"));
        table.insert_point(1, 0.0, 0.0);
        table.insert_row(FeatureRow::new(2));
        table.insert_row(FeatureRow::with_geometry(
            3,
            StoredGeometry::from_wkt("POINT(bogus"),
        ));
        table.insert_point(4, 4.0, 4.0);

        let (indexer, store) = make_indexer(&table, IndexConfig::default());
        assert_eq!(indexer.index()?, 2);
        assert_eq!(store.geometry_count("features")?, 2);
        assert!(store.geometry("features", 2)?.is_none());
        assert!(store.geometry("features", 3)?.is_none());
        assert!(indexer.is_indexed()?);
        Ok(())
    }

    #[test]
    fn test_index_row_updates_and_deletes() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());
        indexer.index()?;
        let built_at = indexer.last_indexed()?.unwrap();

        table.set_geometry(3, Some(StoredGeometry::point(100.0, 100.0)));
        assert!(indexer.index_row(3)?);
        let moved = store.geometry("features", 3)?.unwrap();
        assert_eq!(moved.min_x, 100.0);
        assert_eq!(moved.max_y, 100.0);

        table.set_geometry(3, None);
        assert!(!indexer.index_row(3)?);
        assert!(store.geometry("features", 3)?.is_none());

        // Removing one row's entry does not unindex the table.
        assert!(indexer.is_indexed()?);
        assert!(indexer.last_indexed()?.unwrap() >= built_at);
        Ok(())
    }

    #[test]
    fn test_index_row_without_prior_build() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());

        assert!(indexer.index_row(2)?);
        assert_eq!(store.geometry_count("features")?, 1);
        assert!(store.table_entry("features")?.is_some());
        Ok(())
    }

    #[test]
    fn test_index_row_missing_row_clears_entry() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());
        indexer.index()?;

        table.remove_row(4);
        assert!(!indexer.index_row(4)?);
        assert!(store.geometry("features", 4)?.is_none());
        assert_eq!(store.geometry_count("features")?, 4);
        Ok(())
    }

    #[test]
    fn test_delete_row_removes_entry_only() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());
        indexer.index()?;

        assert!(indexer.delete_row(2)?);
        assert!(!indexer.delete_row(2)?);
        assert_eq!(store.geometry_count("features")?, 4);
        assert!(indexer.is_indexed()?);
        Ok(())
    }

    #[test]
    fn test_delete_index_removes_everything() -> Result<()> {
        let table = grid_table(5);
        let (indexer, store) = make_indexer(&table, IndexConfig::default());
        indexer.index()?;

        assert_eq!(indexer.delete_index()?, 5);
        assert!(!indexer.is_indexed()?);
        assert!(store.table_entry("features")?.is_none());

        // Deleting an index that does not exist is fine.
        assert_eq!(indexer.delete_index()?, 0);
        Ok(())
    }

    #[test]
    fn test_geodesic_build_widens_envelopes() -> Result<()> {
        let table = Arc::new(MemoryFeatureTable::new("features"));
        table.insert_row(FeatureRow::with_geometry(
            1,
            StoredGeometry::from_wkt("LINESTRING(-60 50, 60 50)"),
        ));

        let (flat, flat_store) = make_indexer(&table, IndexConfig::default());
        flat.index()?;
        let flat_entry = flat_store.geometry("features", 1)?.unwrap();
        assert_eq!(flat_entry.max_y, 50.0);

        let (geodesic, geodesic_store) = make_indexer(&table, IndexConfig::default().with_geodesic(true));
        geodesic.index()?;
        let geodesic_entry = geodesic_store.geometry("features", 1)?.unwrap();
        assert!(geodesic_entry.max_y > 50.0);
        assert!(geodesic_entry.max_y < 90.0);
        Ok(())
    }
}
