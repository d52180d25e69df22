//! Indexed query path.
//!
//! Turns the resolved query envelope into a set of candidate feature
//! ids through the index store's range predicate, then materializes or
//! counts rows through the generic row store. Query and count share the
//! id-set construction, so the two are always consistent for the same
//! filter and predicate.

use super::{window, FeatureIndex, QueryRequest, RowCursor};
use crate::error::Result;
use crate::store::{EnvelopeRange, IndexStore};
use crate::table::{FeatureId, FeatureTable, Predicate};
use featurebox_types::envelope::GeometryEnvelope;
use std::sync::Arc;

impl<T: FeatureTable + 'static, S: IndexStore> FeatureIndex<T, S> {
    /// Candidate ids whose stored envelope intersects the query
    /// envelope, in ascending order.
    fn candidate_ids(&self, envelope: &GeometryEnvelope) -> Result<Vec<FeatureId>> {
        self.store.ids_in_range(
            self.table.table_name(),
            &EnvelopeRange::from_envelope(envelope),
        )
    }

    pub(super) fn indexed_query(
        &self,
        envelope: &GeometryEnvelope,
        request: &QueryRequest,
    ) -> Result<RowCursor> {
        let ids = self.candidate_ids(envelope)?;

        if request.is_plain() {
            // Materialize lazily as the caller advances, one row per
            // candidate id, deduplicating fetches across concurrent
            // cursors.
            let table = Arc::clone(&self.table);
            let cache = Arc::clone(&self.cache);
            let fetch = Box::new(move |id: FeatureId| {
                cache.fetch_with(id, |id| table.fetch_by_id(id))
            });
            return Ok(RowCursor::lazy(
                ids,
                fetch,
                request.predicate.clone(),
                request.offset,
                request.limit,
            ));
        }

        let rows = self.table.fetch_by_ids(&ids, &request.fetch_request())?;
        Ok(RowCursor::from_rows(window(
            rows,
            request.offset,
            request.limit,
        )))
    }

    pub(super) fn indexed_count(
        &self,
        envelope: &GeometryEnvelope,
        predicate: Option<&Predicate>,
    ) -> Result<u64> {
        let ids = self.candidate_ids(envelope)?;
        self.table.count_by_ids(&ids, predicate)
    }
}
