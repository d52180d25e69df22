//! Chunked manual-scan fallback.
//!
//! Used whenever a table has no completed index. Walks the table in
//! bounded chunks, computes each row's envelope, and tests it against
//! the query rectangle padded by the configured tolerance so that a
//! reprojected box differing from the stored geometry by float
//! round-trip error still matches. Results come back in id order, like
//! the indexed path. Matches are rediscovered from the start of the
//! table on every call, which is what makes offset pagination O(n) per
//! page here.

use super::{window, FeatureIndex, QueryRequest, RowCursor};
use crate::error::Result;
use crate::projection::geodesic_envelope;
use crate::store::IndexStore;
use crate::table::{FeatureId, FeatureRow, FeatureTable, Predicate, ScanRequest};
use featurebox_types::envelope::GeometryEnvelope;

impl<T: FeatureTable + 'static, S: IndexStore> FeatureIndex<T, S> {
    pub(super) fn scan_query(
        &self,
        envelope: Option<&GeometryEnvelope>,
        request: &QueryRequest,
    ) -> Result<RowCursor> {
        if request.is_plain() {
            return Ok(RowCursor::from_rows(self.scan_window(envelope, request)?));
        }

        // Shaped requests go back through the row store so distinct,
        // projection, and ordering behave exactly as on the indexed
        // path.
        let ids = self.scan_ids(envelope, request.predicate.as_ref())?;
        let rows = self.table.fetch_by_ids(&ids, &request.fetch_request())?;
        Ok(RowCursor::from_rows(window(
            rows,
            request.offset,
            request.limit,
        )))
    }

    pub(super) fn scan_count(
        &self,
        envelope: Option<&GeometryEnvelope>,
        predicate: Option<&Predicate>,
    ) -> Result<u64> {
        Ok(self.scan_ids(envelope, predicate)?.len() as u64)
    }

    /// Stream matches in id order, skipping `offset` of them and
    /// stopping once `limit` rows are collected.
    fn scan_window(
        &self,
        envelope: Option<&GeometryEnvelope>,
        request: &QueryRequest,
    ) -> Result<Vec<FeatureRow>> {
        if request.limit == Some(0) {
            return Ok(Vec::new());
        }
        let padded = envelope.map(|envelope| envelope.expand(self.config.tolerance));
        let predicate = request.predicate.as_ref();
        let mut to_skip = request.offset;
        let mut out = Vec::new();

        self.scan_rows(padded.as_ref(), predicate, |row| {
            if to_skip > 0 {
                to_skip -= 1;
                return true;
            }
            out.push(row);
            request.limit.is_none_or(|limit| out.len() < limit)
        })?;
        Ok(out)
    }

    /// All matching ids, in ascending order.
    fn scan_ids(
        &self,
        envelope: Option<&GeometryEnvelope>,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<FeatureId>> {
        let padded = envelope.map(|envelope| envelope.expand(self.config.tolerance));
        let mut ids = Vec::new();
        self.scan_rows(padded.as_ref(), predicate, |row| {
            ids.push(row.id);
            true
        })?;
        Ok(ids)
    }

    /// Chunked walk over the table, handing matching rows to `visit`
    /// until it returns false or the table is exhausted.
    fn scan_rows(
        &self,
        padded: Option<&GeometryEnvelope>,
        predicate: Option<&Predicate>,
        mut visit: impl FnMut(FeatureRow) -> bool,
    ) -> Result<()> {
        let chunk_size = self.config.chunk_size;
        let mut offset = 0;

        loop {
            let rows = self
                .table
                .chunked_scan(&ScanRequest::chunk(chunk_size, offset))?;
            let scanned = rows.len();
            for row in rows {
                if !self.row_matches(&row, padded, predicate) {
                    continue;
                }
                if !visit(row) {
                    return Ok(());
                }
            }
            offset += scanned;
            if scanned < chunk_size {
                return Ok(());
            }
        }
    }

    fn row_matches(
        &self,
        row: &FeatureRow,
        padded: Option<&GeometryEnvelope>,
        predicate: Option<&Predicate>,
    ) -> bool {
        if let Some(query) = padded {
            let envelope = match row.envelope() {
                Ok(Some(envelope)) => envelope,
                Ok(None) => return false,
                Err(err) => {
                    log::warn!(
                        "skipping row {} of table '{}': {err}",
                        row.id,
                        self.table.table_name()
                    );
                    return false;
                }
            };
            let envelope = if self.config.geodesic {
                geodesic_envelope(&envelope)
            } else {
                envelope
            };
            if !query.intersects(&envelope) {
                return false;
            }
        }
        predicate.is_none_or(|predicate| predicate.matches(row))
    }
}
