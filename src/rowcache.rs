//! Single-flight row fetches.
//!
//! When several query cursors materialize the same feature row at the
//! same time, only one of them issues the underlying table fetch; the
//! rest wait on the flight and share its result. Entries live only as
//! long as the flight itself, so this never acts as a persistent cache
//! and never serves rows older than the last fetch. A failed fetch is
//! returned to the caller that issued it and nothing is published, so
//! waiters retry with their own fetch.

use crate::error::Result;
use crate::table::{FeatureId, FeatureRow};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct FlightState {
    finished: bool,
    ok: bool,
    row: Option<FeatureRow>,
}

#[derive(Default)]
struct Flight {
    state: Mutex<FlightState>,
    done: Condvar,
}

/// Deduplicates concurrent fetches of the same row id.
#[derive(Default)]
pub struct RowCache {
    flights: Mutex<FxHashMap<FeatureId, Arc<Flight>>>,
    fetches: AtomicU64,
    hits: AtomicU64,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the row for `id`, joining an in-flight fetch when one
    /// exists. Returns `Ok(None)` when the table has no such row.
    pub fn fetch_with<F>(&self, id: FeatureId, fetch: F) -> Result<Option<FeatureRow>>
    where
        F: Fn(FeatureId) -> Result<Option<FeatureRow>>,
    {
        loop {
            let existing = match self.flights.lock().entry(id) {
                Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Flight::default()));
                    None
                }
            };

            let Some(flight) = existing else {
                return self.lead(id, &fetch);
            };

            let mut state = flight.state.lock();
            while !state.finished {
                flight.done.wait(&mut state);
            }
            if state.ok {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(state.row.clone());
            }
            // The leader's fetch failed; race to issue our own.
        }
    }

    fn lead<F>(&self, id: FeatureId, fetch: &F) -> Result<Option<FeatureRow>>
    where
        F: Fn(FeatureId) -> Result<Option<FeatureRow>>,
    {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let result = fetch(id);

        // Unpublish before waking waiters, so callers arriving after
        // this point fetch fresh data instead of reading the flight.
        let flight = self
            .flights
            .lock()
            .remove(&id)
            .unwrap_or_else(|| Arc::new(Flight::default()));

        let mut state = flight.state.lock();
        state.finished = true;
        let outcome = match result {
            Ok(row) => {
                state.ok = true;
                state.row = row.clone();
                Ok(row)
            }
            Err(err) => Err(err),
        };
        drop(state);
        flight.done.notify_all();
        outcome
    }

    /// Fetches issued against the underlying table.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Calls served from another caller's flight.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
