#![forbid(unsafe_code)]

//! Bounded history of recent queries.
//!
//! Newest first, at most [`HISTORY_CAPACITY`] entries. Entries are frozen
//! snapshots; the ledger only prepends, evicts from the back, or clears.
//! The persisted form is a JSON array in the same order.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::TripParameters;

/// Storage key of the persisted ledger.
pub const HISTORY_KEY: &str = "transitHistory";
/// Maximum number of retained entries.
pub const HISTORY_CAPACITY: usize = 10;

/// A past query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub params: TripParameters,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(params: TripParameters, timestamp: DateTime<Utc>) -> Self {
        Self { params, timestamp }
    }

    /// Stamp `params` with the current time.
    #[must_use]
    pub fn now(params: TripParameters) -> Self {
        Self::new(params, Utc::now())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `entry`, evicting the oldest beyond capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Snapshot stored at `index` (0 = newest).
    #[must_use]
    pub fn select(&self, index: usize) -> Option<TripParameters> {
        self.entries.get(index).map(|e| e.params.clone())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a JSON array, newest first.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.entries)
    }

    /// Decode a persisted ledger.
    ///
    /// Anything that is not an array of entries yields an empty ledger. An
    /// over-long array is cut to capacity.
    #[must_use]
    pub fn from_json(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<VecDeque<HistoryEntry>>(bytes) {
            Ok(mut entries) => {
                entries.truncate(HISTORY_CAPACITY);
                Self { entries }
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted history is malformed, starting empty");
                Self::default()
            }
        }
    }
}
