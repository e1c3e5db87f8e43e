//! Per-function call statistics
//!
//! The store maps each [`FunctionIdentity`] to a [`StatCell`] of atomic
//! counters. Cells are created lazily on first observation and are never
//! removed. Updates are lock-free once a cell exists, so one store can be
//! shared by every thread of a profiled program.

use crate::identity::FunctionIdentity;
use crate::report::SortColumn;
use fnv::FnvHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn seconds(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

/// Live, atomically-updated statistics for one function
#[derive(Debug)]
pub struct StatCell {
    call_count: AtomicU64,
    total_nanos: AtomicU64,
    cumulative_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl Default for StatCell {
    fn default() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            cumulative_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }
}

impl StatCell {
    /// Record one completed invocation
    pub fn record_call(&self, elapsed: Duration) {
        let elapsed = nanos(elapsed);
        self.total_nanos.fetch_add(elapsed, Ordering::Relaxed);
        self.min_nanos.fetch_min(elapsed, Ordering::Relaxed);
        self.max_nanos.fetch_max(elapsed, Ordering::Relaxed);
        // Published last so a reader that sees the count also sees min/max
        self.call_count.fetch_add(1, Ordering::Release);
    }

    /// Attribute time spent in a descendant call
    pub fn add_cumulative(&self, elapsed: Duration) {
        self.cumulative_nanos
            .fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    /// Copy the current values into a [`StatRecord`]
    pub fn snapshot(&self) -> StatRecord {
        let call_count = self.call_count.load(Ordering::Acquire);
        let (min_time, max_time) = if call_count == 0 {
            (f64::INFINITY, f64::NEG_INFINITY)
        } else {
            (
                seconds(self.min_nanos.load(Ordering::Relaxed)),
                seconds(self.max_nanos.load(Ordering::Relaxed)),
            )
        };

        StatRecord {
            call_count,
            total_time: seconds(self.total_nanos.load(Ordering::Relaxed)),
            cumulative_time: seconds(self.cumulative_nanos.load(Ordering::Relaxed)),
            min_time,
            max_time,
        }
    }
}

/// Point-in-time statistics for one function (times in seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatRecord {
    /// Completed invocations
    pub call_count: u64,
    /// Inclusive wall time across all invocations
    pub total_time: f64,
    /// Time attributed while this function was an active ancestor
    pub cumulative_time: f64,
    /// Shortest single invocation (`+inf` until the first call)
    pub min_time: f64,
    /// Longest single invocation (`-inf` until the first call)
    pub max_time: f64,
}

impl Default for StatRecord {
    fn default() -> Self {
        Self {
            call_count: 0,
            total_time: 0.0,
            cumulative_time: 0.0,
            min_time: f64::INFINITY,
            max_time: f64::NEG_INFINITY,
        }
    }
}

impl StatRecord {
    /// Average inclusive time per call, 0 when never called
    pub fn avg_time(&self) -> f64 {
        if self.call_count > 0 {
            self.total_time / self.call_count as f64
        } else {
            0.0
        }
    }

    /// Value of the given sort column
    pub fn metric(&self, column: SortColumn) -> f64 {
        match column {
            SortColumn::Calls => self.call_count as f64,
            SortColumn::TotalTime => self.total_time,
            SortColumn::CumulativeTime => self.cumulative_time,
            SortColumn::MinTime => self.min_time,
            SortColumn::MaxTime => self.max_time,
        }
    }

    /// Min time, or `None` when no call has completed
    pub fn observed_min(&self) -> Option<f64> {
        (self.call_count > 0).then_some(self.min_time)
    }

    /// Max time, or `None` when no call has completed
    pub fn observed_max(&self) -> Option<f64> {
        (self.call_count > 0).then_some(self.max_time)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    index: FnvHashMap<FunctionIdentity, usize>,
    cells: Vec<(FunctionIdentity, Arc<StatCell>)>,
}

/// Tracks statistics for every observed function
#[derive(Debug, Default)]
pub struct StatsStore {
    inner: RwLock<StoreInner>,
}

impl StatsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cell for `id`, creating a zeroed one on first use
    pub fn get_or_create(&self, id: &FunctionIdentity) -> Arc<StatCell> {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&slot) = inner.index.get(id) {
                return Arc::clone(&inner.cells[slot].1);
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have inserted between the two locks
        if let Some(&slot) = inner.index.get(id) {
            return Arc::clone(&inner.cells[slot].1);
        }
        let cell = Arc::new(StatCell::default());
        let slot = inner.cells.len();
        inner.cells.push((id.clone(), Arc::clone(&cell)));
        inner.index.insert(id.clone(), slot);
        cell
    }

    /// Statistics for `id`, if it was ever observed
    pub fn get(&self, id: &FunctionIdentity) -> Option<StatRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(id)
            .map(|&slot| inner.cells[slot].1.snapshot())
    }

    /// Look up statistics by function name
    ///
    /// Returns the first bucket in insertion order whose identity has this name.
    pub fn find_by_name(&self, name: &str) -> Option<(FunctionIdentity, StatRecord)> {
        self.snapshot()
            .into_iter()
            .find(|(id, _)| id.name() == name)
    }

    /// Read-only copy of all records in insertion order
    pub fn snapshot(&self) -> Vec<(FunctionIdentity, StatRecord)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .cells
            .iter()
            .map(|(id, cell)| (id.clone(), cell.snapshot()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cells
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
