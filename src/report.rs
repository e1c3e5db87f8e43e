//! Sorting and text rendering of profiling results

use crate::identity::FunctionIdentity;
use crate::stats::StatRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of sortable columns
pub const SORT_COLUMNS: usize = 5;

/// Sort ordinal outside `0..SORT_COLUMNS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("only {} columns can be sorted on (0-{}), got {index}", SORT_COLUMNS, SORT_COLUMNS - 1)]
pub struct SortRangeError {
    pub index: usize,
}

/// Metric to sort the report by (descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Calls,
    TotalTime,
    CumulativeTime,
    MinTime,
    MaxTime,
}

impl SortColumn {
    pub const ALL: [SortColumn; SORT_COLUMNS] = [
        SortColumn::Calls,
        SortColumn::TotalTime,
        SortColumn::CumulativeTime,
        SortColumn::MinTime,
        SortColumn::MaxTime,
    ];

    /// Map an ordinal (0 = calls ... 4 = max time) to a column
    pub fn from_index(index: usize) -> Result<Self, SortRangeError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(SortRangeError { index })
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            SortColumn::Calls => "calls",
            SortColumn::TotalTime => "total_time",
            SortColumn::CumulativeTime => "cumulative_time",
            SortColumn::MinTime => "min_time",
            SortColumn::MaxTime => "max_time",
        }
    }
}

impl TryFrom<usize> for SortColumn {
    type Error = SortRangeError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::from_index(index)
    }
}

/// Sort rows in non-increasing order of `column`
///
/// Stable, so rows with equal metrics keep insertion order.
pub fn sort_records(rows: &mut [(FunctionIdentity, StatRecord)], column: SortColumn) {
    rows.sort_by(|a, b| b.1.metric(column).total_cmp(&a.1.metric(column)));
}

/// Rows ready for output: insertion order, or sorted when a column is given
pub fn ordered(
    mut rows: Vec<(FunctionIdentity, StatRecord)>,
    column: Option<SortColumn>,
) -> Vec<(FunctionIdentity, StatRecord)> {
    if let Some(column) = column {
        sort_records(&mut rows, column);
    }
    rows
}

/// Finite time for display; unset min/max print as zero
fn shown(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Render the fixed-width results table
pub fn render_table(rows: &[(FunctionIdentity, StatRecord)]) -> String {
    let mut out = String::from("\nProfiling Results:\n");

    out.push_str(&format!(
        "{:<10}{:<15}{:<20}{:<15}{:<15}{:<15}{:<50}\n",
        "Calls", "Total Time", "Cumulative Time", "Min Time", "Max Time", "Avg Time", "Function"
    ));
    out.push_str(&"-".repeat(180));
    out.push('\n');

    for (id, stat) in rows {
        out.push_str(&format!(
            "{:<10}{:<15.6}{:<20.6}{:<15.6}{:<15.6}{:<15.6}{:<50}\n",
            stat.call_count,
            stat.total_time,
            stat.cumulative_time,
            shown(stat.min_time),
            shown(stat.max_time),
            stat.avg_time(),
            id.to_string()
        ));
    }

    out
}
