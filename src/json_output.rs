//! JSON output format for profiling results
//!
//! --format json implementation

use crate::identity::FunctionIdentity;
use crate::report::SortColumn;
use crate::stats::StatRecord;
use serde::{Deserialize, Serialize};

/// Statistics for one function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFunction {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub call_count: u64,
    /// Inclusive time in seconds
    pub total_time: f64,
    pub cumulative_time: f64,
    /// Absent until the function completed at least once
    pub min_time: Option<f64>,
    pub max_time: Option<f64>,
    pub avg_time: f64,
}

impl JsonFunction {
    pub fn new(id: &FunctionIdentity, stat: &StatRecord) -> Self {
        Self {
            name: id.name().to_string(),
            file: id.file().to_string(),
            line: id.line(),
            call_count: stat.call_count,
            total_time: stat.total_time,
            cumulative_time: stat.cumulative_time,
            min_time: stat.observed_min(),
            max_time: stat.observed_max(),
            avg_time: stat.avg_time(),
        }
    }
}

/// Complete JSON document for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    pub version: String,
    pub format: String,
    /// Wall time of the whole run in seconds
    pub total_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortColumn>,
    pub functions: Vec<JsonFunction>,
}

impl JsonOutput {
    /// Create a new JSON output structure
    pub fn new(total_time: f64, sort: Option<SortColumn>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "callprof-json-v1".to_string(),
            total_time,
            sort,
            functions: Vec::new(),
        }
    }

    /// Build from already-ordered rows
    pub fn from_rows(
        total_time: f64,
        sort: Option<SortColumn>,
        rows: &[(FunctionIdentity, StatRecord)],
    ) -> Self {
        let mut output = Self::new(total_time, sort);
        for (id, stat) in rows {
            output.add_function(JsonFunction::new(id, stat));
        }
        output
    }

    pub fn add_function(&mut self, function: JsonFunction) {
        self.functions.push(function);
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
