//! CSV output format for profiling results
//!
//! --format csv for spreadsheet analysis and machine parsing

use crate::identity::FunctionIdentity;
use crate::stats::StatRecord;

/// CSV output formatter
#[derive(Debug, Default)]
pub struct CsvOutput {
    rows: Vec<(FunctionIdentity, StatRecord)>,
}

impl CsvOutput {
    /// Create a new CSV output formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-ordered rows
    pub fn from_rows(rows: &[(FunctionIdentity, StatRecord)]) -> Self {
        Self {
            rows: rows.to_vec(),
        }
    }

    /// Add a row to the output
    pub fn add_row(&mut self, id: FunctionIdentity, stat: StatRecord) {
        self.rows.push((id, stat));
    }

    fn header() -> &'static str {
        "function,file,line,calls,total_time,cumulative_time,min_time,max_time,avg_time"
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_time(value: Option<f64>) -> String {
        value.map(|t| format!("{:.6}", t)).unwrap_or_default()
    }

    fn format_row(id: &FunctionIdentity, stat: &StatRecord) -> String {
        [
            Self::escape_field(id.name()),
            Self::escape_field(id.file()),
            id.line().to_string(),
            stat.call_count.to_string(),
            format!("{:.6}", stat.total_time),
            format!("{:.6}", stat.cumulative_time),
            Self::format_time(stat.observed_min()),
            Self::format_time(stat.observed_max()),
            format!("{:.6}", stat.avg_time()),
        ]
        .join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(Self::header());
        output.push('\n');

        for (id, stat) in &self.rows {
            output.push_str(&Self::format_row(id, stat));
            output.push('\n');
        }

        output
    }
}
