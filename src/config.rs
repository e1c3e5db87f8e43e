//! Profiler configuration
//!
//! Settings may come from a TOML file and are overridden by CLI flags.
//!
//! ```toml
//! sort = 1
//! format = "json"
//! filter = "wrap=/^work_/"
//! ```

use crate::filter::FunctionFilter;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Output format for the results report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

/// Settings for one profiling run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Sort column ordinal (0 = calls, 1 = total, 2 = cumulative, 3 = min, 4 = max)
    pub sort: Option<usize>,
    pub format: OutputFormat,
    /// Wrap filter expression, e.g. "wrap=parse,!helper"
    pub filter: Option<String>,
}

impl ProfilerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Parse the configured filter, wrapping everything when none is set
    pub fn function_filter(&self) -> Result<FunctionFilter> {
        match &self.filter {
            Some(expr) => FunctionFilter::from_expr(expr),
            None => Ok(FunctionFilter::all()),
        }
    }
}
