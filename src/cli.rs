//! CLI argument parsing for callprof

use crate::config::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "callprof")]
#[command(version)]
#[command(about = "Call-level execution time profiler", long_about = None)]
pub struct Cli {
    /// Target to profile, as NAMESPACE.CALLABLE (e.g. demo.main)
    #[arg(value_name = "NAMESPACE.CALLABLE", required_unless_present = "list")]
    pub command: Option<String>,

    /// Sort column: 0 calls, 1 total, 2 cumulative, 3 min, 4 max (descending)
    #[arg(short = 's', long = "sort", value_name = "COLUMN")]
    pub sort: Option<usize>,

    /// Output format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Functions to wrap (e.g., -e wrap=main,/^work_/,!helper)
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Load settings from a TOML file (flags take precedence)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List the available namespaces and exit
    #[arg(long = "list")]
    pub list: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
