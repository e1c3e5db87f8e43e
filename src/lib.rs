//! callprof - Call-level execution time profiler
//!
//! This library intercepts calls to a set of callables, times every
//! invocation, and aggregates per-function statistics (call count, total
//! time, cumulative time attributed from callees, min/max duration) that can
//! be reported as a sortable table, JSON or CSV.

pub mod binder;
pub mod call_stack;
pub mod callable;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod demo;
pub mod filter;
pub mod identity;
pub mod interceptor;
pub mod json_output;
pub mod namespace;
pub mod profiler;
pub mod report;
pub mod stats;
