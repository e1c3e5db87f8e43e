//! Profiling run entry point
//!
//! [`Profiler::run`] takes a `"namespace.callable"` command, binds the
//! namespace, calls the target with no arguments, and writes the total wall
//! time followed by the statistics report.
//!
//! Malformed commands and out-of-range sort columns are logged and abort the
//! run before anything is invoked; they come back as
//! [`RunOutcome::Aborted`], not as errors. A failing or panicking target
//! still gets its report written before the failure is returned or the
//! panic resumes.

use crate::binder::{BindReport, Binder};
use crate::callable::{CallError, Value};
use crate::config::{OutputFormat, ProfilerConfig};
use crate::csv_output::CsvOutput;
use crate::filter::FunctionFilter;
use crate::interceptor::Interceptor;
use crate::json_output::JsonOutput;
use crate::namespace::ModuleRegistry;
use crate::report::{self, SortColumn, SortRangeError};
use crate::stats::StatsStore;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

/// Command rejected before the target was invoked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command must have the form namespace.callable, got `{command}`")]
    Usage { command: String },

    #[error(transparent)]
    SortRange(#[from] SortRangeError),
}

/// Failure of a run that got past command validation
#[derive(Debug, Error)]
pub enum RunError {
    #[error("namespace `{0}` is not registered")]
    UnknownNamespace(String),

    #[error("`{namespace}` has no callable `{callable}`")]
    UnknownCallable { namespace: String, callable: String },

    #[error("profiled callable failed")]
    Call(#[source] CallError),

    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

/// What happened to a run
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Aborted(CommandError),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunSummary {
    /// Wall time of the target call
    pub total_time: Duration,
    /// Value returned by the target
    pub result: Value,
    pub bind: BindReport,
}

/// Split `"namespace.callable"` into its two parts
pub fn parse_command(command: &str) -> Result<(&str, &str), CommandError> {
    let mut parts = command.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(callable), None) if !namespace.is_empty() && !callable.is_empty() => {
            Ok((namespace, callable))
        }
        _ => Err(CommandError::Usage {
            command: command.to_string(),
        }),
    }
}

/// Binds namespaces, runs a target and reports the statistics
#[derive(Debug)]
pub struct Profiler {
    interceptor: Arc<Interceptor>,
    binder: Binder,
    registry: ModuleRegistry,
    format: OutputFormat,
}

impl Profiler {
    /// Profiler that wraps everything and prints a text table
    pub fn new(registry: ModuleRegistry) -> Self {
        Self::build(registry, FunctionFilter::all(), OutputFormat::Text)
    }

    /// Profiler using the filter and format from `config`
    pub fn with_config(registry: ModuleRegistry, config: &ProfilerConfig) -> anyhow::Result<Self> {
        let filter = config.function_filter()?;
        Ok(Self::build(registry, filter, config.format))
    }

    fn build(registry: ModuleRegistry, filter: FunctionFilter, format: OutputFormat) -> Self {
        let interceptor = Arc::new(Interceptor::new());
        let binder = Binder::with_filter(Arc::clone(&interceptor), filter);
        Self {
            interceptor,
            binder,
            registry,
            format,
        }
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &StatsStore {
        self.interceptor.stats()
    }

    /// Profile `command` and write the report to `out`
    pub fn run<W: Write>(
        &self,
        command: &str,
        sort: Option<usize>,
        out: &mut W,
    ) -> Result<RunOutcome, RunError> {
        let sort = match sort.map(SortColumn::from_index).transpose() {
            Ok(sort) => sort,
            Err(err) => {
                error!("{}", err);
                return Ok(RunOutcome::Aborted(err.into()));
            }
        };

        let (namespace_name, callable_name) = match parse_command(command) {
            Ok(parts) => parts,
            Err(err) => {
                error!("{}", err);
                return Ok(RunOutcome::Aborted(err));
            }
        };

        let namespace = self
            .registry
            .load(namespace_name)
            .ok_or_else(|| RunError::UnknownNamespace(namespace_name.to_string()))?;
        let bind = self.binder.bind(&namespace);

        let target = namespace
            .function(callable_name)
            .ok_or_else(|| RunError::UnknownCallable {
                namespace: namespace_name.to_string(),
                callable: callable_name.to_string(),
            })?;

        debug!(command, "invoking target");
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| target.call(&[])));
        let total_time = start.elapsed();

        let written = self.write_report(total_time, sort, out);
        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                if let Err(io_err) = written {
                    error!("failed to write report: {}", io_err);
                }
                panic::resume_unwind(payload);
            }
        };
        match result {
            Ok(value) => {
                written?;
                Ok(RunOutcome::Completed(RunSummary {
                    total_time,
                    result: value,
                    bind,
                }))
            }
            Err(err) => {
                if let Err(io_err) = written {
                    error!("failed to write report: {}", io_err);
                }
                Err(RunError::Call(err))
            }
        }
    }

    /// Write the run report in the configured format
    pub fn write_report<W: Write>(
        &self,
        total_time: Duration,
        sort: Option<SortColumn>,
        out: &mut W,
    ) -> io::Result<()> {
        let rows = report::ordered(self.stats().snapshot(), sort);
        match self.format {
            OutputFormat::Text => {
                writeln!(out, "Total time: {:.6} seconds", total_time.as_secs_f64())?;
                write!(out, "{}", report::render_table(&rows))?;
            }
            OutputFormat::Json => {
                let json = JsonOutput::from_rows(total_time.as_secs_f64(), sort, &rows)
                    .to_json()
                    .map_err(io::Error::other)?;
                writeln!(out, "{}", json)?;
            }
            OutputFormat::Csv => {
                write!(out, "{}", CsvOutput::from_rows(&rows).to_csv())?;
            }
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{Arity, Callable};
    use crate::namespace::Namespace;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_counter() -> (ModuleRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let ns = Namespace::new("app");
        let counter = Arc::clone(&calls);
        ns.define_fn(Callable::new("main", Arity::Exact(0), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(1))
        }));
        ns.define_fn(Callable::new("fail", Arity::Exact(0), |_| {
            Err(anyhow::anyhow!("target failed").into())
        }));
        let registry = ModuleRegistry::new();
        registry.register(ns);
        (registry, calls)
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("mod.fn").unwrap(), ("mod", "fn"));
        assert!(parse_command("invalidmodule").is_err());
        assert!(parse_command("a.b.c").is_err());
        assert!(parse_command(".fn").is_err());
        assert!(parse_command("mod.").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn test_run_completes_and_reports() {
        let (registry, calls) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let outcome = profiler.run("app.main", Some(0), &mut out).unwrap();

        assert!(outcome.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Total time: "));
        assert!(text.contains("Profiling Results:"));
        assert!(text.contains("main ("));
    }

    #[test]
    fn test_usage_error_aborts_without_invoking() {
        let (registry, calls) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let outcome = profiler.run("invalidmodule", None, &mut out).unwrap();

        assert!(matches!(outcome, RunOutcome::Aborted(CommandError::Usage { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sort_range_error_aborts_without_invoking() {
        let (registry, calls) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let outcome = profiler.run("app.main", Some(10), &mut out).unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Aborted(CommandError::SortRange(SortRangeError { index: 10 }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(profiler.stats().is_empty());
    }

    #[test]
    fn test_failing_target_reports_then_errors() {
        let (registry, _) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let err = profiler.run("app.fail", None, &mut out).unwrap_err();

        assert!(matches!(err, RunError::Call(_)));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("fail ("));
        assert_eq!(profiler.stats().find_by_name("fail").unwrap().1.call_count, 1);
    }

    #[test]
    fn test_panicking_target_reports_then_resumes() {
        let ns = Namespace::new("m");
        ns.define_fn(Callable::new("boom", Arity::Exact(0), |_| panic!("target exploded")));
        let registry = ModuleRegistry::new();
        registry.register(ns);
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = profiler.run("m.boom", None, &mut out);
        }));

        assert!(caught.is_err());
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Total time: "));
        assert!(text.contains("Profiling Results:"));
        assert!(text.contains("boom ("));
        assert_eq!(profiler.stats().find_by_name("boom").unwrap().1.call_count, 1);
        assert_eq!(profiler.interceptor().depth(), 0);
    }

    #[test]
    fn test_call_error_message_not_repeated() {
        let (registry, _) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        let err = profiler.run("app.fail", None, &mut out).unwrap_err();

        assert_eq!(err.to_string(), "profiled callable failed");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "target failed");
    }

    #[test]
    fn test_unknown_namespace_and_callable() {
        let (registry, _) = registry_with_counter();
        let profiler = Profiler::new(registry);
        let mut out = Vec::new();

        assert!(matches!(
            profiler.run("nope.main", None, &mut out),
            Err(RunError::UnknownNamespace(_))
        ));
        assert!(matches!(
            profiler.run("app.nope", None, &mut out),
            Err(RunError::UnknownCallable { .. })
        ));
    }

    #[test]
    fn test_json_format() {
        let (registry, _) = registry_with_counter();
        let config = ProfilerConfig {
            format: OutputFormat::Json,
            ..Default::default()
        };
        let profiler = Profiler::with_config(registry, &config).unwrap();
        let mut out = Vec::new();

        profiler.run("app.main", Some(1), &mut out).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["sort"], "total_time");
        assert_eq!(parsed["functions"][0]["name"], "main");
    }

    #[test]
    fn test_csv_format() {
        let (registry, _) = registry_with_counter();
        let config = ProfilerConfig {
            format: OutputFormat::Csv,
            ..Default::default()
        };
        let profiler = Profiler::with_config(registry, &config).unwrap();
        let mut out = Vec::new();

        profiler.run("app.main", None, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("function,file,line,calls"));
        assert!(text.contains("\nmain,"));
    }
}
