use anyhow::Result;
use callprof::config::ProfilerConfig;
use callprof::namespace::{Member, ModuleRegistry};
use callprof::profiler::{Profiler, RunOutcome};
use callprof::{cli::Cli, demo};
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for diagnostics on stderr
///
/// Errors are always shown; `--debug` turns on everything down to TRACE.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Print every callable target the registry offers
fn print_targets(registry: &ModuleRegistry) {
    for name in registry.names() {
        let Some(namespace) = registry.load(&name) else {
            continue;
        };
        for (member, entry) in namespace.members() {
            if let Member::Function(_) = entry {
                println!("{}.{}", name, member);
            }
        }
    }
}

/// Merge the optional config file with CLI flags
fn load_config(args: &Cli) -> Result<ProfilerConfig> {
    let mut config = match &args.config {
        Some(path) => ProfilerConfig::from_file(path)?,
        None => ProfilerConfig::default(),
    };

    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(filter) = &args.filter {
        config.filter = Some(filter.clone());
    }
    if args.sort.is_some() {
        config.sort = args.sort;
    }

    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let registry = demo::registry();

    if args.list {
        print_targets(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let command = args.command.unwrap_or_default();
    let profiler = Profiler::with_config(registry, &config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match profiler.run(&command, config.sort, &mut out)? {
        RunOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        RunOutcome::Aborted(_) => Ok(ExitCode::from(2)),
    }
}
