// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Report how L1 memory usage evolves over a device-operation trace.
//!
//! Settings come from `memtrace-report.toml`, `MEMTRACE_*` environment
//! variables and the command line. For example:
//!
//! ```text
//! memtrace-report --trace add.json --summary --filter-regex 'ttnn::.*'
//! ```

use std::io::{self, BufWriter, Write};
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::Parser;
use log::{LevelFilter, info, warn};
use memtrace::check::check_trace;
use memtrace::reducer::compute_memory_trace;
use memtrace::wire::load_operation_file;
use memtrace_report::config::{Cli, OutputFormat, Settings};
use memtrace_report::report::{JsonOptions, build_filter, write_json, write_records, write_summary};
use simplelog::{ConfigBuilder, WriteLogger};

/// Take the settings string and convert it to a Level
fn choose_level(lvl: &str) -> LevelFilter {
    match LevelFilter::from_str(lvl) {
        Ok(level) => level,
        Err(_) => {
            let default = LevelFilter::Warn;
            eprintln!("Unable to parse level string '{lvl}', defaulting to {default}");
            default
        }
    }
}

fn setup_logger(lvl: &str) -> anyhow::Result<()> {
    // Plain messages only: no time, location, thread or target
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    // Log to stderr so that the report on stdout stays parseable
    WriteLogger::init(choose_level(lvl), config, io::stderr())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    setup_logger(&settings.log)?;

    let filter = build_filter(&settings.filter_regex)
        .with_context(|| format!("invalid filter regex '{}'", settings.filter_regex))?;

    let operation = load_operation_file(&settings.trace)?;
    info!(
        "Loaded {} events from {}",
        operation.events.len(),
        settings.trace.display()
    );

    let memory_trace = compute_memory_trace(&operation.events);
    if memory_trace.has_negative_totals() {
        warn!("Running totals went negative: deallocations without matching allocations");
    }

    let issues = if settings.check {
        let issues = check_trace(&operation.events);
        for issue in &issues {
            warn!("{issue}");
        }
        Some(issues)
    } else {
        None
    };

    let mut out = BufWriter::new(io::stdout().lock());
    match settings.format {
        OutputFormat::Text => {
            write_records(&mut out, &operation, &memory_trace, filter.as_ref())?;
            if settings.summary {
                write_summary(&mut out, &operation.events, &memory_trace, settings.split_gap)?;
            }
        }
        OutputFormat::Json => {
            let options = JsonOptions {
                filter: filter.as_ref(),
                summary_split_gap: settings.summary.then_some(settings.split_gap),
                issues: issues.as_deref(),
            };
            write_json(&mut out, &operation, &memory_trace, &options)?;
        }
    }
    out.flush()?;

    let num_issues = issues.map_or(0, |issues| issues.len());
    if num_issues > 0 {
        bail!("{num_issues} trace issue(s) found");
    }
    Ok(())
}
