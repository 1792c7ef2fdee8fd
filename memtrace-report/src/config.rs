// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Settings gathered from every configuration source.
//!
//! Sources are merged in increasing priority:
//!
//!   1. built-in defaults ([`Settings::default`])
//!   2. [`CONF_FILE`] in the working directory
//!   3. an extra TOML file given with `--conf-file`
//!   4. environment variables prefixed with [`ENV_PREFIX`], e.g.
//!      `MEMTRACE_FORMAT=json`
//!   5. command-line flags, only where actually given

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Configuration file read from the working directory when present.
pub const CONF_FILE: &str = "memtrace-report.toml";

/// Prefix of the environment variables that override settings.
pub const ENV_PREFIX: &str = "MEMTRACE_";

/// How the report is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

/// Fully resolved settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Trace file to read.
    pub trace: PathBuf,

    /// Logging level.
    pub log: String,

    /// Output format.
    pub format: OutputFormat,

    /// Only report records whose operation name matches this regular
    /// expression. Empty matches everything.
    pub filter_regex: String,

    /// Add per-operation peaks and a buffer address summary.
    pub summary: bool,

    /// Check the trace for inconsistencies.
    pub check: bool,

    /// Gap in bytes above which buffer address ranges are shown as separate
    /// segments.
    pub split_gap: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trace: PathBuf::from("trace.json"),
            log: "warn".to_string(),
            format: OutputFormat::Text,
            filter_regex: String::new(),
            summary: false,
            check: false,
            split_gap: 1 << 20,
        }
    }
}

/// Command-line arguments.
///
/// Every field is optional so that only flags the user gave override the
/// other sources.
#[derive(Debug, Default, Parser)]
#[command(about = "Report L1 memory usage over a device-operation trace")]
pub struct Cli {
    /// Trace file (an operation-details JSON object or a bare node list)
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Only report operations matching this regular expression
    #[arg(long)]
    pub filter_regex: Option<String>,

    /// Add per-operation peaks and a buffer address summary
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub summary: Option<bool>,

    /// Check the trace for inconsistencies and fail if any are found
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub check: Option<bool>,

    /// Gap in bytes above which address ranges are split into segments
    #[arg(long)]
    pub split_gap: Option<u64>,

    /// Path to an additional TOML configuration file
    #[arg(long)]
    pub conf_file: Option<PathBuf>,
}

fn check_conf_file(conf_file: &Path) -> Result<(), io::Error> {
    if conf_file.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("{} is not a file path", conf_file.display()),
        ));
    }

    if !conf_file.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", conf_file.display()),
        ));
    }

    Ok(())
}

impl Settings {
    /// Build the [`Figment`] holding every source except the command line.
    #[must_use]
    pub fn figment(extra_conf_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONF_FILE));
        if let Some(conf_file) = extra_conf_file {
            figment = figment.merge(Toml::file(conf_file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Resolve the settings for the given command line.
    pub fn load(cli: &Cli) -> anyhow::Result<Settings> {
        if let Some(conf_file) = &cli.conf_file {
            check_conf_file(conf_file)?;
        }
        let mut settings: Settings = Settings::figment(cli.conf_file.as_deref()).extract()?;
        settings.merge_cli(cli);
        Ok(settings)
    }

    /// Override with every flag given on the command line.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(trace) = &cli.trace {
            self.trace = trace.clone();
        }
        if let Some(log) = &cli.log {
            self.log = log.clone();
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(filter_regex) = &cli.filter_regex {
            self.filter_regex = filter_regex.clone();
        }
        if let Some(summary) = cli.summary {
            self.summary = summary;
        }
        if let Some(check) = cli.check {
            self.check = check;
        }
        if let Some(split_gap) = cli.split_gap {
            self.split_gap = split_gap;
        }
    }
}
