//! Command-line arguments.

use clap::Parser;
use handlescan_core::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "handlescan")]
#[command(version)]
#[command(about = "Check which sites a username is registered on")]
#[command(long_about = None)]
pub struct Cli {
    /// Usernames to check; `{?}` expands to `_`, `-` and `.` variants
    #[arg(value_name = "USERNAME", required = true)]
    pub usernames: Vec<String>,

    /// Only check these sites (repeatable, case-insensitive)
    #[arg(short, long = "site", value_name = "SITE")]
    pub sites: Vec<String>,

    /// Catalog path or URL ending in .json
    #[arg(short = 'j', long, value_name = "SOURCE")]
    pub catalog: Option<String>,

    /// Fail if any catalog entry is invalid instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-probe timeout in seconds, covering retries
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum probes in flight
    #[arg(short = 'c', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Attempts per probe, including the first
    #[arg(long, value_name = "N")]
    pub attempts: Option<u32>,

    /// Stop starting new probes after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Route requests through a proxy, e.g. socks5://127.0.0.1:1080
    #[arg(short, long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Include sites flagged NSFW
    #[arg(long)]
    pub nsfw: bool,

    /// Print every result, not only claimed ones
    #[arg(short = 'a', long)]
    pub print_all: bool,

    /// Write the full report as JSON to this file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// More log output (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Layer command-line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.catalog {
            config.catalog.source = Some(source.clone());
        }
        if self.strict {
            config.catalog.strict = true;
        }
        if let Some(secs) = self.timeout {
            config.probing.timeout_secs = secs;
        }
        if let Some(limit) = self.concurrency {
            config.probing.concurrency_limit = limit;
        }
        if let Some(attempts) = self.attempts {
            config.probing.max_attempts = attempts;
        }
        if let Some(secs) = self.deadline {
            config.probing.session_deadline_secs = Some(secs);
        }
        if let Some(proxy) = &self.proxy {
            config.probing.proxy = Some(proxy.clone());
        }
        config.probing.exclude_nsfw = !self.nsfw;
    }

    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn,handlescan=info",
            1 => "info,handlescan=debug",
            _ => "debug,handlescan=trace",
        }
    }
}
