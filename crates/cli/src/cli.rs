//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Alert Distributor - fan trading alerts out to logging and metrics endpoints
#[derive(Parser, Debug)]
#[command(
    name = "alert-distributor",
    author,
    version,
    about = "Fan-out distributor for trading alerts",
    long_about = "Receives messages from configured sources, queues them, and delivers \n\
                  every message to each configured target (log, TCP, UDP, Graphite)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ALERT_DISTRIBUTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ALERT_DISTRIBUTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the distributor until Ctrl+C / SIGTERM
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Push messages through a pooled target and report timings
    Bench(BenchArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "distributor.toml",
        env = "ALERT_DISTRIBUTOR_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the queue capacity from configuration
    #[arg(long, env = "ALERT_DISTRIBUTOR_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Override the pacing delay (seconds) from configuration
    #[arg(long, env = "ALERT_DISTRIBUTOR_PACING_DELAY")]
    pub pacing_delay: Option<f64>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "ALERT_DISTRIBUTOR_TIMEOUT")]
    pub timeout: u64,

    /// Interval between statistics reports in seconds (0 = disabled)
    #[arg(long, default_value = "30", env = "ALERT_DISTRIBUTOR_STATS_INTERVAL")]
    pub stats_interval: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ALERT_DISTRIBUTOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "distributor.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "distributor.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show source and target parameters
    #[arg(long)]
    pub params: bool,
}

/// Arguments for the `bench` command
#[derive(Parser, Debug, Clone)]
pub struct BenchArgs {
    /// Number of messages to push
    #[arg(short = 'n', long, default_value = "1000")]
    pub messages: u64,

    /// Worker pool size of the benchmark target
    #[arg(short, long, default_value = "10")]
    pub pool_size: usize,

    /// Simulated work per message in milliseconds
    #[arg(long, default_value = "0")]
    pub work_ms: u64,

    /// Per-task timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    pub task_timeout_ms: u64,

    /// Give up waiting for outcomes after this many seconds
    #[arg(long, default_value = "60")]
    pub deadline: u64,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "alert-distributor",
            "run",
            "-c",
            "prod.toml",
            "--queue-capacity",
            "50",
            "--timeout",
            "5",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("prod.toml"));
        assert_eq!(args.queue_capacity, Some(50));
        assert_eq!(args.pacing_delay, None);
        assert_eq!(args.timeout, 5);
    }

    #[test]
    fn test_parse_bench_defaults() {
        let cli = Cli::parse_from(["alert-distributor", "bench", "-n", "3"]);
        let Commands::Bench(args) = cli.command else {
            panic!("expected bench command");
        };
        assert_eq!(args.messages, 3);
        assert_eq!(args.pool_size, 10);
        assert_eq!(args.work_ms, 0);
    }
}
