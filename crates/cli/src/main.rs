//! # Alert Distributor CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 分发管道编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_bench, run_distributor, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Alert Distributor CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_distributor(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Bench(args) => run_bench(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// Prometheus is started later by `run`, only when a metrics port is given.
fn init_logging(cli: &Cli) -> Result<()> {
    observability::init_with_config(
        observability::ObservabilityConfig::from_verbosity(cli.quiet, cli.verbose)
            .with_log_format(cli.log_format.into()),
    )
}
