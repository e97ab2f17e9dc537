//! # Observability
//!
//! 日志与指标初始化：tracing 订阅器 + 可选的 Prometheus 导出器。
//!
//! 日志级别只作用于本工作区的 crate（distributor、ingestion 等），依赖库保持
//! `warn`，避免 tokio / hyper 的调试日志淹没分发日志。设置 `RUST_LOG` 时完全
//! 以环境变量为准。
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::from_verbosity(false, 1))?;
//! observability::init_metrics(9000)?;
//!
//! metrics::record_distributor_stats(&distributor.stats());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::metrics::{
    ThroughputSummary, ThroughputTracker, record_distributor_stats, record_outcome_stats,
};

/// Crates whose events follow the configured level
pub const WORKSPACE_CRATES: &[&str] = &[
    "alert_distributor",
    "alert_distributor_cli",
    "config_loader",
    "distributor",
    "formatter",
    "ingestion",
    "observability",
];

/// Level for everything outside [`WORKSPACE_CRATES`]
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::WARN;

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志，每个事件一行
    #[default]
    Json,
    /// 多行、带源码位置
    Pretty,
    /// 单行
    Compact,
}

/// Logging and metrics settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Level for the workspace crates
    pub level: LevelFilter,
    /// Prometheus listener port (None = no exporter)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            level: LevelFilter::INFO,
            metrics_port: None,
        }
    }
}

impl ObservabilityConfig {
    /// `-q` → warn, none → info, `-v` → debug, `-vv` and up → trace
    pub fn from_verbosity(quiet: bool, verbose: u8) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => LevelFilter::WARN,
            (false, 0) => LevelFilter::INFO,
            (false, 1) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        };
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_log_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    /// `EnvFilter` directives, e.g. `warn,distributor=debug,ingestion=debug`
    pub fn filter_directives(&self) -> String {
        let level = self.level;
        // more verbose levels compare greater
        std::iter::once(DEPENDENCY_LEVEL.min(level).to_string())
            .chain(WORKSPACE_CRATES.iter().map(|name| format!("{name}={level}")))
            .collect::<Vec<_>>()
            .join(",")
            .to_lowercase()
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.filter_directives()))
    }
}

/// Install the tracing subscriber and, if a port is set, the Prometheus exporter
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(true)
            .with_current_span(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(config.env_filter())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.level,
        "Logging initialized"
    );
    Ok(())
}

/// Serve Prometheus metrics on `0.0.0.0:port`
///
/// Usable on its own when logging was set up elsewhere. Only one recorder can
/// be installed per process.
pub fn init_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus exporter on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.level, LevelFilter::INFO);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_verbosity_levels() {
        let level = |quiet, verbose| ObservabilityConfig::from_verbosity(quiet, verbose).level;
        assert_eq!(level(true, 0), LevelFilter::WARN);
        assert_eq!(level(false, 0), LevelFilter::INFO);
        assert_eq!(level(false, 1), LevelFilter::DEBUG);
        assert_eq!(level(false, 5), LevelFilter::TRACE);
    }

    #[test]
    fn test_filter_directives_scope_workspace_crates() {
        let directives = ObservabilityConfig::from_verbosity(false, 1).filter_directives();
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("distributor=debug"));
        assert!(directives.contains("ingestion=debug"));
        assert!(!directives.contains("tokio"));

        let quiet = ObservabilityConfig::from_verbosity(true, 0).filter_directives();
        assert!(quiet.starts_with("warn,"));
        assert!(quiet.contains("alert_distributor=warn"));

        EnvFilter::try_new(directives).unwrap();
    }
}
