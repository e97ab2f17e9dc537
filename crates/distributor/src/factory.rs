//! Target factory - builds targets from `TargetConfig`

use std::sync::Arc;
use std::time::Duration;

use formatter::{GraphiteFormatter, PassthroughFormatter};
use tracing::instrument;

use contracts::{DistributionTarget, TargetConfig, TargetType};

use crate::error::DistributorError;
use crate::pool::WorkerPoolConfig;
use crate::pooled::WorkerPoolTarget;
use crate::targets::{GraphiteHandler, LogTarget, SocketHandler, TcpTransport, UdpTransport};

/// Create a target from configuration
#[instrument(
    name = "distributor_create_target",
    skip(config),
    fields(target_name = %config.name, target_type = ?config.target_type)
)]
pub fn create_target(config: &TargetConfig) -> Result<Arc<dyn DistributionTarget>, DistributorError> {
    if config.pool_size == 0 {
        return Err(DistributorError::target_creation(
            &config.name,
            "pool_size must be greater than 0",
        ));
    }

    match config.target_type {
        TargetType::Log => Ok(create_log_target(config)),
        TargetType::Tcp => create_tcp_target(config),
        TargetType::Udp => create_udp_target(config),
        TargetType::Graphite => create_graphite_target(config),
    }
}

pub fn create_log_target(config: &TargetConfig) -> Arc<dyn DistributionTarget> {
    Arc::new(LogTarget::new(&config.name))
}

pub fn create_tcp_target(
    config: &TargetConfig,
) -> Result<Arc<dyn DistributionTarget>, DistributorError> {
    let transport = tcp_transport(config)?;
    Ok(Arc::new(WorkerPoolTarget::new(
        SocketHandler::new(&config.name, transport),
        WorkerPoolConfig::from_target_config(config),
    )))
}

pub fn create_udp_target(
    config: &TargetConfig,
) -> Result<Arc<dyn DistributionTarget>, DistributorError> {
    let addr = config
        .require_param("addr")
        .map_err(|e| DistributorError::target_creation(&config.name, e.to_string()))?;
    Ok(Arc::new(WorkerPoolTarget::new(
        SocketHandler::new(&config.name, UdpTransport::new(addr)),
        WorkerPoolConfig::from_target_config(config),
    )))
}

/// Graphite target; `format = "raw"` forwards messages that are already
/// Graphite lines, the default `alert` formats trading alerts
pub fn create_graphite_target(
    config: &TargetConfig,
) -> Result<Arc<dyn DistributionTarget>, DistributorError> {
    let transport = tcp_transport(config)?;
    let handler = match config.param("format").unwrap_or("alert") {
        "alert" => {
            let formatter = match config.param("namespace") {
                Some(namespace) => GraphiteFormatter::with_namespace(namespace),
                None => GraphiteFormatter::new(),
            };
            GraphiteHandler::new(&config.name, transport, formatter)
        }
        "raw" => GraphiteHandler::new(&config.name, transport, PassthroughFormatter),
        other => {
            return Err(DistributorError::target_creation(
                &config.name,
                format!("unknown graphite format '{other}', expected 'alert' or 'raw'"),
            ));
        }
    };
    Ok(Arc::new(WorkerPoolTarget::new(
        handler,
        WorkerPoolConfig::from_target_config(config),
    )))
}

fn tcp_transport(config: &TargetConfig) -> Result<TcpTransport, DistributorError> {
    let addr = config
        .require_param("addr")
        .map_err(|e| DistributorError::target_creation(&config.name, e.to_string()))?;

    let transport = TcpTransport::new(addr);
    match config.param("connect_timeout_ms") {
        None => Ok(transport),
        Some(raw) => raw
            .parse::<u64>()
            .map(|ms| transport.with_connect_timeout(Duration::from_millis(ms)))
            .map_err(|e| {
                DistributorError::target_creation(
                    &config.name,
                    format!("invalid connect_timeout_ms '{raw}': {e}"),
                )
            }),
    }
}
