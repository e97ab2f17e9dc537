//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 source 与一个 target
//! - source / target 名称非空且各自唯一
//! - queue_capacity > 0，pacing_delay_secs 为有限值且 >= 0
//! - pool_size > 0，task_timeout_ms > 0
//! - 必填参数：tcp/udp/graphite 需要 `addr`，tcp_lines 需要 `bind`，mock 的 `count` > 0

use std::collections::HashSet;

use contracts::{ContractError, DistributorBlueprint, SourceType};

/// 校验 DistributorBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    validate_distributor(blueprint)?;
    validate_source_names(blueprint)?;
    validate_target_names(blueprint)?;
    validate_sources(blueprint)?;
    validate_targets(blueprint)?;
    Ok(())
}

/// 校验分发器设置
fn validate_distributor(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    let settings = &blueprint.distributor;

    if settings.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "distributor.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }

    let pacing = settings.pacing_delay_secs;
    if !pacing.is_finite() || pacing < 0.0 {
        return Err(ContractError::config_validation(
            "distributor.pacing_delay_secs",
            format!("pacing_delay_secs must be a finite number >= 0, got {pacing}"),
        ));
    }

    Ok(())
}

/// 校验 source 名称唯一性
fn validate_source_names(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    if blueprint.sources.is_empty() {
        return Err(ContractError::config_validation(
            "sources",
            "at least one source is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, source) in blueprint.sources.iter().enumerate() {
        if source.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].name"),
                "source name cannot be empty",
            ));
        }
        if !seen.insert(&source.name) {
            return Err(ContractError::config_validation(
                format!("sources[name={}]", source.name),
                "duplicate source name",
            ));
        }
    }
    Ok(())
}

/// 校验 target 名称唯一性
fn validate_target_names(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    if blueprint.targets.is_empty() {
        return Err(ContractError::config_validation(
            "targets",
            "at least one target is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, target) in blueprint.targets.iter().enumerate() {
        if target.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("targets[{idx}].name"),
                "target name cannot be empty",
            ));
        }
        if !seen.insert(&target.name) {
            return Err(ContractError::config_validation(
                format!("targets[name={}]", target.name),
                "duplicate target name",
            ));
        }
    }
    Ok(())
}

/// 校验 source 参数
fn validate_sources(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    for source in &blueprint.sources {
        match source.source_type {
            SourceType::TcpLines => {
                source.require_param("bind")?;
            }
            SourceType::Mock => {
                let count = source.require_param("count")?;
                if !matches!(count.parse::<u64>(), Ok(n) if n > 0) {
                    return Err(ContractError::config_validation(
                        format!("sources[{}].params.count", source.name),
                        format!("count must be a positive integer, got '{count}'"),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 校验 target 配置
fn validate_targets(blueprint: &DistributorBlueprint) -> Result<(), ContractError> {
    for target in &blueprint.targets {
        if target.pool_size == 0 {
            return Err(ContractError::config_validation(
                format!("targets[{}].pool_size", target.name),
                "pool_size must be > 0",
            ));
        }
        if target.task_timeout_ms == Some(0) {
            return Err(ContractError::config_validation(
                format!("targets[{}].task_timeout_ms", target.name),
                "task_timeout_ms must be > 0 when set",
            ));
        }
        if target.target_type.needs_addr() {
            target.require_param("addr")?;
        }
    }
    Ok(())
}
