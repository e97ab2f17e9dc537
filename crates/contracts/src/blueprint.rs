//! DistributorBlueprint - Config Loader 输出
//!
//! 描述完整的分发配置：分发器参数、消息源、投递目标。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{ContractError, DisconnectCode};

/// 默认线程池大小
pub const DEFAULT_POOL_SIZE: usize = 10;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的分发配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分发器设置
    #[serde(default)]
    pub distributor: DistributorSettings,

    /// 消息源列表
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// 投递目标列表（按注册顺序投递）
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// 分发器设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorSettings {
    /// 每次循环之间的节拍延迟 (秒)，必须 >= 0
    #[serde(default)]
    pub pacing_delay_secs: f64,

    /// 队列容量，队列满时丢弃新消息
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 单个 target 的 on_message 超时 (毫秒)，0 = 不限制
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// 关闭时发给 source 的断开码
    #[serde(default)]
    pub shutdown_code: DisconnectCode,
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

impl Default for DistributorSettings {
    fn default() -> Self {
        Self {
            pacing_delay_secs: 0.0,
            queue_capacity: default_queue_capacity(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            shutdown_code: DisconnectCode::SHUTDOWN,
        }
    }
}

impl DistributorSettings {
    /// 节拍延迟；非法值按 0 处理（校验器会提前拒绝）
    pub fn pacing_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.pacing_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// on_message 超时
    pub fn delivery_timeout(&self) -> Option<Duration> {
        match self.delivery_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// 消息源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 唯一名称
    pub name: String,

    /// 消息源类型
    pub source_type: SourceType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 消息源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// TCP 监听，每行文本为一条消息
    TcpLines,
    /// 模拟消息生成器
    Mock,
}

/// 投递目标配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// 唯一名称
    pub name: String,

    /// 目标类型
    pub target_type: TargetType,

    /// 工作线程池大小，必须 > 0
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// 单个任务超时 (毫秒)
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// 目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// 日志输出
    Log,
    /// TCP 流
    Tcp,
    /// UDP 数据报
    Udp,
    /// Graphite 明文协议 (TCP)
    Graphite,
}

impl TargetType {
    /// 该类型是否需要 `addr` 参数
    pub fn needs_addr(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp | Self::Graphite)
    }
}

impl TargetConfig {
    /// 任务超时
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// 读取必填参数
    pub fn require_param(&self, key: &str) -> Result<&str, ContractError> {
        self.param(key).ok_or_else(|| {
            ContractError::config_validation(
                format!("targets[{}].params.{}", self.name, key),
                format!("missing '{}' parameter", key),
            )
        })
    }
}

impl SourceConfig {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// 读取必填参数
    pub fn require_param(&self, key: &str) -> Result<&str, ContractError> {
        self.param(key).ok_or_else(|| {
            ContractError::config_validation(
                format!("sources[{}].params.{}", self.name, key),
                format!("missing '{}' parameter", key),
            )
        })
    }
}
