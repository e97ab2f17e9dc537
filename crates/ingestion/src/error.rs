//! Ingestion 错误类型

use thiserror::Error;

use contracts::ContractError;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 配置参数非法
    #[error("invalid parameter '{param}': {message}")]
    InvalidParam {
        /// 消息源名称
        source_name: String,
        /// 参数名
        param: &'static str,
        /// 错误消息
        message: String,
    },

    /// 监听地址绑定失败
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 消息源名称
        source_name: String,
        /// 监听地址
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 消息源已打开
    #[error("already open")]
    AlreadyOpen {
        /// 消息源名称
        source_name: String,
    },

    /// 未注册消息回调
    #[error("no message callback registered")]
    NoCallback {
        /// 消息源名称
        source_name: String,
    },

    /// 后台线程启动或退出失败
    #[error("background thread error: {message}")]
    Thread {
        /// 消息源名称
        source_name: String,
        /// 错误消息
        message: String,
    },
}

impl IngestionError {
    pub fn invalid_param(
        source_name: impl Into<String>,
        param: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            source_name: source_name.into(),
            param,
            message: message.into(),
        }
    }

    /// 出错的消息源名称
    pub fn source_name(&self) -> &str {
        match self {
            Self::InvalidParam { source_name, .. }
            | Self::Bind { source_name, .. }
            | Self::AlreadyOpen { source_name }
            | Self::NoCallback { source_name }
            | Self::Thread { source_name, .. } => source_name,
        }
    }
}

impl From<IngestionError> for ContractError {
    fn from(error: IngestionError) -> Self {
        ContractError::source_open(error.source_name().to_string(), error.to_string())
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
