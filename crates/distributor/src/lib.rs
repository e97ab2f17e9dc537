//! # Distributor
//!
//! 消息分发模块。
//!
//! 负责：
//! - 接收 sources 推送的消息，写入有界队列（满则丢弃）
//! - 逐条取出并按注册顺序 fan-out 到所有 targets
//! - 基于线程池的 target，隔离慢速 I/O，不阻塞分发循环
//! - 多阶段关闭：拒收 → 关闭 sources → 清空队列 → 关闭 targets → 等待在途写入

pub mod distributor;
pub mod error;
pub mod factory;
mod ingress;
pub mod metrics;
pub mod pool;
pub mod pooled;
pub mod targets;

pub use contracts::{DistributionSource, DistributionTarget, Message};
pub use distributor::{
    Distributor, DistributorBuilder, DistributorConfig, DistributorState, create_distributor,
};
pub use error::DistributorError;
pub use factory::create_target;
pub use metrics::{DistributorMetrics, PoolMetrics};
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use pooled::{TaskHandler, WorkerPoolTarget};
pub use targets::{
    GraphiteHandler, GraphiteTarget, LogTarget, NetworkTransport, SocketHandler, TcpTarget,
    TcpTransport, UdpTarget, UdpTransport,
};
