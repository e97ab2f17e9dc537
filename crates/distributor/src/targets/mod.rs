//! Target implementations

mod graphite;
mod log;
mod network;

pub use graphite::{GraphiteHandler, GraphiteTarget};
pub use log::LogTarget;
pub use network::{
    NetworkTransport, SocketHandler, TcpTarget, TcpTransport, UdpTarget, UdpTransport,
};
