//! Socket targets - TCP stream and UDP datagram delivery
//!
//! Both run on a worker pool. Transports use blocking `std::net` sockets:
//! `process` only ever runs on a blocking worker thread, never on the runtime.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ContractError, DeliveryError, DisconnectCode, Message};
use tracing::{debug, info, instrument, trace};

use crate::pool::WorkerPoolConfig;
use crate::pooled::{TaskHandler, WorkerPoolTarget};

/// Byte transport behind a socket target
pub trait NetworkTransport: Send + Sync + 'static {
    /// `host:port` the transport talks to
    fn endpoint(&self) -> &str;

    fn connect(&self) -> io::Result<()>;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Send the whole buffer, returning the number of bytes sent
    fn send(&self, data: &[u8]) -> Result<usize, DeliveryError>;
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolve(addr: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<_> = addr.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{addr}' resolved to no address"),
        ));
    }
    Ok(addrs)
}

/// TCP stream transport
///
/// Concurrent sends are serialized so messages never interleave on the wire.
/// A failed write drops the connection; later sends report `NotConnected`.
pub struct TcpTransport {
    addr: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            stream: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn dial(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in resolve(&self.addr)? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
    }
}

impl NetworkTransport for TcpTransport {
    fn endpoint(&self) -> &str {
        &self.addr
    }

    fn connect(&self) -> io::Result<()> {
        let stream = self.dial()?;
        *lock(&self.stream) = Some(stream);
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(stream) = lock(&self.stream).take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.stream).is_some()
    }

    fn send(&self, data: &[u8]) -> Result<usize, DeliveryError> {
        let mut slot = lock(&self.stream);
        let Some(stream) = slot.as_mut() else {
            return Err(DeliveryError::not_connected(&self.addr));
        };
        if let Err(e) = stream.write_all(data) {
            *slot = None;
            return Err(e.into());
        }
        Ok(data.len())
    }
}

/// UDP datagram transport, one datagram per send
pub struct UdpTransport {
    addr: String,
    socket: Mutex<Option<(UdpSocket, SocketAddr)>>,
}

impl UdpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            socket: Mutex::new(None),
        }
    }
}

impl NetworkTransport for UdpTransport {
    fn endpoint(&self) -> &str {
        &self.addr
    }

    fn connect(&self) -> io::Result<()> {
        let peer = resolve(&self.addr)?[0];
        let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;
        *lock(&self.socket) = Some((socket, peer));
        Ok(())
    }

    fn disconnect(&self) {
        lock(&self.socket).take();
    }

    fn is_connected(&self) -> bool {
        lock(&self.socket).is_some()
    }

    fn send(&self, data: &[u8]) -> Result<usize, DeliveryError> {
        let slot = lock(&self.socket);
        let Some((socket, peer)) = slot.as_ref() else {
            return Err(DeliveryError::not_connected(&self.addr));
        };
        Ok(socket.send_to(data, peer)?)
    }
}

/// Sends each message verbatim over a [`NetworkTransport`]
pub struct SocketHandler<T: NetworkTransport> {
    name: String,
    transport: T,
}

impl<T: NetworkTransport> SocketHandler<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Open a transport, mapping failure onto the target that owns it
pub(crate) fn connect_transport(
    name: &str,
    transport: &impl NetworkTransport,
) -> Result<(), ContractError> {
    transport.connect().map_err(|e| {
        ContractError::target_open(
            name,
            format!("connect to {} failed: {}", transport.endpoint(), e),
        )
    })?;
    info!(target_name = %name, endpoint = %transport.endpoint(), "Connected");
    Ok(())
}

impl<T: NetworkTransport> TaskHandler for SocketHandler<T> {
    type Output = usize;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), ContractError> {
        connect_transport(&self.name, &self.transport)
    }

    #[instrument(name = "socket_target_send", skip(self, message), fields(target_name = %self.name))]
    fn process(&self, message: &Message) -> Result<usize, DeliveryError> {
        self.transport.send(message.as_bytes())
    }

    fn on_complete(&self, bytes: usize) {
        trace!(target_name = %self.name, bytes, "Sent");
    }

    fn close(&self, code: DisconnectCode, _reason: &str) -> Result<(), ContractError> {
        self.transport.disconnect();
        debug!(target_name = %self.name, %code, "Disconnected");
        Ok(())
    }
}

/// Pooled TCP target
pub type TcpTarget = WorkerPoolTarget<SocketHandler<TcpTransport>>;

/// Pooled UDP target
pub type UdpTarget = WorkerPoolTarget<SocketHandler<UdpTransport>>;

impl WorkerPoolTarget<SocketHandler<TcpTransport>> {
    pub fn tcp(name: impl Into<String>, addr: impl Into<String>, pool: WorkerPoolConfig) -> Self {
        Self::new(SocketHandler::new(name, TcpTransport::new(addr)), pool)
    }
}

impl WorkerPoolTarget<SocketHandler<UdpTransport>> {
    pub fn udp(name: impl Into<String>, addr: impl Into<String>, pool: WorkerPoolConfig) -> Self {
        Self::new(SocketHandler::new(name, UdpTransport::new(addr)), pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DistributionTarget;
    use std::io::Read;
    use std::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_target_streams_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let reader = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut received = String::new();
            conn.read_to_string(&mut received).unwrap();
            received
        });

        let target = TcpTarget::tcp("tcp", addr.to_string(), WorkerPoolConfig::new(1));
        target.open().await.unwrap();
        for text in ["one\n", "two\n", "three\n"] {
            target.on_message(Message::from(text)).await.unwrap();
        }
        target.close(DisconnectCode::SHUTDOWN, "").await.unwrap();

        assert_eq!(reader.join().unwrap(), "one\ntwo\nthree\n");
        assert_eq!(target.outcome_stats().unwrap().completed, 3);
    }

    #[tokio::test]
    async fn test_udp_target_sends_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = receiver.local_addr().unwrap();

        let target = UdpTarget::udp("udp", addr.to_string(), WorkerPoolConfig::new(2));
        target.open().await.unwrap();
        target.on_message(Message::from("ping")).await.unwrap();
        target.close(DisconnectCode::SHUTDOWN, "").await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"ping");
    }

    #[test]
    fn test_send_before_connect_is_not_connected() {
        let handler = SocketHandler::new("tcp", TcpTransport::new("127.0.0.1:9"));
        let err = handler.process(&Message::from("x")).unwrap_err();
        assert!(matches!(err, DeliveryError::NotConnected { .. }));

        let udp = UdpTransport::new("127.0.0.1:9");
        assert!(!udp.is_connected());
        assert!(matches!(
            udp.send(b"x"),
            Err(DeliveryError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_fails_when_nothing_listens() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = TcpTarget::tcp("tcp", format!("127.0.0.1:{port}"), WorkerPoolConfig::new(1));
        let err = target.open().await.unwrap_err();
        assert!(matches!(err, ContractError::TargetOpen { .. }));
    }

    #[test]
    fn test_unresolvable_address() {
        let transport = UdpTransport::new("not-an-address");
        assert!(transport.connect().is_err());
    }
}
