//! TcpLineSource - newline-delimited messages from TCP clients
//!
//! Listens on a socket; every line received from any connected client becomes
//! one message. Trailing `\r\n` is stripped and blank lines are skipped. A
//! client whose line exceeds [`MAX_LINE_BYTES`] is disconnected.

use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use contracts::{
    CallbackSlot, ContractError, DisconnectCode, DistributionSource, Message, MessageCallback,
};
use tracing::{debug, info, warn};

use crate::error::IngestionError;
use crate::{POLL_INTERVAL, emit, mark_open};

/// Longest accepted line, excluding the newline
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// TCP line-protocol source
pub struct TcpLineSource {
    name: String,
    bind: String,
    slot: CallbackSlot,
    running: Arc<AtomicBool>,
    local_addr: Mutex<Option<SocketAddr>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TcpLineSource {
    /// Create a source listening on `bind` (`host:port`) once opened
    pub fn new(name: impl Into<String>, bind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind: bind.into(),
            slot: CallbackSlot::new(),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Mutex::new(None),
            acceptor: Mutex::new(None),
        }
    }

    /// Address actually bound, available while open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    fn start(&self) -> Result<(), IngestionError> {
        let callback = self.slot.get().ok_or_else(|| IngestionError::NoCallback {
            source_name: self.name.clone(),
        })?;

        let bind_error = |source: io::Error| IngestionError::Bind {
            source_name: self.name.clone(),
            addr: self.bind.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.bind).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let acceptor = Acceptor {
            name: self.name.clone(),
            callback,
            running: Arc::clone(&self.running),
        };
        let handle = thread::Builder::new()
            .name(format!("{}-accept", self.name))
            .spawn(move || acceptor.run(listener))
            .map_err(|e| IngestionError::Thread {
                source_name: self.name.clone(),
                message: e.to_string(),
            })?;

        *lock(&self.local_addr) = Some(local_addr);
        *lock(&self.acceptor) = Some(handle);
        info!(source_name = %self.name, addr = %local_addr, "Listening for line messages");
        Ok(())
    }
}

impl DistributionSource for TcpLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), ContractError> {
        mark_open(&self.name, &self.running)?;
        self.start().map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            ContractError::from(e)
        })
    }

    fn set_on_message(&self, callback: MessageCallback) -> Result<(), ContractError> {
        self.slot.set(&self.name, callback)
    }

    fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError> {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.local_addr).take();

        let handle = lock(&self.acceptor).take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ContractError::source_close(&self.name, "accept thread panicked"))?;
        }
        info!(source_name = %self.name, %code, reason, "TcpLineSource closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct Acceptor {
    name: String,
    callback: MessageCallback,
    running: Arc<AtomicBool>,
}

impl Acceptor {
    fn run(self, listener: TcpListener) {
        let mut connections: Vec<JoinHandle<()>> = Vec::new();

        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => match self.spawn_reader(stream, peer) {
                    Ok(handle) => connections.push(handle),
                    Err(e) => warn!(source_name = %self.name, %peer, error = %e, "Client rejected"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!(source_name = %self.name, error = %e, "Accept failed");
                    thread::sleep(POLL_INTERVAL);
                }
            }
            connections.retain(|c| !c.is_finished());
        }

        for connection in connections {
            let _ = connection.join();
        }
        debug!(source_name = %self.name, "Accept loop stopped");
    }

    fn spawn_reader(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<JoinHandle<()>> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        debug!(source_name = %self.name, %peer, "Client connected");

        let name = self.name.clone();
        let callback = Arc::clone(&self.callback);
        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name(format!("{}-{}", self.name, peer))
            .spawn(move || read_lines(&name, stream, &callback, &running))
    }
}

fn read_lines(name: &str, stream: TcpStream, callback: &MessageCallback, running: &AtomicBool) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    while running.load(Ordering::SeqCst) {
        let room = (MAX_LINE_BYTES + 1).saturating_sub(line.len()) as u64;
        match (&mut reader).take(room).read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) if line.ends_with(b"\n") => {
                forward_line(name, callback, &line);
                line.clear();
            }
            Ok(_) if line.len() > MAX_LINE_BYTES => {
                warn!(source_name = %name, limit = MAX_LINE_BYTES, "Line too long, dropping client");
                line.clear();
                break;
            }
            // EOF in the middle of a line; the next read returns 0
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                warn!(source_name = %name, error = %e, "Read failed, dropping client");
                line.clear();
                break;
            }
        }
    }

    forward_line(name, callback, &line);
    debug!(source_name = %name, "Client disconnected");
}

fn forward_line(name: &str, callback: &MessageCallback, line: &[u8]) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    if !text.trim().is_empty() {
        emit(name, callback, Message::from(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Duration;

    fn collecting_source() -> (TcpLineSource, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let source = TcpLineSource::new("lines", "127.0.0.1:0");
        source
            .set_on_message(Arc::new(move |message: Message| {
                let _ = tx.lock().unwrap().send(message.to_string());
            }))
            .unwrap();
        (source, rx)
    }

    #[test]
    fn test_lines_become_messages() {
        let (source, rx) = collecting_source();
        source.open().unwrap();
        assert!(source.is_open());

        let addr = source.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"first\r\n\nsecond\nthird").unwrap();
        drop(client);

        let timeout = Duration::from_secs(5);
        let received: Vec<String> = (0..3).map(|_| rx.recv_timeout(timeout).unwrap()).collect();
        assert_eq!(received, vec!["first", "second", "third"]);

        source.close(DisconnectCode::SHUTDOWN, "test").unwrap();
        assert!(!source.is_open());
        assert!(source.local_addr().is_none());
    }

    #[test]
    fn test_oversized_line_drops_client() {
        let (source, rx) = collecting_source();
        source.open().unwrap();
        let addr = source.local_addr().unwrap();

        let mut flooder = TcpStream::connect(addr).unwrap();
        let mut flood = vec![b'x'; MAX_LINE_BYTES + 10];
        flood.extend_from_slice(b"\nignored\n");
        let _ = flooder.write_all(&flood);

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"after\n").unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "after");
        std::thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err());

        drop(flooder);
        drop(client);
        source.close(DisconnectCode::SHUTDOWN, "test").unwrap();
    }

    #[test]
    fn test_open_requires_callback() {
        let source = TcpLineSource::new("lines", "127.0.0.1:0");
        let err = source.open().unwrap_err();
        assert!(err.to_string().contains("no message callback"));
        assert!(!source.is_open());
    }

    #[test]
    fn test_open_twice_fails() {
        let (source, _rx) = collecting_source();
        source.open().unwrap();
        assert!(source.open().is_err());
        source.close(DisconnectCode::SHUTDOWN, "").unwrap();

        // reopen after close
        source.open().unwrap();
        source.close(DisconnectCode::SHUTDOWN, "").unwrap();
    }

    #[test]
    fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let (tx, _rx) = mpsc::channel::<String>();
        let tx = Mutex::new(tx);
        let source = TcpLineSource::new("lines", taken.local_addr().unwrap().to_string());
        source
            .set_on_message(Arc::new(move |m: Message| {
                let _ = tx.lock().unwrap().send(m.to_string());
            }))
            .unwrap();

        let err = source.open().unwrap_err();
        assert!(matches!(err, ContractError::SourceOpen { .. }));
        assert!(!source.is_open());
    }
}
