//! Mock message source
//!
//! Emits numbered messages from a template at a fixed frequency in a
//! background thread. Used for testing and demos without a real producer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{
    CallbackSlot, ContractError, DisconnectCode, DistributionSource, Message, MessageCallback,
    SourceConfig,
};
use tracing::{debug, info, trace};

use crate::error::IngestionError;
use crate::{POLL_INTERVAL, emit, mark_open};

/// Mock source configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MockSourceConfig {
    /// Send frequency (Hz)
    pub frequency_hz: f64,
    /// Number of messages to emit
    pub count: u64,
    /// Message template; `{n}` is replaced by the sequence number (from 1)
    /// and `{name}` by the source name
    pub template: String,
}

impl MockSourceConfig {
    pub const DEFAULT_TEMPLATE: &'static str = r#"{"name":"{name}","symbol":"MOCK:ALERT","direction":"buy","price":{n},"timestamp":"2024-01-01T00:00:00Z"}"#;

    /// Build from `frequency_hz`, `count` and `template` params
    pub fn from_source_config(config: &SourceConfig) -> Result<Self, IngestionError> {
        let mut mock = Self::default();

        if let Some(raw) = config.param("frequency_hz") {
            mock.frequency_hz = raw
                .parse()
                .ok()
                .filter(|hz: &f64| hz.is_finite() && *hz > 0.0)
                .ok_or_else(|| {
                    IngestionError::invalid_param(
                        &config.name,
                        "frequency_hz",
                        format!("'{raw}' is not a positive number"),
                    )
                })?;
        }
        if let Some(raw) = config.param("count") {
            mock.count = raw.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                IngestionError::invalid_param(
                    &config.name,
                    "count",
                    format!("'{raw}' is not a positive integer"),
                )
            })?;
        }
        if let Some(template) = config.param("template") {
            mock.template = template.to_string();
        }
        Ok(mock)
    }

    fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency_hz).unwrap_or(Duration::ZERO)
    }
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            count: 10,
            template: Self::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Mock source
///
/// Generates `count` messages at the configured frequency, then idles until
/// closed.
pub struct MockSource {
    name: String,
    config: MockSourceConfig,
    slot: CallbackSlot,
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MockSource {
    pub fn new(name: impl Into<String>, config: MockSourceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            slot: CallbackSlot::new(),
            running: Arc::new(AtomicBool::new(false)),
            emitted: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// Messages emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    fn render(name: &str, template: &str, seq: u64) -> String {
        template
            .replace("{name}", name)
            .replace("{n}", &seq.to_string())
    }

    fn start(&self) -> Result<(), IngestionError> {
        let callback = self.slot.get().ok_or_else(|| IngestionError::NoCallback {
            source_name: self.name.clone(),
        })?;

        let name = self.name.clone();
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let emitted = Arc::clone(&self.emitted);

        let handle = thread::Builder::new()
            .name(format!("{}-mock", self.name))
            .spawn(move || generate(&name, &config, &callback, &running, &emitted))
            .map_err(|e| IngestionError::Thread {
                source_name: self.name.clone(),
                message: e.to_string(),
            })?;

        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }
}

fn generate(
    name: &str,
    config: &MockSourceConfig,
    callback: &MessageCallback,
    running: &AtomicBool,
    emitted: &AtomicU64,
) {
    let interval = config.interval();
    debug!(
        source_name = %name,
        frequency_hz = config.frequency_hz,
        count = config.count,
        "mock source started"
    );

    for seq in 1..=config.count {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        emit(name, callback, Message::from(MockSource::render(name, &config.template, seq)));
        emitted.store(seq, Ordering::SeqCst);
        trace!(source_name = %name, seq, "mock message sent");

        sleep_while_running(interval, running);
    }

    debug!(source_name = %name, emitted = emitted.load(Ordering::SeqCst), "mock source finished");
}

/// Sleep in short steps so `close` is not held up by a low frequency
fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(POLL_INTERVAL);
        thread::sleep(step);
        remaining -= step;
    }
}

impl DistributionSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), ContractError> {
        mark_open(&self.name, &self.running)?;
        self.emitted.store(0, Ordering::SeqCst);
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
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ContractError::source_close(&self.name, "mock thread panicked"))?;
        }
        info!(source_name = %self.name, emitted = self.emitted(), %code, reason, "MockSource closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceType;
    use std::collections::HashMap;

    fn collect(source: &MockSource) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source
            .set_on_message(Arc::new(move |message: Message| {
                sink.lock().unwrap().push(message.to_string());
            }))
            .unwrap();
        seen
    }

    #[test]
    fn test_mock_source_emits_count_messages() {
        let source = MockSource::new(
            "mock",
            MockSourceConfig {
                frequency_hz: 200.0,
                count: 3,
                template: "{name}-{n}".to_string(),
            },
        );
        let seen = collect(&source);

        source.open().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while source.emitted() < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        source.close(DisconnectCode::SHUTDOWN, "done").unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["mock-1", "mock-2", "mock-3"]);
        assert!(!source.is_open());
    }

    #[test]
    fn test_close_stops_slow_source() {
        let source = MockSource::new(
            "slow",
            MockSourceConfig {
                frequency_hz: 0.1,
                count: 100,
                ..Default::default()
            },
        );
        let seen = collect(&source);

        source.open().unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = std::time::Instant::now();
        source.close(DisconnectCode::SHUTDOWN, "").unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_default_template_is_alert_json() {
        let rendered = MockSource::render("mock", MockSourceConfig::DEFAULT_TEMPLATE, 7);
        assert!(rendered.contains(r#""name":"mock""#));
        assert!(rendered.contains(r#""price":7"#));
    }

    #[test]
    fn test_config_from_params() {
        let mut params = HashMap::new();
        params.insert("count".to_string(), "5".to_string());
        params.insert("frequency_hz".to_string(), "2.5".to_string());
        let config = SourceConfig {
            name: "mock".to_string(),
            source_type: SourceType::Mock,
            params,
        };

        let mock = MockSourceConfig::from_source_config(&config).unwrap();
        assert_eq!(mock.count, 5);
        assert_eq!(mock.frequency_hz, 2.5);
        assert_eq!(mock.template, MockSourceConfig::DEFAULT_TEMPLATE);

        let mut bad = config.clone();
        bad.params.insert("count".to_string(), "0".to_string());
        assert!(matches!(
            MockSourceConfig::from_source_config(&bad),
            Err(IngestionError::InvalidParam { param: "count", .. })
        ));
    }
}
