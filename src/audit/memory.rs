//! In-memory [`LogSink`] for tests and local development.
//!
//! Behaves like the real sink for setup (a second create reports "already
//! exists") and records every appended event so it can be inspected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::sink::{LogSink, SinkError};

/// One appended event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub group: String,
    pub stream: String,
    pub timestamp_ms: i64,
    pub message: String,
}

#[derive(Default)]
struct State {
    groups: HashSet<String>,
    streams: HashSet<(String, String)>,
    events: Vec<LogEvent>,
}

#[derive(Default)]
pub struct MemoryLogSink {
    state: Mutex<State>,
    create_group_calls: AtomicUsize,
    create_stream_calls: AtomicUsize,
    fail_setup: AtomicBool,
    fail_appends: AtomicBool,
    setup_delay: Option<Duration>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slow down group creation, to widen the window for concurrent setup.
    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = Some(delay);
        self
    }

    pub fn fail_setup(&self, fail: bool) {
        self.fail_setup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn create_group_calls(&self) -> usize {
        self.create_group_calls.load(Ordering::SeqCst)
    }

    pub fn create_stream_calls(&self) -> usize {
        self.create_stream_calls.load(Ordering::SeqCst)
    }

    pub fn has_stream(&self, group: &str, stream: &str) -> bool {
        self.lock()
            .streams
            .contains(&(group.to_string(), stream.to_string()))
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().events.clone()
    }

    /// Raw payloads of all appended events, in order.
    pub fn messages(&self) -> Vec<String> {
        self.lock().events.iter().map(|e| e.message.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn create_log_group(&self, group: &str) -> Result<(), SinkError> {
        self.create_group_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.setup_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_setup.load(Ordering::SeqCst) {
            return Err(SinkError::Other("access denied".to_string()));
        }

        if self.lock().groups.insert(group.to_string()) {
            Ok(())
        } else {
            Err(SinkError::AlreadyExists)
        }
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.create_stream_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if !state.groups.contains(group) {
            return Err(SinkError::Other(format!("log group {group} does not exist")));
        }
        if state.streams.insert((group.to_string(), stream.to_string())) {
            Ok(())
        } else {
            Err(SinkError::AlreadyExists)
        }
    }

    async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        timestamp_ms: i64,
        message: &str,
    ) -> Result<(), SinkError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SinkError::Other("throttled".to_string()));
        }

        let mut state = self.lock();
        if !state.streams.contains(&(group.to_string(), stream.to_string())) {
            return Err(SinkError::Other(format!("log stream {stream} does not exist")));
        }
        state.events.push(LogEvent {
            group: group.to_string(),
            stream: stream.to_string(),
            timestamp_ms,
            message: message.to_string(),
        });
        Ok(())
    }
}
