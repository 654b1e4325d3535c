use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument, warn};

use super::record::AuditRecord;
use crate::error::{IntegrationError, IntegrationResult};
use crate::metrics;

/// Failure reported by a log sink backend.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The group or stream already exists. Setup treats this as success.
    #[error("resource already exists")]
    AlreadyExists,

    #[error("{0}")]
    Other(String),
}

/// Durable, append-only log destination addressed by group and stream.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn create_log_group(&self, group: &str) -> Result<(), SinkError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;

    async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        timestamp_ms: i64,
        message: &str,
    ) -> Result<(), SinkError>;
}

/// Called with the failure of a detached append.
pub type AuditErrorCallback = Arc<dyn Fn(&IntegrationError) + Send + Sync>;

/// How the middleware waits on the audit append.
#[derive(Clone, Default)]
pub enum AuditMode {
    /// The append completes before the handler runs; a failure fails the request.
    #[default]
    Awaited,
    /// The append runs in a spawned task; failures are logged and passed to the callback.
    Detached(Option<AuditErrorCallback>),
}

impl fmt::Debug for AuditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditMode::Awaited => f.write_str("Awaited"),
            AuditMode::Detached(cb) => f
                .debug_tuple("Detached")
                .field(&cb.as_ref().map(|_| "callback"))
                .finish(),
        }
    }
}

/// Handle on one log group/stream pair.
///
/// Created once by the host application and shared (`Arc<AuditLog>`) with
/// the middleware. The group/stream are fixed at construction, so there is no
/// way to re-initialise it with different parameters.
///
/// Group and stream creation runs at most once successfully: concurrent
/// first appends wait on the same in-flight setup. A failed setup is
/// reported to every waiter and retried by the next append.
pub struct AuditLog {
    sink: Arc<dyn LogSink>,
    log_group: String,
    log_stream: String,
    ready: OnceCell<()>,
    mode: AuditMode,
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("log_group", &self.log_group)
            .field("log_stream", &self.log_stream)
            .field("ready", &self.ready.initialized())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    pub fn new(
        sink: Arc<dyn LogSink>,
        log_group: impl Into<String>,
        log_stream: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            log_group: log_group.into(),
            log_stream: log_stream.into(),
            ready: OnceCell::new(),
            mode: AuditMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: AuditMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> &AuditMode {
        &self.mode
    }

    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    pub fn log_stream(&self) -> &str {
        &self.log_stream
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Make sure the log group and stream exist.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::LogSink` for any sink failure other than
    /// "already exists".
    pub async fn ensure_ready(&self) -> IntegrationResult<()> {
        self.ready
            .get_or_try_init(|| self.create_destination())
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), fields(group = %self.log_group, stream = %self.log_stream))]
    async fn create_destination(&self) -> IntegrationResult<()> {
        match self.sink.create_log_group(&self.log_group).await {
            Ok(()) => debug!("Log group created"),
            Err(SinkError::AlreadyExists) => debug!("Log group already exists"),
            Err(e) => {
                error!(error = %e, "Audit log initialization failed creating log group");
                return Err(IntegrationError::LogSink(format!(
                    "creating log group '{}': {e}",
                    self.log_group
                )));
            }
        }

        match self
            .sink
            .create_log_stream(&self.log_group, &self.log_stream)
            .await
        {
            Ok(()) => debug!("Log stream created"),
            Err(SinkError::AlreadyExists) => debug!("Log stream already exists"),
            Err(e) => {
                error!(error = %e, "Audit log initialization failed creating log stream");
                return Err(IntegrationError::LogSink(format!(
                    "creating log stream '{}': {e}",
                    self.log_stream
                )));
            }
        }

        debug!("Audit log initialized");
        Ok(())
    }

    /// Append one message, stamped with the current time in milliseconds.
    pub async fn append(&self, message: &str) -> IntegrationResult<()> {
        self.ensure_ready().await?;

        let started = Instant::now();
        let result = self
            .sink
            .put_log_event(
                &self.log_group,
                &self.log_stream,
                Utc::now().timestamp_millis(),
                message,
            )
            .await;
        metrics::record_audit_append_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::record_audit_record("appended");
                debug!("Audit record appended");
                Ok(())
            }
            Err(e) => {
                metrics::record_audit_record("failed");
                error!(error = %e, "Error appending audit record");
                Err(IntegrationError::LogSink(e.to_string()))
            }
        }
    }

    /// Serialize and append a record.
    pub async fn log(&self, record: &AuditRecord) -> IntegrationResult<()> {
        let message = serde_json::to_string(record)?;
        self.append(&message).await
    }

    /// Log a record according to the configured [`AuditMode`].
    ///
    /// In detached mode this returns immediately.
    pub async fn submit(self: &Arc<Self>, record: AuditRecord) -> IntegrationResult<()> {
        match &self.mode {
            AuditMode::Awaited => self.log(&record).await,
            AuditMode::Detached(callback) => {
                let audit = Arc::clone(self);
                let callback = callback.clone();
                tokio::spawn(async move {
                    if let Err(e) = audit.log(&record).await {
                        warn!(error = %e, "Detached audit append failed");
                        if let Some(callback) = callback {
                            callback(&e);
                        }
                    }
                });
                Ok(())
            }
        }
    }
}
