//! Usage audit logging.
//!
//! # Pieces
//!
//! - [`AuditRecord`]: the redacted per-request record
//! - [`AuditLog`]: owned handle on a log group/stream with one-time setup
//! - [`LogSink`]: the storage contract (create group, create stream, append)
//! - [`CloudWatchSink`]: AWS CloudWatch Logs implementation
//! - [`MemoryLogSink`]: in-process implementation for tests
//!
//! # Flow
//!
//! ```text
//! first append ──▶ create group ──▶ create stream ──▶ put event
//!                 ("already exists" is success)
//! later appends ─────────────────────────────────▶ put event
//! ```

mod cloudwatch;
mod memory;
mod record;
mod sink;

pub use cloudwatch::CloudWatchSink;
pub use memory::{LogEvent, MemoryLogSink};
pub use record::{ApplicationSummary, AuditRecord, RequestSummary, UserSummary};
pub use sink::{AuditErrorCallback, AuditLog, AuditMode, LogSink, SinkError};
