//! Domain-specific error types for the streaming pipeline.
//!
//! All fallible operations return `Result<T, ArgusError>`.
//! No panics on invalid input: every error is typed and recoverable, and
//! nothing here is fatal to the host process.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the streaming pipeline.
#[derive(Debug, Error)]
pub enum ArgusError {
    // ── Connection Errors ────────────────────────────────────────
    /// The WebSocket failed to open.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The socket failed after it had opened.
    #[error("socket error: {0}")]
    Socket(String),

    /// A send was attempted while the link was not open. The frame is
    /// dropped, never queued.
    #[error("send dropped: link not open")]
    SendDropped,

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Codec Errors ─────────────────────────────────────────────
    /// Encoding an outbound envelope failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// An inbound envelope was structurally invalid (truncated, wrong
    /// tag, unsupported shape).
    #[error("decode error: {0}")]
    Decode(String),

    // ── Pipeline Errors ──────────────────────────────────────────
    /// The capture source has no active stream.
    #[error("capture source unavailable")]
    SourceUnavailable,

    /// A lifecycle transition the state machine forbids.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for ArgusError {
    fn from(s: String) -> Self {
        ArgusError::Other(s)
    }
}

impl From<&str> for ArgusError {
    fn from(s: &str) -> Self {
        ArgusError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ArgusError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ArgusError::ChannelClosed
    }
}

impl From<rmp_serde::encode::Error> for ArgusError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ArgusError::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ArgusError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ArgusError::Decode(e.to_string())
    }
}
