//! Binary envelopes exchanged over the duplex connection.
//!
//! Encoding is MessagePack with string-keyed maps and raw `bin` blobs,
//! chosen over text JSON to keep per-frame overhead small. The codec is
//! pure and stateless: envelopes are opaque to the transport and the
//! image bytes are opaque to the codec. Both directions are symmetric so
//! a test peer can decode frames and synthesize results.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ArgusError;
use crate::protocol::detect::{DetectConfig, DetectionResult};

// ── Frame Envelope ────────────────────────────────────────────────

/// Outbound message: one captured frame plus the configuration the
/// service should apply to it.
///
/// Built fresh per submission and dropped after send; nothing retains it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameEnvelope {
    /// Encoded image bytes (JPEG) of the captured frame.
    pub bytes: Bytes,

    /// Detection configuration in effect for this frame.
    pub config: DetectConfig,

    /// Submission time in epoch milliseconds. Strictly increasing per
    /// session; echoed back verbatim in the matching result envelope.
    pub timestamp: u64,
}

impl FrameEnvelope {
    pub fn new(bytes: impl Into<Bytes>, config: DetectConfig, timestamp: u64) -> Self {
        Self {
            bytes: bytes.into(),
            config,
            timestamp,
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArgusError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgusError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// ── Result Envelope ───────────────────────────────────────────────

/// Inbound message: the detection result for one submitted frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEnvelope {
    /// The originating frame's submission timestamp, echoed back. Drives
    /// staleness and ordering decisions on the client.
    pub timestamp: u64,

    /// Mode-specific structured payload.
    pub result: DetectionResult,
}

impl ResultEnvelope {
    pub fn new(timestamp: u64, result: DetectionResult) -> Self {
        Self { timestamp, result }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArgusError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from wire bytes. Fails with [`ArgusError::Decode`] on
    /// truncated or structurally invalid input; callers treat that as
    /// "no result arrived", never as a session failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgusError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────
