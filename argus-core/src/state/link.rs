//! Connection lifecycle state machine.
//!
//! Models the WebSocket link owned by a `ConnectionManager`, with
//! validated transitions that return `Result` instead of panicking.

use std::time::Instant;

use crate::error::ArgusError;

// ── LinkState ────────────────────────────────────────────────────

/// The current phase of the duplex link.
///
/// ```text
///  Disconnected ──► Connecting ──► Open
///       ▲               │            │
///       │               ▼            ▼
///       └─────────── Closing ◄───────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// WebSocket handshake in progress.
    Connecting,

    /// Link established; frames and results may flow.
    Open {
        /// When the link entered the `Open` state.
        since: Instant,
    },

    /// Local close requested; waiting for the socket tasks to wind down.
    Closing,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl LinkState {
    /// State name as used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Open { .. } => "Open",
            Self::Closing => "Closing",
        }
    }

    /// Returns `true` when the link is established and ready for traffic.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` when there is no connection at all.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Returns `true` while a connect is pending or the link is up. Used
    /// for the idempotent-connect check.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open { .. })
    }

    /// How long the link has been `Open`, or `None` in any other state.
    pub fn open_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Open { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn invalid(&self, to: &'static str) -> ArgusError {
        ArgusError::InvalidTransition {
            from: self.name(),
            to,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.invalid("Connecting")),
        }
    }

    /// Transition to `Open`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Connecting => {
                *self = Self::Open {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid("Open")),
        }
    }

    /// Transition to `Closing`.
    ///
    /// Valid from: `Connecting` (abandons the pending connect), `Open`.
    pub fn begin_close(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Connecting | Self::Open { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            _ => Err(self.invalid("Closing")),
        }
    }

    /// Transition to `Disconnected`.
    ///
    /// Valid from: `Closing`, `Connecting` (connect failed).
    pub fn finish_close(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Closing | Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(self.invalid("Disconnected")),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Used when the remote end closes or the socket errors mid-stream.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
