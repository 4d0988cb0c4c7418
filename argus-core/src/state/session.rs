//! Streaming session lifecycle state machine.
//!
//! Owned exclusively by a `StreamSession`; every mutation happens inside
//! the session task in response to a lifecycle command, a source event, or
//! a link event. Transitions are validated and return `Result`; callers
//! that want idempotent behavior check the predicates first.

use crate::error::ArgusError;

// ── SessionState ─────────────────────────────────────────────────

/// Lifecycle of one streaming session.
///
/// ```text
///            start              link open
///   Idle ───────────► Connecting ────────► Streaming
///                         ▲                 │     ▲
///                         │ resume          │     │
///                         │ (link down)   pause resume
///                         │                 ▼     │
///                         └─────────────── Paused ┘
///
///   any state ──ended/dispose──► Closed   (terminal; start() may reopen)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Initial state; no connection, no ticking.
    #[default]
    Idle,

    /// Waiting for the link to open before streaming begins.
    Connecting,

    /// Tick loop armed; frames are captured and submitted.
    Streaming,

    /// Ticking halted, link kept as-is. Inbound results still render.
    Paused,

    /// Torn down. Dead to every event except a fresh `start()`.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl SessionState {
    /// State name as used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Streaming => "Streaming",
            Self::Paused => "Paused",
            Self::Closed => "Closed",
        }
    }

    /// Returns `true` while the tick loop should run.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns `true` once the session has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` when `start()` would do something (idempotency
    /// check: starting while `Connecting`/`Streaming`/`Paused` is a no-op).
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }

    fn invalid(&self, to: &'static str) -> ArgusError {
        ArgusError::InvalidTransition {
            from: self.name(),
            to,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting` in response to `start()`.
    ///
    /// Valid from: `Idle`, `Closed`.
    pub fn begin_start(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Idle | Self::Closed => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.invalid("Connecting")),
        }
    }

    /// Transition to `Streaming` once the link reports open.
    ///
    /// Valid from: `Connecting`.
    pub fn stream_opened(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Connecting => {
                *self = Self::Streaming;
                Ok(())
            }
            _ => Err(self.invalid("Streaming")),
        }
    }

    /// Transition to `Paused` in response to a source pause.
    ///
    /// Valid from: `Streaming`.
    pub fn pause(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Streaming => {
                *self = Self::Paused;
                Ok(())
            }
            _ => Err(self.invalid("Paused")),
        }
    }

    /// Transition back to `Streaming` when the source resumes and the
    /// link is still open.
    ///
    /// Valid from: `Paused`.
    pub fn resume(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Paused => {
                *self = Self::Streaming;
                Ok(())
            }
            _ => Err(self.invalid("Streaming")),
        }
    }

    /// Transition to `Connecting` when the source resumes but the link
    /// has died in the meantime. Streaming never skips the connect step.
    ///
    /// Valid from: `Paused`.
    pub fn begin_reconnect(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Paused => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.invalid("Connecting")),
        }
    }

    /// Transition to `Paused` in response to `stop()`: ticking halts, the
    /// connection is preserved.
    ///
    /// Valid from: any state except `Closed`.
    pub fn halt(&mut self) -> Result<(), ArgusError> {
        match self {
            Self::Closed => Err(self.invalid("Paused")),
            _ => {
                *self = Self::Paused;
                Ok(())
            }
        }
    }

    /// Force the terminal `Closed` state regardless of current state.
    ///
    /// Used for the source `ended` event and `dispose()`. Idempotent.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

// ── Tests ────────────────────────────────────────────────────────
