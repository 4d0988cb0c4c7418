//! # argus-core
//!
//! Client-side engine for streaming live video frames to a remote
//! detection service and rendering the results in real time.
//!
//! This crate contains:
//! - **Protocol**: `FrameEnvelope` / `ResultEnvelope` msgpack wire types
//!   and the mode-keyed `DetectConfig` / `DetectionResult` payloads
//! - **Network**: `ConnectionManager` for one persistent duplex
//!   WebSocket per session
//! - **State**: `SessionState` and `LinkState` transition machines
//! - **Stream**: `FrameScheduler` adaptive pacing, `StalenessFilter`
//!   result gating, `ResultRouter` mode dispatch, and the
//!   `StreamSession` actor tying them together
//! - **Error**: `ArgusError`, the typed `thiserror`-based error hierarchy

pub mod error;
pub mod filter;
pub mod network;
pub mod protocol;
pub mod state;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::ArgusError;
pub use filter::StalenessFilter;
pub use network::{ConnectionManager, LinkEvent};
pub use protocol::{
    DetectConfig, Detection, DetectionResult, FrameEnvelope, LivenessConfig, MaskConfig,
    MaskFrame, ResultEnvelope,
};
pub use state::{LinkState, SessionState};
pub use stream::{
    FrameBuffer, FrameScheduler, FrameSource, PacingConfig, RenderTarget, ResultRouter,
    RouteOutcome, SessionConfig, SessionHandle, SessionStats, SourceEvent, StreamSession,
};
