//! Wire protocol for the frame streaming service.
//!
//! Every session holds one persistent duplex WebSocket. Frames flow out,
//! results flow back, each as a single self-contained binary envelope
//! serialized with `serde` + MessagePack (string-keyed maps):
//!
//! ```text
//! Client ──[FrameEnvelope]───────────────────► Service    (paced)
//!   { bytes: bin, config: map, timestamp: uint }
//!
//! Service ──[ResultEnvelope]─────────────────► Client     (async)
//!   { timestamp: uint, result: array | map }
//! ```
//!
//! The service echoes each frame's `timestamp` in its result envelope;
//! nothing else correlates requests with responses. Results may arrive
//! out of order relative to submission; ordering and staleness are the
//! receiver's problem, not the protocol's.

pub mod detect;
pub mod envelope;

// Re-export the most commonly used types at the protocol level.
pub use detect::{
    DetectConfig, Detection, DetectionResult, LivenessConfig, MaskConfig, MaskFrame,
};
pub use envelope::{FrameEnvelope, ResultEnvelope};
