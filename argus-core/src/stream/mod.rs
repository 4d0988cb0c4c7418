//! # Streaming pipeline
//!
//! Everything between a live capture source and the overlay the viewer
//! sees. One [`StreamSession`] per source.
//!
//! ## Architecture
//!
//! ```text
//! CLIENT                                          SERVICE (remote)
//! ┌──────────────────────────────┐               ┌─────────────────┐
//! │ FrameSource.capture          │               │                 │
//! │   ↓            tick-paced by │  WebSocket    │   inference     │
//! │ FrameEnvelope  FrameScheduler│ ───────────►  │   pipeline      │
//! │   ↓                          │               │                 │
//! │ ConnectionManager.send       │  ◄─────────── │                 │
//! │                              │ ResultEnvelope└─────────────────┘
//! │ StalenessFilter → ResultRouter → RenderTarget                  │
//! └──────────────────────────────┘                                 │
//! ```
//!
//! ## Sub-modules
//!
//! | Module    | Purpose                                             |
//! |-----------|-----------------------------------------------------|
//! | `source`  | Capture source contract and reusable frame buffer   |
//! | `render`  | Render target contract                              |
//! | `pacing`  | Adaptive frame rate scheduler and single-flight gate|
//! | `router`  | Mode dispatch of accepted results to the target     |
//! | `session` | The per-source orchestrator actor                   |

pub mod pacing;
pub mod render;
pub mod router;
pub mod session;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────

pub use pacing::{FrameScheduler, PacingConfig};
pub use render::RenderTarget;
pub use router::{ResultRouter, RouteOutcome};
pub use session::{SessionConfig, SessionHandle, SessionStats, StreamSession};
pub use source::{FrameBuffer, FrameSource, SourceEvent};
