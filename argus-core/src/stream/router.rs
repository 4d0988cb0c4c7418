//! Dispatches accepted results to the render target.
//!
//! By the time a result reaches the router it has already been decoded
//! and passed the staleness filter. The router's job is mode dispatch:
//! liveness payloads go to the box renderer, mask payloads to the
//! overlay blender. A payload that does not match the active mode is a
//! leftover from a config switch mid-flight; it is logged and dropped,
//! never an error.

use tracing::{debug, warn};

use crate::protocol::{DetectConfig, DetectionResult};
use crate::stream::render::RenderTarget;

// ── Route Outcome ─────────────────────────────────────────────────

/// What happened to one routed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The result reached the render target.
    Rendered,

    /// The payload shape did not match the active mode; nothing drawn.
    ModeMismatch,
}

// ── Result Router ─────────────────────────────────────────────────

/// Owns the render target and all drawing decisions.
#[derive(Debug)]
pub struct ResultRouter<T> {
    target: T,
}

impl<T: RenderTarget> ResultRouter<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    /// Dispatch one result according to the active mode.
    pub fn route(&mut self, result: &DetectionResult, config: &DetectConfig) -> RouteOutcome {
        match (config, result) {
            (DetectConfig::Liveness(cfg), DetectionResult::Detections(detections)) => {
                self.target.render_detections(detections, cfg);
                RouteOutcome::Rendered
            }
            (DetectConfig::Mask(cfg), DetectionResult::Mask(frame)) => {
                self.target.render_mask(frame, cfg);
                RouteOutcome::Rendered
            }
            _ => {
                warn!(
                    mode = config.mode(),
                    payload = result.kind(),
                    "result discarded: payload does not match active mode"
                );
                RouteOutcome::ModeMismatch
            }
        }
    }

    /// Match the target's dimensions to the capture source. No-op when
    /// they already agree.
    pub fn fit_to(&mut self, width: u32, height: u32) {
        if self.target.dimensions() != (width, height) {
            debug!(width, height, "render target resized to source");
            self.target.resize(width, height);
        }
    }

    /// Wipe the target surface.
    pub fn clear(&mut self) {
        self.target.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────
