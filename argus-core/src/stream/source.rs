//! Capture source contract.
//!
//! The session pulls still frames from a [`FrameSource`] into a reused
//! [`FrameBuffer`] and listens for the source's lifecycle signals. A
//! webcam wrapper, a file decoder, or a synthetic generator all fit the
//! same seam; the pipeline only cares about encoded bytes and dimensions.

use async_trait::async_trait;

use crate::error::ArgusError;

// ── Source Events ─────────────────────────────────────────────────

/// Lifecycle signals emitted by the capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// The source started or resumed producing frames.
    Play,

    /// The source paused; frames stop but the source stays alive.
    Pause,

    /// The source is gone for good.
    Ended,
}

// ── Frame Buffer ──────────────────────────────────────────────────

/// Reusable off-screen buffer one captured frame is drawn into.
///
/// Exactly one buffer exists per session. It travels with the in-flight
/// submission and comes back when the attempt finishes, so two captures
/// can never write into it concurrently.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame of the given dimensions, clearing previous
    /// contents. Returns the byte buffer for the source to write into;
    /// the allocation is reused across frames.
    pub fn begin_frame(&mut self, width: u32, height: u32) -> &mut Vec<u8> {
        self.width = width;
        self.height = height;
        self.data.clear();
        &mut self.data
    }

    /// Encoded bytes of the current frame.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dimensions of the current frame in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Frame Source ──────────────────────────────────────────────────

/// Produces encoded still frames on demand.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Current pixel dimensions, or `None` when the source has no active
    /// stream. `None` pauses the session and clears the render target
    /// until the source signals [`SourceEvent::Play`] again.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Capture the current frame into `buffer` as encoded JPEG bytes,
    /// sized to the source's own dimensions.
    async fn capture(&mut self, buffer: &mut FrameBuffer) -> Result<(), ArgusError>;
}

// ── Tests ─────────────────────────────────────────────────────────
