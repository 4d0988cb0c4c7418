//! Render target contract.
//!
//! Detection results end up on some surface: an overlay canvas, a GUI
//! widget, a headless recorder in tests. [`RenderTarget`] is the seam
//! between the pipeline and that surface. Drawing is synchronous; the
//! session calls it from its own task between ticks.

use crate::protocol::{Detection, LivenessConfig, MaskConfig, MaskFrame};

/// Surface that detection results are drawn onto.
///
/// The target keeps its own pixel dimensions; the session resizes it to
/// match the source whenever the two disagree, so normalized detection
/// coordinates scale to the surface the viewer actually sees.
pub trait RenderTarget: Send + 'static {
    /// Current surface dimensions in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Resize the surface. Called when the capture source dimensions
    /// change, before the next result is drawn.
    fn resize(&mut self, width: u32, height: u32);

    /// Draw bounding boxes and verdict labels for one liveness result,
    /// replacing whatever the previous result drew.
    fn render_detections(&mut self, detections: &[Detection], config: &LivenessConfig);

    /// Blend one segmentation mask over the surface, replacing the
    /// previous frame's mask.
    fn render_mask(&mut self, mask: &MaskFrame, config: &MaskConfig);

    /// Wipe the surface. Called when the source goes away or the
    /// session stops, so no stale overlay outlives the stream.
    fn clear(&mut self);
}
