//! Detection-mode configuration and result payloads.
//!
//! Two modes exist. *Liveness* returns a list of scored face boxes with
//! real-vs-fake probabilities; *mask* returns a rendered segmentation
//! overlay as an encoded JPEG. The active [`DetectConfig`] variant rides
//! inside every outbound frame envelope so the service applies the caller's
//! thresholds; the matching [`DetectionResult`] variant comes back inside
//! the result envelope.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ── Detection Config ──────────────────────────────────────────────

/// Per-frame detection configuration, keyed by the active mode.
///
/// Serialized as a string-keyed map with a `mode` tag so the service can
/// switch pipelines per frame. Callers may retune the numeric fields live
/// between frames; values are read fresh on every submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DetectConfig {
    /// Face anti-spoofing: bounding boxes + real/fake scores.
    Liveness(LivenessConfig),
    /// Segmentation overlay returned as an encoded image.
    Mask(MaskConfig),
}

impl DetectConfig {
    /// Short mode name, used in logs and routing diagnostics.
    pub fn mode(&self) -> &'static str {
        match self {
            DetectConfig::Liveness(_) => "liveness",
            DetectConfig::Mask(_) => "mask",
        }
    }

    /// Whether `result` is the payload shape this mode expects.
    pub fn matches(&self, result: &DetectionResult) -> bool {
        matches!(
            (self, result),
            (DetectConfig::Liveness(_), DetectionResult::Detections(_))
                | (DetectConfig::Mask(_), DetectionResult::Mask(_))
        )
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        DetectConfig::Liveness(LivenessConfig::default())
    }
}

/// Thresholds for the liveness pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LivenessConfig {
    /// Minimum detection score to keep a box (0.0-1.0).
    pub confidence_threshold: f32,

    /// IoU threshold for non-max suppression (0.0-1.0).
    pub iou_threshold: f32,

    /// Cap on detections returned per frame.
    pub max_detections: u32,

    /// Minimum real/fake score for a verdict to count (0.0-1.0).
    pub accuracy_threshold: f32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 100,
            accuracy_threshold: 0.5,
        }
    }
}

impl LivenessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum detection score.
    pub fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the NMS overlap threshold.
    pub fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the per-frame detection cap.
    pub fn with_max_detections(mut self, max: u32) -> Self {
        self.max_detections = max.max(1);
        self
    }

    /// Set the verdict score floor.
    pub fn with_accuracy(mut self, threshold: f32) -> Self {
        self.accuracy_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Tunables for the mask pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MaskConfig {
    /// Square input size the service scales frames to before inference.
    pub input_resolution: u32,

    /// Overlay opacity when blending the mask over the source (0.0-1.0).
    pub blend_alpha: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            input_resolution: 256,
            blend_alpha: 0.6,
        }
    }
}

impl MaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service-side input size.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.input_resolution = resolution.max(1);
        self
    }

    /// Set the overlay opacity.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.blend_alpha = alpha.clamp(0.0, 1.0);
        self
    }
}

// ── Detection Result ──────────────────────────────────────────────

/// Mode-specific result payload carried by an inbound envelope.
///
/// Liveness results arrive as an array of detection maps; mask results as a
/// single map. Untagged on the wire; the container shape disambiguates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DetectionResult {
    /// One scored box per detected face.
    Detections(Vec<Detection>),
    /// Rendered segmentation overlay.
    Mask(MaskFrame),
}

impl DetectionResult {
    /// Short payload name, used in logs and routing diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionResult::Detections(_) => "detections",
            DetectionResult::Mask(_) => "mask",
        }
    }
}

/// A single scored detection box with a liveness verdict.
///
/// Box coordinates are center-relative and normalized to the source frame:
/// `(x, y)` is the box center and `(w, h)` its extent, all in `0.0-1.0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Box center X, normalized.
    pub x: f32,

    /// Box center Y, normalized.
    pub y: f32,

    /// Box width, normalized.
    pub w: f32,

    /// Box height, normalized.
    pub h: f32,

    /// Detection score (0.0-1.0).
    pub prob: f32,

    /// Class label, e.g. `"face"`.
    pub class: String,

    /// Probability the face is live.
    pub real: f32,

    /// Probability the face is spoofed.
    pub fake: f32,
}

impl Detection {
    /// Whether the liveness verdict is "real".
    pub fn is_real(&self) -> bool {
        self.real > self.fake
    }

    /// Corner coordinates `(x1, y1, x2, y2)` in pixels for a target of the
    /// given dimensions.
    pub fn corners(&self, width: u32, height: u32) -> (f32, f32, f32, f32) {
        let (width, height) = (width as f32, height as f32);
        let x1 = (self.x - self.w / 2.0) * width;
        let y1 = (self.y - self.h / 2.0) * height;
        let x2 = (self.x + self.w / 2.0) * width;
        let y2 = (self.y + self.h / 2.0) * height;
        (x1, y1, x2, y2)
    }
}

/// A segmentation overlay frame as produced by the mask pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskFrame {
    /// Encoded JPEG bytes of the overlay, sized like the scaled input.
    pub mask: Bytes,
}

impl MaskFrame {
    pub fn new(mask: impl Into<Bytes>) -> Self {
        Self { mask: mask.into() }
    }
}

// ── Tests ─────────────────────────────────────────────────────────
