//! Adaptive frame pacing.
//!
//! On every tick of the render clock the scheduler decides whether to
//! capture and submit a new frame. Two gates apply: enough time must have
//! passed for the current target rate, and no submission may already be
//! in flight. The target rate itself adapts to the observed round trip
//! (send to accepted result) so a slow service is never flooded.

use std::time::{Duration, Instant};

use tracing::trace;

// ── Pacing Config ─────────────────────────────────────────────────

/// Bounds and defaults for the adaptive rate policy, in frames/second.
///
/// Rates are expected finite and positive with `min_rate <= max_rate`.
/// A scheduler built from values outside that shape corrects them
/// instead of panicking: each bad field falls back to its default, and
/// an inverted range is reordered.
#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    /// Floor the rate never drops below, however slow the service.
    pub min_rate: f64,

    /// Ceiling the rate never exceeds, however fast the service.
    pub max_rate: f64,

    /// Rate applied until the first round trip has been measured.
    pub initial_rate: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_rate: 1.0,
            max_rate: 30.0,
            initial_rate: 5.0,
        }
    }
}

impl PacingConfig {
    /// Copy with non-finite or non-positive rates replaced by their
    /// defaults and the bounds reordered if inverted.
    fn sanitized(self) -> Self {
        let defaults = Self::default();
        let rate_or = |rate: f64, fallback: f64| {
            if rate.is_finite() && rate > 0.0 {
                rate
            } else {
                fallback
            }
        };
        let min_rate = rate_or(self.min_rate, defaults.min_rate);
        let max_rate = rate_or(self.max_rate, defaults.max_rate);
        let (min_rate, max_rate) = if min_rate <= max_rate {
            (min_rate, max_rate)
        } else {
            (max_rate, min_rate)
        };
        Self {
            min_rate,
            max_rate,
            initial_rate: rate_or(self.initial_rate, defaults.initial_rate),
        }
    }
}

// ── Frame Scheduler ───────────────────────────────────────────────

/// Pacing state for one session: capture gating, the single-flight
/// guard, and the latency-adaptive target rate.
///
/// Time is always passed in explicitly, which keeps the scheduler
/// deterministic under test. The smoothed round trip uses the classic
/// `srtt = srtt*7/8 + sample/8` kernel; the target rate is one frame per
/// smoothed round trip, clamped to the configured range.
#[derive(Debug)]
pub struct FrameScheduler {
    config: PacingConfig,
    /// When the last capture was started.
    last_frame: Option<Instant>,
    /// Timestamp of the last submission, for monotonicity.
    last_sent_ts: u64,
    /// When the last accepted result arrived.
    last_response: Option<Instant>,
    /// Smoothed round trip in microseconds; 0 = not yet measured.
    srtt_us: u64,
    /// Current target rate in frames/second.
    target_rate: f64,
    /// True from capture hand-off until the transmission attempt ends.
    in_flight: bool,
}

impl FrameScheduler {
    pub fn new(config: PacingConfig) -> Self {
        let config = config.sanitized();
        let target_rate = config.initial_rate.clamp(config.min_rate, config.max_rate);
        Self {
            config,
            last_frame: None,
            last_sent_ts: 0,
            last_response: None,
            srtt_us: 0,
            target_rate,
            in_flight: false,
        }
    }

    /// Whether a new frame should be captured at `now`.
    ///
    /// False while a submission is in flight, or before one frame period
    /// (`1000ms / target_rate`) has elapsed since the last capture.
    pub fn should_capture(&self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_frame {
            Some(last) => now.duration_since(last) >= self.frame_period(),
            None => true,
        }
    }

    /// Mark a capture as started and raise the single-flight guard.
    ///
    /// Returns the submission timestamp: `now_ms`, bumped if needed so
    /// timestamps stay strictly increasing within the session. Callers
    /// gate on [`should_capture`] first.
    ///
    /// [`should_capture`]: FrameScheduler::should_capture
    pub fn begin_submission(&mut self, now: Instant, now_ms: u64) -> u64 {
        self.last_frame = Some(now);
        self.in_flight = true;
        let ts = now_ms.max(self.last_sent_ts + 1);
        self.last_sent_ts = ts;
        ts
    }

    /// Lower the single-flight guard. Called once per submission attempt,
    /// whether the send succeeded or not, so the scheduler can never
    /// stall permanently.
    pub fn finish_submission(&mut self) {
        self.in_flight = false;
    }

    /// Feed one observed round trip and recompute the target rate.
    pub fn record_response(&mut self, rtt: Duration) {
        let rtt_us = rtt.as_micros() as u64;
        if self.srtt_us == 0 {
            self.srtt_us = rtt_us;
        } else {
            // EWMA: srtt = 7/8 * srtt + 1/8 * sample
            self.srtt_us = self.srtt_us * 7 / 8 + rtt_us / 8;
        }
        self.last_response = Some(Instant::now());

        let srtt_ms = self.srtt_us as f64 / 1000.0;
        let rate = if srtt_ms > 0.0 {
            1000.0 / srtt_ms
        } else {
            self.config.initial_rate
        };
        self.target_rate = rate.clamp(self.config.min_rate, self.config.max_rate);
        trace!(
            srtt_ms,
            target_rate = self.target_rate,
            "pacing rate updated"
        );
    }

    /// Current target rate in frames/second.
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    /// Time between captures at the current target rate.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_rate)
    }

    /// Smoothed round trip, or `None` before the first measurement.
    pub fn smoothed_rtt(&self) -> Option<Duration> {
        (self.srtt_us > 0).then(|| Duration::from_micros(self.srtt_us))
    }

    /// When the last accepted result arrived, if any.
    pub fn last_response(&self) -> Option<Instant> {
        self.last_response
    }

    /// Whether a submission is currently in flight.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────
