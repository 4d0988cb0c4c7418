//! The streaming session actor.
//!
//! One [`StreamSession`] owns the whole pipeline for one capture source:
//!
//! 1. A pacing tick decides whether to capture (see `pacing`).
//! 2. The frame is captured and packed into an envelope off the loop.
//! 3. [`ConnectionManager`](crate::network::ConnectionManager) ships it.
//! 4. Inbound results are decoded, staleness-checked and routed to the
//!    render target.
//!
//! The session runs as a single task; every piece of mutable state lives
//! inside it and is touched from nowhere else. Callers talk to it through
//! a cloneable [`SessionHandle`]. Lifecycle:
//!
//! ```text
//!             start()                 link open
//!   Idle ───────────────► Connecting ───────────► Streaming
//!                              ▲                   │     ▲
//!                              │ play (link down)  │stop │ play
//!                              │                   ▼     │ (link open)
//!                              └─────────────── Paused ──┘
//!
//!   source ended / dispose() ──► Closed (start() may reopen)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::error::ArgusError;
use crate::filter::StalenessFilter;
use crate::network::{connection_id, session_url, ConnectionManager, LinkEvent};
use crate::protocol::{DetectConfig, FrameEnvelope, ResultEnvelope};
use crate::state::SessionState;
use crate::stream::pacing::{FrameScheduler, PacingConfig};
use crate::stream::render::RenderTarget;
use crate::stream::router::{ResultRouter, RouteOutcome};
use crate::stream::source::{FrameBuffer, FrameSource, SourceEvent};

// ── SessionConfig ─────────────────────────────────────────────────

/// Configuration for [`StreamSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base WebSocket URL of the detection service. A random per-session
    /// connection id is appended to the path.
    pub service_url: String,
    /// Adaptive frame rate bounds.
    pub pacing: PacingConfig,
    /// Results older than this relative to arrival are discarded.
    pub max_result_age: Duration,
    /// How long one connect attempt may take before it counts as failed.
    pub connect_timeout: Duration,
    /// Pacing clock granularity. Captures happen on a tick boundary, so
    /// this should stay well below the fastest frame period.
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_url: "ws://127.0.0.1:9400/detect".to_string(),
            pacing: PacingConfig::default(),
            max_result_age: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_millis(16),
        }
    }
}

// ── SessionStats ──────────────────────────────────────────────────

/// Rolling counters and live pacing figures, published on a watch
/// channel after every event the session processes.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Current lifecycle state.
    pub state: SessionState,
    /// Frames handed to an open link.
    pub frames_sent: u64,
    /// Results that reached the render target.
    pub results_rendered: u64,
    /// Results dropped as stale, out of order or mode-mismatched.
    pub results_rejected: u64,
    /// Inbound messages that failed to decode.
    pub decode_failures: u64,
    /// Frames dropped because the link was not open.
    pub sends_dropped: u64,
    /// Smoothed round trip, once at least one result arrived.
    pub smoothed_rtt: Option<Duration>,
    /// Current adaptive capture rate in frames/second.
    pub target_rate: f64,
}

// ── Plumbing ──────────────────────────────────────────────────────

/// Caller-issued lifecycle commands.
#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Dispose,
}

/// A finished submission attempt, returning source and buffer ownership
/// to the session. Exactly one of these is outstanding at a time.
struct Submission<S> {
    source: S,
    buffer: FrameBuffer,
    timestamp: u64,
    payload: Result<Vec<u8>, ArgusError>,
}

/// What woke the event loop up.
enum Wake<S> {
    Command(Option<Command>),
    Source(Option<SourceEvent>),
    Link(LinkEvent),
    Done(Option<Submission<S>>),
    Tick,
}

// ── SessionHandle ─────────────────────────────────────────────────

/// Cloneable handle for driving a [`StreamSession`] from other tasks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    source_events: mpsc::Sender<SourceEvent>,
    detect: Arc<watch::Sender<DetectConfig>>,
    stats: watch::Receiver<SessionStats>,
}

impl SessionHandle {
    /// Open the session: connect and begin streaming once the link is up.
    /// A no-op while the session is already connecting or streaming.
    pub async fn start(&self) -> Result<(), ArgusError> {
        Ok(self.commands.send(Command::Start).await?)
    }

    /// Halt capture but keep the connection open. Resume with a
    /// [`SourceEvent::Play`] notification.
    pub async fn stop(&self) -> Result<(), ArgusError> {
        Ok(self.commands.send(Command::Stop).await?)
    }

    /// Tear the session down and end its task. The last published stats
    /// snapshot will show [`SessionState::Closed`].
    pub async fn dispose(&self) -> Result<(), ArgusError> {
        Ok(self.commands.send(Command::Dispose).await?)
    }

    /// Forward a capture source lifecycle signal to the session.
    pub async fn notify(&self, event: SourceEvent) -> Result<(), ArgusError> {
        Ok(self.source_events.send(event).await?)
    }

    /// Swap the detection configuration. Takes effect on the next
    /// submission; frames already in flight keep the config they left with.
    pub fn set_detect_config(&self, config: DetectConfig) -> Result<(), ArgusError> {
        self.detect.send(config).map_err(|_| ArgusError::ChannelClosed)
    }

    /// Latest stats snapshot.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.stats.borrow().state
    }

    /// A receiver that observes every stats update.
    pub fn watch_stats(&self) -> watch::Receiver<SessionStats> {
        self.stats.clone()
    }
}

// ── StreamSession ─────────────────────────────────────────────────

/// Owns one capture-to-render pipeline end to end.
pub struct StreamSession<S, T> {
    config: SessionConfig,
    /// Full service URL including the per-session connection id; stable
    /// across reconnects within this session.
    endpoint: String,
    state: SessionState,
    scheduler: FrameScheduler,
    filter: StalenessFilter,
    connection: ConnectionManager,
    router: ResultRouter<T>,
    /// Source and capture buffer, absent while a submission is in flight.
    capture: Option<(S, FrameBuffer)>,
    detect: watch::Receiver<DetectConfig>,
    commands_rx: mpsc::Receiver<Command>,
    source_rx: mpsc::Receiver<SourceEvent>,
    submissions_tx: mpsc::Sender<Submission<S>>,
    submissions_rx: mpsc::Receiver<Submission<S>>,
    stats_tx: watch::Sender<SessionStats>,
    frames_sent: u64,
    results_rendered: u64,
    results_rejected: u64,
    decode_failures: u64,
    sends_dropped: u64,
}

impl<S: FrameSource, T: RenderTarget> StreamSession<S, T> {
    /// Build a session and the handle that drives it. The session does
    /// nothing until [`run`](Self::run) is awaited:
    ///
    /// ```no_run
    /// # use argus_core::protocol::DetectConfig;
    /// # use argus_core::stream::{FrameSource, RenderTarget, SessionConfig, StreamSession};
    /// # async fn example<S: FrameSource, T: RenderTarget>(source: S, target: T) {
    /// let (session, handle) = StreamSession::new(
    ///     SessionConfig::default(),
    ///     DetectConfig::default(),
    ///     source,
    ///     target,
    /// );
    /// tokio::spawn(session.run());
    /// handle.start().await.ok();
    /// # }
    /// ```
    pub fn new(
        config: SessionConfig,
        detect: DetectConfig,
        source: S,
        target: T,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (source_tx, source_rx) = mpsc::channel(16);
        let (submissions_tx, submissions_rx) = mpsc::channel(2);
        let (detect_tx, detect_rx) = watch::channel(detect);

        let endpoint = session_url(&config.service_url, &connection_id());
        let scheduler = FrameScheduler::new(config.pacing);
        let (stats_tx, stats_rx) = watch::channel(SessionStats {
            target_rate: scheduler.target_rate(),
            ..SessionStats::default()
        });

        let session = Self {
            connection: ConnectionManager::new(config.connect_timeout),
            config,
            endpoint,
            state: SessionState::Idle,
            scheduler,
            filter: StalenessFilter::new(),
            router: ResultRouter::new(target),
            capture: Some((source, FrameBuffer::new())),
            detect: detect_rx,
            commands_rx,
            source_rx,
            submissions_tx,
            submissions_rx,
            stats_tx,
            frames_sent: 0,
            results_rendered: 0,
            results_rejected: 0,
            decode_failures: 0,
            sends_dropped: 0,
        };

        let handle = SessionHandle {
            commands: commands_tx,
            source_events: source_tx,
            detect: Arc::new(detect_tx),
            stats: stats_rx,
        };

        (session, handle)
    }

    /// Build a session and spawn its event loop on the current runtime.
    pub fn spawn(
        config: SessionConfig,
        detect: DetectConfig,
        source: S,
        target: T,
    ) -> SessionHandle {
        let (session, handle) = Self::new(config, detect, source, target);
        tokio::spawn(session.run());
        handle
    }

    /// Run the event loop until the session is disposed or every handle
    /// is gone.
    pub async fn run(mut self) {
        info!(endpoint = %self.endpoint, "stream session running");
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.publish_stats();

        loop {
            let wake = tokio::select! {
                command = self.commands_rx.recv() => Wake::Command(command),
                event = self.source_rx.recv() => Wake::Source(event),
                event = self.connection.next_event() => Wake::Link(event),
                done = self.submissions_rx.recv() => Wake::Done(done),
                _ = ticker.tick(), if self.state.is_streaming() => Wake::Tick,
            };

            match wake {
                Wake::Command(Some(Command::Start)) => self.handle_start(),
                Wake::Command(Some(Command::Stop)) => self.handle_stop(),
                Wake::Command(Some(Command::Dispose))
                | Wake::Command(None)
                | Wake::Source(None) => {
                    self.shutdown();
                    self.publish_stats();
                    break;
                }
                Wake::Source(Some(event)) => self.handle_source_event(event),
                Wake::Link(event) => self.handle_link_event(event),
                Wake::Done(Some(done)) => self.handle_submission(done),
                Wake::Done(None) => {}
                Wake::Tick => self.handle_tick(),
            }

            self.publish_stats();
        }

        info!("stream session ended");
    }

    // ── Lifecycle commands ────────────────────────────────────────

    fn handle_start(&mut self) {
        match self.state.begin_start() {
            Ok(()) => {
                info!("session starting");
                self.connect();
            }
            Err(_) => debug!(state = %self.state, "start ignored"),
        }
    }

    fn handle_stop(&mut self) {
        match self.state.halt() {
            Ok(()) => info!("streaming halted; link kept open"),
            Err(_) => debug!("stop ignored: session closed"),
        }
    }

    fn shutdown(&mut self) {
        self.state.close();
        self.connection.close();
        self.router.clear();
        info!("session closed");
    }

    fn connect(&mut self) {
        info!(endpoint = %self.endpoint, "connecting");
        self.connection.connect(&self.endpoint);
    }

    // ── Source events ─────────────────────────────────────────────

    fn handle_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Play => self.handle_play(),
            SourceEvent::Pause => {
                if self.state.pause().is_ok() {
                    info!("source paused; streaming paused");
                }
            }
            SourceEvent::Ended => {
                info!("capture source ended");
                self.shutdown();
            }
        }
    }

    fn handle_play(&mut self) {
        if self.state != SessionState::Paused {
            debug!(state = %self.state, "play ignored");
            return;
        }
        if self.connection.is_open() {
            if self.state.resume().is_ok() {
                info!("streaming resumed");
            }
        } else if self.state.begin_reconnect().is_ok() {
            self.connect();
        }
    }

    // ── Link events ───────────────────────────────────────────────

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened => match self.state.stream_opened() {
                Ok(()) => info!("link open; streaming"),
                Err(_) => debug!(state = %self.state, "link opened outside connect"),
            },
            LinkEvent::Inbound(bytes) => self.handle_inbound(&bytes),
            LinkEvent::Closed { error } => self.handle_link_closed(error),
        }
    }

    fn handle_link_closed(&mut self, error: Option<ArgusError>) {
        if self.state.is_closed() {
            return;
        }
        match error {
            Some(e) => warn!(error = %e, "link lost; streaming paused"),
            None => info!("link closed; streaming paused"),
        }
        let _ = self.state.halt();
    }

    fn handle_inbound(&mut self, bytes: &[u8]) {
        let envelope = match ResultEnvelope::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.decode_failures += 1;
                warn!(error = %e, "result discarded: decode failed");
                return;
            }
        };

        let now = unix_now_ms();
        if !self
            .filter
            .accept(envelope.timestamp, now, self.config.max_result_age)
        {
            self.results_rejected += 1;
            return;
        }

        let rtt = Duration::from_millis(now.saturating_sub(envelope.timestamp));
        self.scheduler.record_response(rtt);

        let detect = self.detect.borrow().clone();
        match self.router.route(&envelope.result, &detect) {
            RouteOutcome::Rendered => self.results_rendered += 1,
            RouteOutcome::ModeMismatch => self.results_rejected += 1,
        }
    }

    // ── Capture ticks ─────────────────────────────────────────────

    fn handle_tick(&mut self) {
        let now = Instant::now();
        if !self.scheduler.should_capture(now) {
            return;
        }
        let Some((mut source, mut buffer)) = self.capture.take() else {
            return;
        };

        let Some((width, height)) = source.dimensions() else {
            self.capture = Some((source, buffer));
            self.halt_without_source();
            return;
        };

        self.router.fit_to(width, height);
        let timestamp = self.scheduler.begin_submission(now, unix_now_ms());
        let detect = self.detect.borrow().clone();
        let done = self.submissions_tx.clone();

        // Capture and packing run off the event loop; the source and
        // buffer come back with the outcome.
        tokio::spawn(async move {
            let payload = match source.capture(&mut buffer).await {
                Ok(()) => {
                    FrameEnvelope::new(Bytes::copy_from_slice(buffer.data()), detect, timestamp)
                        .to_bytes()
                }
                Err(e) => Err(e),
            };
            let _ = done
                .send(Submission { source, buffer, timestamp, payload })
                .await;
        });
    }

    fn handle_submission(&mut self, done: Submission<S>) {
        self.scheduler.finish_submission();
        self.capture = Some((done.source, done.buffer));

        match done.payload {
            Ok(frame) => match self.connection.send(frame) {
                Ok(()) => {
                    self.frames_sent += 1;
                    trace!(timestamp = done.timestamp, "frame submitted");
                }
                Err(_) => {
                    self.sends_dropped += 1;
                    debug!(timestamp = done.timestamp, "frame dropped: link not open");
                }
            },
            Err(ArgusError::SourceUnavailable) => self.halt_without_source(),
            Err(e) => warn!(error = %e, "frame capture failed"),
        }
    }

    fn halt_without_source(&mut self) {
        self.router.clear();
        if self.state.halt().is_ok() {
            info!("capture source has no active stream; streaming paused");
        }
    }

    // ── Stats ─────────────────────────────────────────────────────

    fn publish_stats(&self) {
        self.stats_tx.send_replace(SessionStats {
            state: self.state,
            frames_sent: self.frames_sent,
            results_rendered: self.results_rendered,
            results_rejected: self.results_rejected,
            decode_failures: self.decode_failures,
            sends_dropped: self.sends_dropped,
            smoothed_rtt: self.scheduler.smoothed_rtt(),
            target_rate: self.scheduler.target_rate(),
        });
    }
}

/// Milliseconds since the Unix epoch; submission timestamps and
/// staleness decisions share this clock.
fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// ── Tests ─────────────────────────────────────────────────────────
