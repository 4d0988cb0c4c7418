//! Integration tests covering the full session lifecycle against a real
//! WebSocket detection service on localhost: pacing, staleness,
//! reconnects, and mode switching.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use argus_core::{
    ArgusError, DetectConfig, Detection, DetectionResult, FrameBuffer, FrameEnvelope,
    FrameSource, LivenessConfig, MaskConfig, MaskFrame, RenderTarget, ResultEnvelope,
    SessionConfig, SessionHandle, SessionState, SessionStats, SourceEvent, StreamSession,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Bind an OS-assigned port and return a session config pointed at it.
async fn ephemeral_service() -> (TcpListener, SessionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = SessionConfig {
        service_url: format!("ws://{addr}"),
        connect_timeout: Duration::from_secs(5),
        ..SessionConfig::default()
    };
    (listener, config)
}

/// Capture source producing one fake JPEG frame over and over.
struct CameraSource;

#[async_trait]
impl FrameSource for CameraSource {
    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((640, 480))
    }

    async fn capture(&mut self, buffer: &mut FrameBuffer) -> Result<(), ArgusError> {
        let frame = buffer.begin_frame(640, 480);
        frame.extend_from_slice(&[0xFF, 0xD8]);
        frame.extend_from_slice(&[0x42; 64]);
        frame.extend_from_slice(&[0xFF, 0xD9]);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct RecordState {
    size: (u32, u32),
    boxes: usize,
    masks: usize,
    clears: usize,
}

/// Render target that tallies everything drawn onto it.
#[derive(Clone, Default)]
struct RecordingTarget {
    state: Arc<Mutex<RecordState>>,
}

impl RecordingTarget {
    fn snapshot(&self) -> RecordState {
        self.state.lock().unwrap().clone()
    }
}

impl RenderTarget for RecordingTarget {
    fn dimensions(&self) -> (u32, u32) {
        self.state.lock().unwrap().size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.state.lock().unwrap().size = (width, height);
    }

    fn render_detections(&mut self, detections: &[Detection], _config: &LivenessConfig) {
        self.state.lock().unwrap().boxes += detections.len();
    }

    fn render_mask(&mut self, _mask: &MaskFrame, _config: &MaskConfig) {
        self.state.lock().unwrap().masks += 1;
    }

    fn clear(&mut self) {
        self.state.lock().unwrap().clears += 1;
    }
}

fn face() -> Detection {
    Detection {
        x: 0.5,
        y: 0.4,
        w: 0.3,
        h: 0.4,
        prob: 0.92,
        class: "face".to_string(),
        real: 0.85,
        fake: 0.15,
    }
}

/// The result shape a frame's config asks for.
fn result_for(config: &DetectConfig) -> DetectionResult {
    match config {
        DetectConfig::Liveness(_) => DetectionResult::Detections(vec![face()]),
        DetectConfig::Mask(_) => {
            DetectionResult::Mask(MaskFrame::new(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        }
    }
}

/// Accept connections forever; answer every frame envelope with a
/// plausible result for the config it carried.
async fn echo_detect(listener: TcpListener) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = accept_async(stream).await else {
            continue;
        };
        let (mut tx, mut rx) = ws.split();
        while let Some(Ok(msg)) = rx.next().await {
            let Message::Binary(bytes) = msg else { continue };
            let Ok(frame) = FrameEnvelope::from_bytes(&bytes) else {
                continue;
            };
            let reply = ResultEnvelope::new(frame.timestamp, result_for(&frame.config));
            if tx
                .send(Message::Binary(reply.to_bytes().unwrap()))
                .await
                .is_err()
            {
                break;
            }
        }
    }
}

/// Wait until a stats snapshot satisfies the predicate, or fail.
async fn wait_until(
    handle: &SessionHandle,
    what: &str,
    predicate: impl FnMut(&SessionStats) -> bool,
) {
    let mut stats = handle.watch_stats();
    let reached = tokio::time::timeout(Duration::from_secs(10), stats.wait_for(predicate)).await;
    assert!(reached.is_ok_and(|r| r.is_ok()), "timed out waiting for {what}");
}

async fn wait_for_state(handle: &SessionHandle, want: SessionState) {
    wait_until(handle, want.name(), |s| s.state == want).await;
}

// ── Frame round trip ─────────────────────────────────────────────

#[tokio::test]
async fn test_stream_round_trip() {
    let (listener, config) = ephemeral_service().await;
    tokio::spawn(echo_detect(listener));

    let target = RecordingTarget::default();
    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        target.clone(),
    );

    handle.start().await.unwrap();
    wait_for_state(&handle, SessionState::Streaming).await;
    wait_until(&handle, "three rendered results", |s| s.results_rendered >= 3).await;

    let stats = handle.stats();
    assert!(stats.frames_sent >= stats.results_rendered);
    assert_eq!(stats.decode_failures, 0);

    let drawn = target.snapshot();
    assert!(drawn.boxes >= 3);
    assert_eq!(drawn.size, (640, 480), "target resized to source dimensions");

    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_frame_envelope_reaches_service() {
    let (listener, config) = ephemeral_service().await;
    let (seen_tx, mut seen_rx) = mpsc::channel::<FrameEnvelope>(16);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();
        while let Some(Ok(msg)) = rx.next().await {
            let Message::Binary(bytes) = msg else { continue };
            let frame = FrameEnvelope::from_bytes(&bytes).unwrap();
            let reply = ResultEnvelope::new(frame.timestamp, result_for(&frame.config));
            seen_tx.send(frame).await.unwrap();
            if tx
                .send(Message::Binary(reply.to_bytes().unwrap()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        RecordingTarget::default(),
    );
    handle.start().await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(10), seen_rx.recv())
        .await
        .expect("timeout")
        .expect("service saw no frame");

    assert_eq!(&frame.bytes[..2], &[0xFF, 0xD8], "JPEG payload intact");
    assert_eq!(frame.config, DetectConfig::default());
    assert!(frame.timestamp > 0);

    // Submission timestamps are strictly increasing.
    let next = tokio::time::timeout(Duration::from_secs(10), seen_rx.recv())
        .await
        .expect("timeout")
        .expect("service saw only one frame");
    assert!(next.timestamp > frame.timestamp);

    handle.dispose().await.unwrap();
}

// ── Staleness ────────────────────────────────────────────────────

#[tokio::test]
async fn test_replayed_results_rejected() {
    let (listener, config) = ephemeral_service().await;

    // Replies once correctly, then replays an older timestamp that the
    // session must throw away.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();
        while let Some(Ok(msg)) = rx.next().await {
            let Message::Binary(bytes) = msg else { continue };
            let Ok(frame) = FrameEnvelope::from_bytes(&bytes) else {
                continue;
            };
            let fresh = ResultEnvelope::new(frame.timestamp, result_for(&frame.config));
            let stale =
                ResultEnvelope::new(frame.timestamp - 1000, result_for(&frame.config));
            for reply in [fresh, stale] {
                if tx
                    .send(Message::Binary(reply.to_bytes().unwrap()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    });

    let target = RecordingTarget::default();
    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        target.clone(),
    );
    handle.start().await.unwrap();

    wait_until(&handle, "rendered and rejected results", |s| {
        s.results_rendered >= 2 && s.results_rejected >= 2
    })
    .await;

    handle.dispose().await.unwrap();
    wait_for_state(&handle, SessionState::Closed).await;

    // Every accepted result was newer than the one before; the replays
    // never reached the target.
    let stats = handle.stats();
    assert_eq!(target.snapshot().boxes as u64, stats.results_rendered);
}

#[tokio::test]
async fn test_expired_results_never_render() {
    let (listener, config) = ephemeral_service().await;
    let config = SessionConfig {
        max_result_age: Duration::from_millis(50),
        ..config
    };

    // Replies arrive 200ms late, well past the 50ms age ceiling.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();
        while let Some(Ok(msg)) = rx.next().await {
            let Message::Binary(bytes) = msg else { continue };
            let Ok(frame) = FrameEnvelope::from_bytes(&bytes) else {
                continue;
            };
            tokio::time::sleep(Duration::from_millis(200)).await;
            let reply = ResultEnvelope::new(frame.timestamp, result_for(&frame.config));
            if tx
                .send(Message::Binary(reply.to_bytes().unwrap()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let target = RecordingTarget::default();
    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        target.clone(),
    );
    handle.start().await.unwrap();

    wait_until(&handle, "expired results rejected", |s| s.results_rejected >= 2).await;

    let stats = handle.stats();
    assert_eq!(stats.results_rendered, 0);
    assert_eq!(target.snapshot().boxes, 0);

    handle.dispose().await.unwrap();
}

// ── Pause / resume ───────────────────────────────────────────────

#[tokio::test]
async fn test_pause_keeps_link_for_resume() {
    let (listener, config) = ephemeral_service().await;
    tokio::spawn(echo_detect(listener));

    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        RecordingTarget::default(),
    );

    handle.start().await.unwrap();
    wait_until(&handle, "first rendered result", |s| s.results_rendered >= 1).await;

    handle.notify(SourceEvent::Pause).await.unwrap();
    wait_for_state(&handle, SessionState::Paused).await;
    let rendered_at_pause = handle.stats().results_rendered;

    // Play resumes on the link kept open by the pause.
    handle.notify(SourceEvent::Play).await.unwrap();
    wait_for_state(&handle, SessionState::Streaming).await;
    wait_until(&handle, "streaming to resume", |s| {
        s.results_rendered > rendered_at_pause
    })
    .await;

    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_stop_then_play_resumes() {
    let (listener, config) = ephemeral_service().await;
    tokio::spawn(echo_detect(listener));

    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        RecordingTarget::default(),
    );

    handle.start().await.unwrap();
    wait_until(&handle, "first rendered result", |s| s.results_rendered >= 1).await;

    handle.stop().await.unwrap();
    wait_for_state(&handle, SessionState::Paused).await;

    handle.notify(SourceEvent::Play).await.unwrap();
    wait_for_state(&handle, SessionState::Streaming).await;

    handle.dispose().await.unwrap();
}

// ── Teardown and reconnect ───────────────────────────────────────

#[tokio::test]
async fn test_source_end_closes_then_start_reopens() {
    let (listener, config) = ephemeral_service().await;
    tokio::spawn(echo_detect(listener));

    let target = RecordingTarget::default();
    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        target.clone(),
    );

    handle.start().await.unwrap();
    wait_until(&handle, "first rendered result", |s| s.results_rendered >= 1).await;

    handle.notify(SourceEvent::Ended).await.unwrap();
    wait_for_state(&handle, SessionState::Closed).await;
    assert!(target.snapshot().clears >= 1, "overlay wiped on close");

    // A closed session can be opened again; the service sees a second
    // connection.
    let rendered_before = handle.stats().results_rendered;
    handle.start().await.unwrap();
    wait_for_state(&handle, SessionState::Streaming).await;
    wait_until(&handle, "rendering after reopen", |s| {
        s.results_rendered > rendered_before
    })
    .await;

    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_link_drop_pauses_without_retry() {
    let (listener, config) = ephemeral_service().await;

    // Completes the handshake, then slams the connection shut.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
    });

    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        RecordingTarget::default(),
    );

    handle.start().await.unwrap();
    wait_for_state(&handle, SessionState::Paused).await;

    // No automatic reconnect: the session stays parked until a play
    // event asks for one.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.state(), SessionState::Paused);

    handle.dispose().await.unwrap();
}

// ── Live configuration ───────────────────────────────────────────

#[tokio::test]
async fn test_mode_switch_follows_config() {
    let (listener, config) = ephemeral_service().await;
    tokio::spawn(echo_detect(listener));

    let target = RecordingTarget::default();
    let handle = StreamSession::spawn(
        config,
        DetectConfig::default(),
        CameraSource,
        target.clone(),
    );

    handle.start().await.unwrap();
    wait_until(&handle, "liveness results", |s| s.results_rendered >= 1).await;
    assert!(target.snapshot().boxes >= 1);

    // Switch to mask mode mid-session; subsequent frames carry the new
    // config and their results render as masks.
    handle
        .set_detect_config(DetectConfig::Mask(MaskConfig::default()))
        .unwrap();

    let switched = target.clone();
    wait_until(&handle, "mask results", move |_| switched.snapshot().masks >= 1).await;

    handle.dispose().await.unwrap();
}
