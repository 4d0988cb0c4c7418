//! WebSocket lifecycle owner for one streaming session.
//!
//! The manager holds the [`LinkState`] machine and bridges the socket to
//! its owning session through events. On open, the socket splits into a
//! writer task fed by an outbound channel and a reader task that forwards
//! inbound binary frames. The manager never retries on its own: after a
//! failure it parks in `Disconnected` until the session asks it to
//! connect again.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ArgusError;
use crate::state::LinkState;

/// Lifecycle and traffic events the link raises to its owning session.
#[derive(Debug)]
pub enum LinkEvent {
    /// The WebSocket opened; sends will now go out.
    Opened,

    /// One inbound binary message, undecoded.
    Inbound(Vec<u8>),

    /// The link went down: connect failure, socket error, or remote
    /// close. `error` is `None` for a clean close.
    Closed { error: Option<ArgusError> },
}

/// Raw notifications from the spawned socket tasks, folded into
/// [`LinkEvent`]s against the current state by [`ConnectionManager`].
enum RawEvent {
    Opened { outbound: mpsc::Sender<Message> },
    Inbound(Vec<u8>),
    Closed { error: Option<ArgusError> },
}

/// Owns one duplex WebSocket: connect, send, receive, close.
///
/// All methods are called from the session task; the socket itself lives
/// in spawned reader/writer tasks that report back over an internal
/// channel. Events are surfaced through [`next_event`], which also
/// advances the state machine, so the session observes state and traffic
/// in one ordered stream.
///
/// [`next_event`]: ConnectionManager::next_event
#[derive(Debug)]
pub struct ConnectionManager {
    link: LinkState,
    outbound: Option<mpsc::Sender<Message>>,
    events_tx: mpsc::Sender<RawEvent>,
    events_rx: mpsc::Receiver<RawEvent>,
    cancel: CancellationToken,
    connect_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(connect_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            link: LinkState::default(),
            outbound: None,
            events_tx,
            events_rx,
            cancel: CancellationToken::new(),
            connect_timeout,
        }
    }

    /// Current link state.
    pub fn state(&self) -> &LinkState {
        &self.link
    }

    /// Whether frames can be sent right now.
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Start connecting to `url`. Idempotent: a second call while
    /// `Connecting` or `Open` is ignored, so duplicate sockets cannot
    /// exist. Completion arrives later as [`LinkEvent::Opened`] or
    /// [`LinkEvent::Closed`].
    pub fn connect(&mut self, url: &str) {
        if self.link.is_active() {
            debug!(state = %self.link, "connect ignored: link already active");
            return;
        }
        if self.link.begin_connect().is_err() {
            warn!(state = %self.link, "connect ignored");
            return;
        }

        let token = CancellationToken::new();
        self.cancel = token.clone();

        let url = url.to_string();
        let events = self.events_tx.clone();
        let connect_timeout = self.connect_timeout;
        debug!(%url, "connecting");

        tokio::spawn(async move {
            let attempt = tokio::time::timeout(connect_timeout, connect_async(url.as_str()));
            let socket = tokio::select! {
                _ = token.cancelled() => return,
                result = attempt => match result {
                    Ok(Ok((socket, _response))) => socket,
                    Ok(Err(e)) => {
                        let error = ArgusError::Connect(e.to_string());
                        let _ = events.send(RawEvent::Closed { error: Some(error) }).await;
                        return;
                    }
                    Err(_) => {
                        let error = ArgusError::Timeout(connect_timeout);
                        let _ = events.send(RawEvent::Closed { error: Some(error) }).await;
                        return;
                    }
                },
            };

            let (mut sink, mut stream) = socket.split();
            let (out_tx, mut out_rx) = mpsc::channel::<Message>(8);

            // Writer task: session -> socket. Ends when the session drops
            // the outbound sender, then closes the socket gracefully.
            tokio::spawn(async move {
                while let Some(message) = out_rx.recv().await {
                    if let Err(e) = sink.send(message).await {
                        warn!("socket write failed: {e}");
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            // Reader task: socket -> session.
            let reader_events = events.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        next = stream.next() => match next {
                            Some(Ok(Message::Binary(data))) => {
                                if reader_events.send(RawEvent::Inbound(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                let _ = reader_events
                                    .send(RawEvent::Closed { error: None })
                                    .await;
                                break;
                            }
                            Some(Ok(_)) => {
                                // Text/ping/pong carry no envelopes.
                            }
                            Some(Err(e)) => {
                                let error = ArgusError::Socket(e.to_string());
                                let _ = reader_events
                                    .send(RawEvent::Closed { error: Some(error) })
                                    .await;
                                break;
                            }
                        },
                    }
                }
            });

            let _ = events.send(RawEvent::Opened { outbound: out_tx }).await;
        });
    }

    /// Send one encoded envelope. Fails with [`ArgusError::SendDropped`]
    /// when the link is not open or the writer is saturated; the frame is
    /// never queued for later.
    pub fn send(&mut self, frame: Vec<u8>) -> Result<(), ArgusError> {
        if !self.link.is_open() {
            return Err(ArgusError::SendDropped);
        }
        let Some(tx) = &self.outbound else {
            return Err(ArgusError::SendDropped);
        };
        tx.try_send(Message::Binary(frame))
            .map_err(|_| ArgusError::SendDropped)
    }

    /// Tear the link down. Idempotent. Synchronous from the caller's
    /// perspective; the close handshake finishes in the background, and
    /// any straggler inbound message is discarded by [`next_event`].
    ///
    /// [`next_event`]: ConnectionManager::next_event
    pub fn close(&mut self) {
        if self.link.is_disconnected() {
            return;
        }
        self.cancel.cancel();
        // Dropping the sender lets the writer drain and close the socket.
        self.outbound = None;
        if self.link.begin_close().is_ok() {
            let _ = self.link.finish_close();
        } else {
            self.link.force_disconnect();
        }
        debug!("link closed");
    }

    /// Wait for the next link event, advancing the state machine as a
    /// side effect. Stale notifications (a socket that opened after
    /// `close()`, inbound traffic on a dead link, duplicate closes) are
    /// absorbed here and never reach the session.
    pub async fn next_event(&mut self) -> LinkEvent {
        while let Some(raw) = self.events_rx.recv().await {
            if let Some(event) = self.process(raw) {
                return event;
            }
        }
        // `self.events_tx` keeps the channel open for the lifetime of the
        // manager, so a closed channel means quiescence.
        std::future::pending().await
    }

    fn process(&mut self, raw: RawEvent) -> Option<LinkEvent> {
        match raw {
            RawEvent::Opened { outbound } => {
                if self.link.complete_connect().is_ok() {
                    self.outbound = Some(outbound);
                    debug!("link open");
                    Some(LinkEvent::Opened)
                } else {
                    // The connect raced with close(); dropping the sender
                    // shuts the fresh socket down again.
                    debug!(state = %self.link, "discarding socket opened after close");
                    None
                }
            }
            RawEvent::Inbound(data) => {
                if self.link.is_open() {
                    Some(LinkEvent::Inbound(data))
                } else {
                    debug!(len = data.len(), "discarding stray inbound message");
                    None
                }
            }
            RawEvent::Closed { error } => {
                if self.link.is_disconnected() {
                    // Local close already ran, or a duplicate notification.
                    return None;
                }
                self.outbound = None;
                self.link.force_disconnect();
                match &error {
                    Some(e) => warn!("link down: {e}"),
                    None => debug!("link closed by remote"),
                }
                Some(LinkEvent::Closed { error })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, task};

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Duration::from_secs(1))
    }

    fn fake_outbound() -> mpsc::Sender<Message> {
        mpsc::channel(8).0
    }

    #[tokio::test]
    async fn send_without_link_is_dropped() {
        let mut conn = manager();
        let err = conn.send(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, ArgusError::SendDropped));
    }

    #[tokio::test]
    async fn close_before_connect_is_noop() {
        let mut conn = manager();
        conn.close();
        conn.close();
        assert!(conn.state().is_disconnected());
    }

    #[test]
    fn next_event_pends_while_disconnected() {
        let mut conn = manager();
        let mut next = task::spawn(conn.next_event());
        assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn opened_event_completes_connect() {
        let mut conn = manager();
        conn.link.begin_connect().unwrap();

        let event = conn.process(RawEvent::Opened {
            outbound: fake_outbound(),
        });
        assert!(matches!(event, Some(LinkEvent::Opened)));
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn opened_after_close_is_discarded() {
        let mut conn = manager();
        conn.link.begin_connect().unwrap();
        conn.close();

        let event = conn.process(RawEvent::Opened {
            outbound: fake_outbound(),
        });
        assert!(event.is_none());
        assert!(conn.state().is_disconnected());
    }

    #[tokio::test]
    async fn stray_inbound_after_close_is_discarded() {
        let mut conn = manager();
        conn.link.begin_connect().unwrap();
        conn.process(RawEvent::Opened {
            outbound: fake_outbound(),
        });
        conn.close();

        let event = conn.process(RawEvent::Inbound(vec![0xAA]));
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn duplicate_close_notification_is_absorbed() {
        let mut conn = manager();
        conn.link.begin_connect().unwrap();
        conn.process(RawEvent::Opened {
            outbound: fake_outbound(),
        });

        let first = conn.process(RawEvent::Closed { error: None });
        assert!(matches!(first, Some(LinkEvent::Closed { error: None })));
        assert!(conn.state().is_disconnected());

        let second = conn.process(RawEvent::Closed { error: None });
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn connect_refused_surfaces_closed_event() {
        let mut conn = manager();
        // Nothing listens on port 1; the connect fails fast.
        conn.connect("ws://127.0.0.1:1/stream/test");
        assert!(conn.state().is_active());

        let event = conn.next_event().await;
        assert!(matches!(event, LinkEvent::Closed { error: Some(_) }));
        assert!(conn.state().is_disconnected());
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_pending() {
        let mut conn = manager();
        conn.connect("ws://127.0.0.1:1/stream/test");
        conn.connect("ws://127.0.0.1:1/stream/test");

        // Exactly one failure event arrives: the second call spawned
        // nothing.
        let _ = conn.next_event().await;
        assert!(conn.state().is_disconnected());
        let extra = tokio::time::timeout(Duration::from_millis(100), conn.next_event()).await;
        assert!(extra.is_err());
    }
}
