//! Connection lifecycle orchestration.
//!
//! A [`RealtimeClient`] is a cheap clonable handle to a background
//! task that owns the socket, the sequence tracker, and all lifecycle
//! decisions. Commands flow over an mpsc channel; callers never touch
//! the socket and there is never more than one logical event stream.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, warn};
use url::Url;

use huddle_protocol::{CLOSE_NORMAL, CloseEvent};

use crate::config::SocketConfig;
use crate::error::{RealtimeError, RealtimeResult};
use crate::policy::{ReconnectVerdict, classify};
use crate::router::{ChannelEvent, EventRouter, ListenerId, OfflineKind, Topic};
use crate::sequence::{SequenceCheck, SequenceTracker};
use crate::transport::{Transport, TransportEvent};

/// Observable connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected by the caller.
    Idle = 0,
    /// A connect attempt (or reconnect cycle) is in flight.
    Connecting = 1,
    /// Socket open, auth sent, events flowing.
    Connected = 2,
    /// A caller-initiated close is in progress.
    Disconnecting = 3,
    /// Connection lost and no attempt currently in flight.
    Offline = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Offline,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// State shared between the handle and the connection task.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Idle as u8))
    }

    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, next: ConnectionState) {
        let prev = self.0.swap(next as u8, Ordering::SeqCst);
        if prev != next as u8 {
            debug!(from = %ConnectionState::from_u8(prev), to = %next, "state changed");
        }
    }
}

enum Command {
    Connect {
        url: Url,
        done: oneshot::Sender<RealtimeResult<()>>,
    },
    Disconnect {
        done: oneshot::Sender<RealtimeResult<()>>,
    },
}

/// Handle to the realtime event channel.
///
/// Clones share one underlying connection. `connect()` and
/// `disconnect()` are idempotent: concurrent or repeated calls
/// coalesce onto the in-flight operation and all callers observe the
/// same outcome.
#[derive(Clone, Debug)]
pub struct RealtimeClient {
    cmd_tx: mpsc::Sender<Command>,
    router: Arc<EventRouter>,
    state: Arc<StateCell>,
}

impl RealtimeClient {
    /// Creates a client and spawns its connection task. No socket is
    /// opened until [`connect`](Self::connect) is called.
    pub fn new(config: SocketConfig) -> Self {
        let router = Arc::new(EventRouter::new(config.binding_prefix.clone()));
        let state = Arc::new(StateCell::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let task = ConnectionTask {
            config,
            router: Arc::clone(&router),
            state: Arc::clone(&state),
            cmd_rx,
            epoch: 0,
        };
        tokio::spawn(task.run());

        Self {
            cmd_tx,
            router,
            state,
        }
    }

    /// Registers a listener on a topic. Listeners survive reconnects.
    pub fn subscribe<T, F>(&self, topic: T, callback: F) -> ListenerId
    where
        T: Into<Topic>,
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.router.subscribe(topic, callback)
    }

    /// Removes one listener. Returns whether it was registered.
    pub fn unsubscribe<T: Into<Topic>>(&self, topic: T, id: ListenerId) -> bool {
        self.router.unsubscribe(topic, id)
    }

    /// Connects to the given URL, resolving once the socket is open
    /// and the auth frame sent. Calling while already connected or
    /// connecting joins the existing connection instead of opening a
    /// second one.
    pub async fn connect(&self, url: &str) -> RealtimeResult<()> {
        let url = Url::parse(url)?;
        let (done, outcome) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { url, done })
            .await
            .map_err(|_| RealtimeError::ClientClosed)?;
        outcome.await.map_err(|_| RealtimeError::ClientClosed)?
    }

    /// Closes the connection, if any. A no-op that still resolves
    /// successfully when idle or offline; cancels an in-flight
    /// connect cycle.
    pub async fn disconnect(&self) -> RealtimeResult<()> {
        let (done, outcome) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect { done })
            .await
            .map_err(|_| RealtimeError::ClientClosed)?;
        outcome.await.map_err(|_| RealtimeError::ClientClosed)?
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state.get() == ConnectionState::Connecting
    }
}

/// An established connection with its per-connection state.
struct Session {
    transport: Transport,
    sequence: SequenceTracker,
    epoch: u64,
}

enum ConnectedStep {
    Continue,
    Disconnect(oneshot::Sender<RealtimeResult<()>>),
    Closed(CloseEvent),
    Shutdown,
}

enum CycleOutcome {
    Connected(Session),
    Cancelled,
    GaveUp,
    Shutdown,
}

struct ConnectionTask {
    config: SocketConfig,
    router: Arc<EventRouter>,
    state: Arc<StateCell>,
    cmd_rx: mpsc::Receiver<Command>,
    /// Bumped once per transport opened; tags log lines so overlapping
    /// connection lifetimes can be told apart.
    epoch: u64,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut session: Option<Session> = None;
        let mut current_url: Option<Url> = None;

        loop {
            if let Some(mut active) = session.take() {
                match self.drive_connected(&mut active).await {
                    ConnectedStep::Continue => session = Some(active),
                    ConnectedStep::Disconnect(done) => {
                        self.state.set(ConnectionState::Disconnecting);
                        let close = active.transport.close(CLOSE_NORMAL, "done").await;
                        info!(close = %close, epoch = active.epoch, "disconnected");
                        self.state.set(ConnectionState::Offline);
                        self.router.emit_offline(close, OfflineKind::Local);
                        let _ = done.send(Ok(()));
                    }
                    ConnectedStep::Closed(close) => {
                        self.state.set(ConnectionState::Offline);
                        let verdict = classify(&close);
                        info!(close = %close, verdict = ?verdict, epoch = active.epoch, "connection closed by peer");
                        drop(active);
                        match verdict {
                            ReconnectVerdict::Reconnect { delay_hint } => {
                                self.router.emit_offline(close, OfflineKind::Transient);
                                let url = match current_url.clone() {
                                    Some(url) => url,
                                    None => continue,
                                };
                                let delay = delay_hint
                                    .unwrap_or(Duration::ZERO)
                                    .max(self.config.backoff.delay(1));
                                match self.connect_cycle(&url, Vec::new(), 1, Some(delay)).await {
                                    CycleOutcome::Connected(next) => session = Some(next),
                                    CycleOutcome::Cancelled | CycleOutcome::GaveUp => {}
                                    CycleOutcome::Shutdown => return,
                                }
                            }
                            ReconnectVerdict::PermanentClose => {
                                self.router.emit_offline(close, OfflineKind::Permanent);
                            }
                            ReconnectVerdict::Replaced => {
                                self.router.emit_offline(close, OfflineKind::Replaced);
                            }
                        }
                    }
                    ConnectedStep::Shutdown => {
                        let _ = active.transport.close(CLOSE_NORMAL, "done").await;
                        return;
                    }
                }
            } else {
                match self.cmd_rx.recv().await {
                    Some(Command::Connect { url, done }) => {
                        current_url = Some(url.clone());
                        match self.connect_cycle(&url, vec![done], 0, None).await {
                            CycleOutcome::Connected(next) => session = Some(next),
                            CycleOutcome::Cancelled | CycleOutcome::GaveUp => {}
                            CycleOutcome::Shutdown => return,
                        }
                    }
                    Some(Command::Disconnect { done }) => {
                        // Idle or offline: nothing to tear down.
                        let _ = done.send(Ok(()));
                    }
                    None => return,
                }
            }
        }
    }

    async fn drive_connected(&mut self, active: &mut Session) -> ConnectedStep {
        tokio::select! {
            cmd = self.cmd_rx.recv() => match cmd {
                Some(Command::Connect { done, .. }) => {
                    // Already connected: the existing connection is the outcome.
                    let _ = done.send(Ok(()));
                    ConnectedStep::Continue
                }
                Some(Command::Disconnect { done }) => ConnectedStep::Disconnect(done),
                None => ConnectedStep::Shutdown,
            },
            event = active.transport.next_event() => match event {
                TransportEvent::Message(message) => {
                    if let SequenceCheck::Mismatch { expected, observed } =
                        active.sequence.accept(&message)
                    {
                        warn!(expected, observed, epoch = active.epoch, "sequence discontinuity");
                        self.router.emit_sequence_mismatch(expected, observed);
                    }
                    self.router.dispatch_message(message);
                    ConnectedStep::Continue
                }
                TransportEvent::Closed(close) => ConnectedStep::Closed(close),
            },
        }
    }

    /// Runs connect attempts with backoff until one succeeds, the
    /// retry cap is reached, a disconnect cancels the cycle, or all
    /// client handles are dropped.
    ///
    /// `waiters` holds the pending `connect()` callers; further
    /// connect commands arriving mid-cycle join the same attempt.
    async fn connect_cycle(
        &mut self,
        url: &Url,
        mut waiters: Vec<oneshot::Sender<RealtimeResult<()>>>,
        initial_failures: u32,
        initial_delay: Option<Duration>,
    ) -> CycleOutcome {
        self.state.set(ConnectionState::Connecting);
        let mut failures = initial_failures;
        let mut delay = initial_delay;

        loop {
            if let Some(wait) = delay.take() {
                if !wait.is_zero() {
                    debug!(delay_ms = wait.as_millis() as u64, failures, "backing off");
                    let sleep = time::sleep(wait);
                    tokio::pin!(sleep);
                    loop {
                        tokio::select! {
                            _ = &mut sleep => break,
                            cmd = self.cmd_rx.recv() => match cmd {
                                Some(Command::Connect { done, .. }) => waiters.push(done),
                                Some(Command::Disconnect { done }) => {
                                    return self.cancel_cycle(waiters, done);
                                }
                                None => return CycleOutcome::Shutdown,
                            },
                        }
                    }
                }
            }

            self.epoch += 1;
            let epoch = self.epoch;
            debug!(url = %url, epoch, "opening connection");

            // The attempt must survive commands arriving mid-handshake,
            // so the open future is pinned outside the select.
            let config = self.config.clone();
            let open = Transport::open(url, &config);
            tokio::pin!(open);
            let outcome = loop {
                tokio::select! {
                    result = &mut open => break result,
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(Command::Connect { done, .. }) => waiters.push(done),
                        Some(Command::Disconnect { done }) => {
                            return self.cancel_cycle(waiters, done);
                        }
                        None => return CycleOutcome::Shutdown,
                    },
                }
            };

            match outcome {
                Ok(transport) => {
                    self.state.set(ConnectionState::Connected);
                    info!(url = %url, epoch, "online");
                    for done in waiters.drain(..) {
                        let _ = done.send(Ok(()));
                    }
                    self.router.emit_online();
                    return CycleOutcome::Connected(Session {
                        transport,
                        sequence: SequenceTracker::new(),
                        epoch,
                    });
                }
                Err(error) => {
                    failures += 1;
                    warn!(error = %error, failures, "connection attempt failed");
                    if self.config.backoff.is_exhausted(failures) {
                        let error = RealtimeError::RetriesExhausted { attempts: failures };
                        for done in waiters.drain(..) {
                            let _ = done.send(Err(error.clone()));
                        }
                        self.state.set(ConnectionState::Offline);
                        self.router.emit_offline(
                            CloseEvent::from_reason("reconnect attempts exhausted"),
                            OfflineKind::Permanent,
                        );
                        return CycleOutcome::GaveUp;
                    }
                    delay = Some(self.config.backoff.delay(failures));
                }
            }
        }
    }

    fn cancel_cycle(
        &mut self,
        waiters: Vec<oneshot::Sender<RealtimeResult<()>>>,
        done: oneshot::Sender<RealtimeResult<()>>,
    ) -> CycleOutcome {
        for waiter in waiters {
            let _ = waiter.send(Err(RealtimeError::ConnectCancelled));
        }
        self.state.set(ConnectionState::Idle);
        let _ = done.send(Ok(()));
        CycleOutcome::Cancelled
    }
}
