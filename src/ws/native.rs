//! Native WebSocket client: `tokio-tungstenite`.
//!
//! - Background tokio task for connection management
//! - Application-level ping/pong health check
//! - Exponential backoff reconnection with jitter
//! - Ref-counted group membership, re-joined after every reconnect
//! - Stream-based event delivery to consumer

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsProtocolError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::shared::AuctionId;
use crate::ws::{
    GroupMemberships, GroupTransport, Kind, MessageIn, MessageOut, ReadyState, WsConfig, WsEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 1024;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Send(MessageOut),
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

#[derive(Debug)]
enum DisconnectReason {
    UserRequested,
    NormalClose,
    PongTimeout,
    RateLimited,
    Error(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    groups: Arc<Mutex<GroupMemberships>>,
    reconnect_attempts: u32,
    ready_state: Arc<AtomicU16>,
    running: Arc<AtomicBool>,
}

impl TaskState {
    fn emit(&self, event: WsEvent) {
        let _ = self.event_tx.try_send(event);
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }

    fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.store(state as u16, Ordering::SeqCst);
    }
}

// ─── WsHandle ────────────────────────────────────────────────────────────────

/// Cheap, cloneable sender half of a `WsClient`.
///
/// This is what the push manager holds as its `GroupTransport`; the client
/// itself stays with whoever owns the connection lifecycle.
#[derive(Clone)]
pub struct WsHandle {
    cmd_tx: mpsc::Sender<Command>,
    running: Arc<AtomicBool>,
}

impl WsHandle {
    /// Queue a message for the background task.
    ///
    /// Returns `WsError::NotConnected` if the client was never connected or
    /// has been disconnected.
    pub fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(WsError::NotConnected);
        }
        self.cmd_tx
            .try_send(Command::Send(msg))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            })
    }
}

impl GroupTransport for WsHandle {
    fn join_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.send(MessageOut::join_group(auction_id.clone()))
    }

    fn leave_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.send(MessageOut::leave_group(auction_id.clone()))
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Native WebSocket client using `tokio-tungstenite`.
///
/// Uses a background tokio task for connection management.
/// The public API communicates with it via mpsc channels.
pub struct WsClient {
    config: WsConfig,
    cmd_tx: mpsc::Sender<Command>,
    /// Present while no task is running; the task hands it back on exit.
    cmd_rx: Option<mpsc::Receiver<Command>>,
    event_rx: tokio::sync::Mutex<mpsc::Receiver<WsEvent>>,
    event_tx: mpsc::Sender<WsEvent>,
    task_handle: Option<JoinHandle<mpsc::Receiver<Command>>>,
    /// Outlives individual tasks so restarts re-join the same groups.
    groups: Arc<Mutex<GroupMemberships>>,
    ready_state: Arc<AtomicU16>,
    running: Arc<AtomicBool>,
}

impl WsClient {
    /// Create a new WS client. Does not connect yet.
    pub fn new(config: WsConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        Self {
            config,
            cmd_tx,
            cmd_rx: Some(cmd_rx),
            event_rx: tokio::sync::Mutex::new(event_rx),
            event_tx,
            task_handle: None,
            groups: Arc::new(Mutex::new(GroupMemberships::new())),
            ready_state: Arc::new(AtomicU16::new(ReadyState::Closed as u16)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect to the WebSocket server.
    ///
    /// Spawns a background tokio task that manages the connection,
    /// ping/pong keepalive, reconnection, and group membership.
    pub async fn connect(&mut self) -> Result<(), WsError> {
        if let Some(handle) = self.task_handle.take() {
            if !handle.is_finished() {
                self.task_handle = Some(handle);
                return Ok(());
            }
            // Task gave up on its own (max reconnects); reclaim the receiver.
            if let Ok(cmd_rx) = handle.await {
                self.cmd_rx = Some(cmd_rx);
            }
        }

        let cmd_rx = match self.cmd_rx.take() {
            Some(rx) => rx,
            None => {
                // The previous task never handed the receiver back.
                let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
                self.cmd_tx = cmd_tx;
                cmd_rx
            }
        };

        self.ready_state
            .store(ReadyState::Connecting as u16, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            groups: Arc::clone(&self.groups),
            reconnect_attempts: 0,
            ready_state: Arc::clone(&self.ready_state),
            running: Arc::clone(&self.running),
        };

        self.task_handle = Some(tokio::spawn(run_task(state)));
        Ok(())
    }

    /// Disconnect from the WebSocket server.
    ///
    /// Sends a graceful close to the background task and waits for it to finish.
    pub async fn disconnect(&mut self) -> Result<(), WsError> {
        if let Some(handle) = self.task_handle.take() {
            let _ = self.cmd_tx.send(Command::Disconnect).await;
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(cmd_rx)) => self.cmd_rx = Some(cmd_rx),
                Ok(Err(e)) => tracing::warn!(error = %e, "Push task ended abnormally"),
                Err(_) => tracing::warn!("Push task did not stop within 5s"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);
        Ok(())
    }

    /// A cloneable sender for this client (implements `GroupTransport`).
    pub fn handle(&self) -> WsHandle {
        WsHandle {
            cmd_tx: self.cmd_tx.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Send a message to the server.
    pub fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        self.handle().send(msg)
    }

    /// Join an auction's push group.
    pub fn join_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.send(MessageOut::join_group(auction_id.clone()))
    }

    /// Leave an auction's push group.
    pub fn leave_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.send(MessageOut::leave_group(auction_id.clone()))
    }

    /// Whether the WebSocket is currently open.
    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }

    /// Force a fresh connection attempt.
    ///
    /// Tears down the current connection (if any), resets the reconnect
    /// counter, and spawns a new background task that re-joins every group
    /// still held.
    pub async fn restart_connection(&mut self) {
        if self.ready_state() == ReadyState::Connecting {
            tracing::info!("Already connecting, skipping restart");
            return;
        }

        tracing::info!("Manual reconnection requested");
        self.disconnect().await.ok();
        self.connect().await.ok();
    }

    /// Get a stream of events from the WebSocket connection.
    ///
    /// The returned stream borrows `self`, so it must be dropped
    /// before calling `disconnect()`.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = WsEvent> + Send + '_>> {
        Box::pin(futures_util::stream::unfold(
            &self.event_rx,
            |rx| async move {
                let mut guard = rx.lock().await;
                guard.recv().await.map(|event| (event, rx))
            },
        ))
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) -> mpsc::Receiver<Command> {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        let (sink, stream) = match attempt_connect(&state.config.url).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(url = %state.config.url, error = %e, "Push connection failed");
                state.emit(WsEvent::Error(e.to_string()));

                if state.should_reconnect() {
                    backoff_sleep(&mut state, false).await;
                    if drain_commands(&mut state) {
                        continue;
                    }
                } else {
                    state.emit(WsEvent::MaxReconnectReached);
                }
                break;
            }
        };

        // ── 2. Connected: re-join tracked groups before announcing ───────
        state.reconnect_attempts = 0;
        let mut sink = sink;
        rejoin_all(&mut sink, &state.groups).await;
        state.set_ready_state(ReadyState::Open);
        state.emit(WsEvent::Connected);

        // ── 3. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 4. Post-disconnect decision ──────────────────────────────────
        state.set_ready_state(ReadyState::Closed);

        let rate_limited = match reason {
            DisconnectReason::UserRequested | DisconnectReason::NormalClose => break,
            DisconnectReason::RateLimited => true,
            DisconnectReason::PongTimeout | DisconnectReason::Error(_) => false,
        };

        if !state.should_reconnect() {
            state.emit(WsEvent::MaxReconnectReached);
            break;
        }
        state.set_ready_state(ReadyState::Connecting);
        backoff_sleep(&mut state, rate_limited).await;
        if !drain_commands(&mut state) {
            break;
        }
    }

    state.set_ready_state(ReadyState::Closed);
    state.running.store(false, Ordering::SeqCst);
    state.cmd_rx
}

/// What one read from the socket means for the connected loop.
#[derive(Debug)]
enum Frame {
    Event(Kind),
    Undecodable(String),
    PingFrom(Vec<u8>),
    Closed {
        code: Option<u16>,
        reason: String,
        cause: DisconnectReason,
    },
    Ignored,
}

fn classify(read: Option<Result<Message, WsProtocolError>>) -> Frame {
    match read {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<MessageIn>(text.as_str()) {
            Ok(msg) => Frame::Event(msg.kind),
            Err(e) => Frame::Undecodable(e.to_string()),
        },
        Some(Ok(Message::Ping(data))) => Frame::PingFrom(data.to_vec()),
        Some(Ok(Message::Close(frame))) => {
            let (code, reason) = match frame {
                Some(f) => (u16::from(f.code), f.reason.to_string()),
                None => (1006, "No close frame".to_string()),
            };
            let cause = match code {
                1000 => DisconnectReason::NormalClose,
                1008 => DisconnectReason::RateLimited,
                _ => DisconnectReason::Error(reason.clone()),
            };
            Frame::Closed {
                code: Some(code),
                reason,
                cause,
            }
        }
        Some(Ok(_)) => Frame::Ignored,
        Some(Err(e)) => Frame::Closed {
            code: None,
            reason: e.to_string(),
            cause: DisconnectReason::Error(e.to_string()),
        },
        None => Frame::Closed {
            code: None,
            reason: "Stream ended".into(),
            cause: DisconnectReason::Error("Stream ended".into()),
        },
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl TaskState {
    /// Apply one command. Returns a reason when the loop must end.
    async fn handle_command(
        &mut self,
        sink: &mut WsSink,
        cmd: Option<Command>,
    ) -> Option<DisconnectReason> {
        match cmd {
            Some(Command::Send(msg)) => {
                if !self.groups.lock().track(&msg) {
                    tracing::debug!(message = ?msg, "Membership unchanged, nothing to send");
                } else if let Err(e) = send_msg(sink, &msg).await {
                    tracing::warn!(error = %e, "Send failed");
                }
                None
            }
            Some(Command::Disconnect) | None => {
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "Client disconnect".into(),
                };
                let _ = sink.send(Message::Close(Some(close))).await;
                Some(DisconnectReason::UserRequested)
            }
        }
    }
}

/// The connected loop. Runs until the connection breaks or is closed.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let pong_timeout = Duration::from_millis(state.config.pong_timeout_ms as u64);
    let mut ping_interval =
        tokio::time::interval(Duration::from_millis(state.config.ping_interval_ms as u64));
    ping_interval.reset();
    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            read = stream.next() => match classify(read) {
                Frame::Event(kind) => {
                    if matches!(kind, Kind::Pong) {
                        pong_deadline = None;
                    }
                    state.emit(WsEvent::Message(kind));
                }
                Frame::Undecodable(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable push frame");
                    state.emit(WsEvent::Error(WsError::DeserializationError(e).to_string()));
                }
                Frame::PingFrom(data) => {
                    let _ = sink.send(Message::Pong(data.into())).await;
                }
                Frame::Closed { code, reason, cause } => {
                    if matches!(cause, DisconnectReason::Error(_)) {
                        tracing::warn!(code = ?code, reason = %reason, "Push connection lost");
                    }
                    state.emit(WsEvent::Disconnected { code, reason });
                    return cause;
                }
                Frame::Ignored => {}
            },

            cmd = state.cmd_rx.recv() => {
                if let Some(reason) = state.handle_command(&mut sink, cmd).await {
                    return reason;
                }
            }

            _ = ping_interval.tick() => {
                match send_msg(&mut sink, &MessageOut::ping()).await {
                    Err(e) => tracing::warn!(error = %e, "Failed to send ping"),
                    Ok(()) if pong_deadline.is_none() => {
                        pong_deadline = Some(Instant::now() + pong_timeout);
                    }
                    Ok(()) => {}
                }
            }

            () = until(pong_deadline) => {
                tracing::warn!(timeout_ms = state.config.pong_timeout_ms, "No pong from push server");
                state.emit(WsEvent::Disconnected {
                    code: None,
                    reason: "Pong timeout".into(),
                });
                let _ = sink.close().await;
                return DisconnectReason::PongTimeout;
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish a WebSocket connection with a 30-second timeout.
async fn attempt_connect(url: &str) -> Result<(WsSink, SplitStream<WsStream>), WsError> {
    let (ws_stream, _) = tokio::time::timeout(Duration::from_secs(30), connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut WsSink, msg: &MessageOut) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::SendFailed(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

async fn rejoin_all(sink: &mut WsSink, groups: &Mutex<GroupMemberships>) {
    let held = groups.lock().groups();
    if held.is_empty() {
        return;
    }
    tracing::info!(groups = held.len(), "Re-joining auction groups");
    for auction_id in held {
        if let Err(e) = send_msg(sink, &MessageOut::join_group(auction_id.clone())).await {
            tracing::warn!(auction_id = %auction_id, error = %e, "Failed to re-join group");
        }
    }
}

/// Fold commands that arrived while disconnected into the membership counts;
/// they reach the server through `rejoin_all`. Returns `false` on disconnect.
fn drain_commands(state: &mut TaskState) -> bool {
    loop {
        match state.cmd_rx.try_recv() {
            Ok(Command::Send(msg)) => {
                state.groups.lock().track(&msg);
            }
            Ok(Command::Disconnect) => return false,
            Err(mpsc::error::TryRecvError::Empty) => return true,
            Err(mpsc::error::TryRecvError::Disconnected) => return false,
        }
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

fn reconnect_delay_ms(base_ms: u32, attempt: u32, rate_limited: bool, jitter: u32) -> u32 {
    let exp = attempt.saturating_sub(1).min(10);
    let base = base_ms.saturating_mul(1u32 << exp);
    let cap = if rate_limited { 300_000 } else { 60_000 };
    base.saturating_add(jitter).min(cap)
}

async fn backoff_sleep(state: &mut TaskState, rate_limited: bool) {
    state.reconnect_attempts += 1;

    let jitter_max = if rate_limited { 1000u32 } else { 500u32 };
    let jitter = rand::random::<u32>() % jitter_max;
    let delay = reconnect_delay_ms(
        state.config.base_reconnect_delay_ms,
        state.reconnect_attempts,
        rate_limited,
        jitter,
    );

    tracing::info!(
        attempt = state.reconnect_attempts,
        max_attempts = state.config.max_reconnect_attempts,
        delay_ms = delay,
        rate_limited,
        "Reconnecting push connection"
    );

    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
