//! A reconnecting message session to one backend endpoint.
//!
//! Each [`Session`] is backed by a single spawned task that owns the
//! transport, the outbound queue and the backoff schedule. Handles talk to
//! it over an unbounded command channel, so the connection state has one
//! writer. The task lives until `close()` is called or every handle is
//! dropped.

pub mod backoff;
mod listeners;
mod queue;

pub use listeners::{Handler, Subscription};
pub use queue::OutboundQueue;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use crate::config::{QueueConfig, ReconnectConfig};
use crate::error::SessionError;
use crate::transport::{Connector, Frame, Transport, WsConnector};
use self::backoff::Backoff;
use self::listeners::Listeners;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Open,
}

enum Command {
    Connect,
    Send(Frame),
    Close,
}

struct Shared {
    listeners: Arc<Listeners>,
    delay_ms: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct Session {
    endpoint: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SessionState>,
    shared: Arc<Shared>,
}

impl Session {
    /// Start the session task. Nothing is dialled until the first
    /// `connect()` or `send()`.
    pub fn spawn(connector: Arc<dyn Connector>, reconnect: &ReconnectConfig, queue: &QueueConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Closed);
        let backoff = Backoff::new(reconnect);
        let shared = Arc::new(Shared {
            listeners: Arc::new(Listeners::default()),
            delay_ms: AtomicU64::new(duration_ms(backoff.current())),
            closed: AtomicBool::new(false),
        });
        let endpoint: Arc<str> = Arc::from(connector.endpoint());

        let actor = Actor {
            connector,
            commands: command_rx,
            state_tx,
            shared: shared.clone(),
            queue: OutboundQueue::new(queue),
            backoff,
            endpoint: endpoint.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            endpoint,
            commands,
            state_rx,
            shared,
        }
    }

    pub fn websocket(url: impl Into<String>, reconnect: &ReconnectConfig, queue: &QueueConfig) -> Self {
        Self::spawn(Arc::new(WsConnector::new(url)), reconnect, queue)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// No-op while connecting, open, or after `close()`
    pub fn connect(&self) {
        if self.is_closed() {
            return;
        }
        let _ = self.commands.send(Command::Connect);
    }

    /// Transmit now if open, otherwise queue the frame and start connecting
    pub fn send(&self, frame: Frame) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.commands
            .send(Command::Send(frame))
            .map_err(|_| SessionError::Closed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Frame::Text(text.into()))
    }

    pub fn send_binary(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.send(Frame::Binary(bytes))
    }

    /// Handlers see every inbound frame in arrival order. They run on the
    /// session task and must not block.
    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.shared.listeners.add(Arc::new(handler))
    }

    pub async fn next_message(&self) -> Result<Frame, SessionError> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let subscription = self.on_message(move |frame| {
            let sender = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
            if let Some(sender) = sender {
                let _ = sender.send(frame.clone());
            }
        });

        let result = tokio::select! {
            frame = rx => frame.map_err(|_| SessionError::Closed),
            _ = self.commands.closed() => Err(SessionError::Closed),
        };
        subscription.unsubscribe();
        result
    }

    /// Stop reconnecting and close the transport. Terminal.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(Command::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub async fn wait_for_state(&self, target: SessionState) -> Result<(), SessionError> {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::Closed)
    }

    /// Delay before the next reconnect attempt
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.shared.delay_ms.load(Ordering::SeqCst))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

enum Attempt {
    Connected(Box<dyn Transport>),
    Failed,
    Stop,
}

enum Next {
    Reconnect,
    Stop,
}

struct Actor {
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SessionState>,
    shared: Arc<Shared>,
    queue: OutboundQueue,
    backoff: Backoff,
    endpoint: Arc<str>,
}

impl Actor {
    async fn run(mut self) {
        if self.wait_for_demand().await {
            loop {
                self.set_state(SessionState::Connecting);
                let next = match self.connect_once().await {
                    Attempt::Connected(transport) => self.run_open(transport).await,
                    Attempt::Failed => Next::Reconnect,
                    Attempt::Stop => Next::Stop,
                };
                if let Next::Stop = next {
                    break;
                }
                self.set_state(SessionState::Closed);
                if let Next::Stop = self.wait_backoff().await {
                    break;
                }
            }
        }

        self.shared.closed.store(true, Ordering::SeqCst);
        self.set_state(SessionState::Closed);
        if !self.queue.is_empty() {
            tracing::debug!("Discarding {} queued frames for {}", self.queue.len(), self.endpoint);
        }
        tracing::info!("Session to {} closed", self.endpoint);
    }

    /// Idle until someone wants the connection. False if the session ends first.
    async fn wait_for_demand(&mut self) -> bool {
        match self.commands.recv().await {
            Some(Command::Connect) => true,
            Some(Command::Send(frame)) => {
                self.enqueue(frame);
                true
            }
            Some(Command::Close) | None => false,
        }
    }

    async fn connect_once(&mut self) -> Attempt {
        tracing::debug!("Connecting to {}", self.endpoint);
        let connector = self.connector.clone();
        let attempt = connector.connect();
        tokio::pin!(attempt);
        let mut close_requested = false;

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(mut transport) if close_requested => {
                            transport.close().await;
                            Attempt::Stop
                        }
                        Ok(transport) => Attempt::Connected(transport),
                        Err(_) if close_requested => Attempt::Stop,
                        Err(e) => {
                            tracing::warn!("Connection to {} failed: {}", self.endpoint, e);
                            Attempt::Failed
                        }
                    };
                }
                command = self.commands.recv(), if !close_requested => {
                    match command {
                        Some(Command::Send(frame)) => self.enqueue(frame),
                        Some(Command::Connect) => {}
                        // The handshake is allowed to finish, then torn down
                        Some(Command::Close) | None => close_requested = true,
                    }
                }
            }
        }
    }

    async fn run_open(&mut self, mut transport: Box<dyn Transport>) -> Next {
        self.backoff.reset();
        self.publish_delay();

        while let Some(frame) = self.queue.pop() {
            if let Err(e) = transport.send(frame.clone()).await {
                tracing::warn!("Failed to flush queued frame to {}: {}", self.endpoint, e);
                self.queue.requeue(frame);
                transport.close().await;
                return Next::Reconnect;
            }
        }

        self.set_state(SessionState::Open);
        tracing::info!("Connected to {}", self.endpoint);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Send(frame)) => {
                            if let Err(e) = transport.send(frame.clone()).await {
                                tracing::warn!("Send to {} failed: {}", self.endpoint, e);
                                self.queue.requeue(frame);
                                transport.close().await;
                                return Next::Reconnect;
                            }
                        }
                        Some(Command::Connect) => {}
                        Some(Command::Close) | None => {
                            transport.close().await;
                            return Next::Stop;
                        }
                    }
                }
                inbound = transport.recv() => {
                    match inbound {
                        Some(Ok(frame)) => self.shared.listeners.dispatch(&frame),
                        Some(Err(e)) => {
                            tracing::warn!("Connection to {} lost: {}", self.endpoint, e);
                            transport.close().await;
                            return Next::Reconnect;
                        }
                        None => {
                            tracing::info!("Connection to {} closed by peer", self.endpoint);
                            return Next::Reconnect;
                        }
                    }
                }
            }
        }
    }

    /// Sleep out the current delay. A new connect or send ends the wait early.
    async fn wait_backoff(&mut self) -> Next {
        let wait = self.backoff.on_failure();
        self.publish_delay();
        tracing::debug!("Reconnecting to {} in {}ms", self.endpoint, wait.as_millis());

        let sleep = tokio::time::sleep(wait);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => Next::Reconnect,
            command = self.commands.recv() => match command {
                Some(Command::Send(frame)) => {
                    self.enqueue(frame);
                    Next::Reconnect
                }
                Some(Command::Connect) => Next::Reconnect,
                Some(Command::Close) | None => Next::Stop,
            },
        }
    }

    fn enqueue(&mut self, frame: Frame) {
        if let Some(dropped) = self.queue.push(frame) {
            tracing::warn!(
                "Outbound queue for {} is full, dropped a {}-byte frame",
                self.endpoint,
                dropped.len()
            );
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    fn publish_delay(&self) {
        self.shared.delay_ms.store(duration_ms(self.backoff.current()), Ordering::SeqCst);
    }
}
