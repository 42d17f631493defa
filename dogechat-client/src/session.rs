/// Chat session state machine
use crate::{
    config::TransportConfig,
    error::SessionError,
    observer::{DisconnectReason, SessionObserver},
    transport::{TcpTransport, Transport, TransportEvent},
};
use dogechat_protocol::{Command, CommandCodec, Error, InboundBuffer, Message};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::{bytes::BytesMut, codec::Encoder};

/// Where a session is in its lifecycle
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Closed
///                      \            \
///                       +------------+----> Failed
/// ```
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Failed,
}

impl ConnectionState {
    /// Closed and Failed are final; a new session is needed to chat again
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    fn is_live(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Counters for everything the session refused
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SessionStats {
    /// Inbound frames skipped because they could not be decoded
    pub malformed_frames: u64,
    /// Calls to `open`/`join`/`send` that returned an error
    pub rejected_commands: u64,
}

/// Binds one username to one transport connection
///
/// All methods take `&mut self`: the owner drives the session from a single
/// task, pulling transport events with [`next_event`] and applying them with
/// [`handle_event`].
///
/// [`next_event`]: ChatSession::next_event
/// [`handle_event`]: ChatSession::handle_event
pub struct ChatSession<T: Transport> {
    transport: T,
    state: ConnectionState,
    username: Option<String>,
    encoder: CommandCodec,
    inbound: InboundBuffer,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    observer: Option<Weak<dyn SessionObserver>>,
    stats: SessionStats,
}

impl ChatSession<TcpTransport> {
    pub fn tcp(config: TransportConfig) -> Self {
        Self::new(TcpTransport::new(config))
    }
}

impl<T: Transport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            username: None,
            encoder: CommandCodec::default(),
            inbound: InboundBuffer::default(),
            events: None,
            observer: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Registers `observer` without taking ownership of it, replacing any
    /// previous one
    pub fn subscribe<O: SessionObserver + 'static>(&mut self, observer: &Arc<O>) {
        let observer: Arc<dyn SessionObserver> = observer.clone();
        self.subscribe_weak(Arc::downgrade(&observer));
    }

    /// Like [`subscribe`](ChatSession::subscribe), for observers that are
    /// already type-erased
    pub fn subscribe_weak(&mut self, observer: Weak<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn unsubscribe(&mut self) {
        self.observer = None;
    }

    /// Starts connecting to `host:port`
    pub fn open(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Connecting | ConnectionState::Connected => {
                return self.reject(SessionError::AlreadyOpen)
            }
            ConnectionState::Closed | ConnectionState::Failed => {
                return self.reject(SessionError::SessionClosed)
            }
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events = Some(events_rx);
        self.state = ConnectionState::Connecting;
        tracing::info!(host, port, "opening chat session");
        self.transport.connect(host, port, events_tx);
        Ok(())
    }

    /// Announces the user to the server; allowed once per session
    pub fn join(&mut self, username: impl Into<String>) -> Result<(), SessionError> {
        self.check_connected()?;
        if self.username.is_some() {
            return self.reject(SessionError::AlreadyJoined);
        }
        let username = username.into();
        self.transmit(Command::join(username.clone()))?;
        tracing::info!(%username, "joined chat");
        self.inbound.set_username(username.clone());
        self.username = Some(username);
        Ok(())
    }

    pub fn send(&mut self, body: impl Into<String>) -> Result<(), SessionError> {
        self.check_connected()?;
        if self.username.is_none() {
            return self.reject(SessionError::NotJoined);
        }
        self.transmit(Command::send(body))
    }

    /// Ends the session from any state
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            self.transport.close();
            return;
        }
        tracing::info!(state = ?self.state, "closing chat session");
        self.terminate(ConnectionState::Closed, DisconnectReason::LocalClose);
    }

    /// Waits for the next transport event
    ///
    /// Returns `None` once the session is no longer open.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let events = self.events.as_mut()?;
        match events.recv().await {
            Some(event) => Some(event),
            // The transport went away without saying why
            None if self.state.is_live() => Some(TransportEvent::EndOfStream),
            None => None,
        }
    }

    /// Applies one transport event to the session
    pub fn handle_event(&mut self, event: TransportEvent) {
        if !self.state.is_live() {
            tracing::debug!(state = ?self.state, ?event, "ignoring transport event");
            return;
        }
        match event {
            TransportEvent::Connected => self.mark_connected(),
            TransportEvent::DataReceived(data) => {
                // Bytes on the stream prove it is up, even if the transport
                // has not said so yet
                if self.state == ConnectionState::Connecting {
                    tracing::debug!(bytes = data.len(), "data received before connect event");
                    self.mark_connected();
                }
                for decoded in self.inbound.feed(&data) {
                    self.deliver(decoded);
                }
            }
            TransportEvent::EndOfStream => {
                for decoded in self.inbound.finish() {
                    self.deliver(decoded);
                }
                tracing::info!("server closed the chat session");
                self.terminate(ConnectionState::Closed, DisconnectReason::EndOfStream);
            }
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, "chat session failed");
                self.terminate(ConnectionState::Failed, DisconnectReason::Transport(e));
            }
        }
    }

    /// Drives the session until it closes or fails
    pub async fn run_until_closed(&mut self) {
        while let Some(event) = self.next_event().await {
            self.handle_event(event);
        }
    }

    fn mark_connected(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            tracing::info!("chat session connected");
            if let Some(observer) = self.observer() {
                observer.on_connected();
            }
        }
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }

    fn deliver(&mut self, decoded: Result<Message, Error>) {
        match decoded {
            Ok(message) => match self.observer() {
                Some(observer) => observer.on_message_received(message),
                None => tracing::debug!(sender = %message.sender_name, "no observer for message"),
            },
            Err(e) => {
                self.stats.malformed_frames += 1;
                if let Some(observer) = self.observer() {
                    observer.on_frame_rejected(&e);
                }
            }
        }
    }

    fn transmit(&mut self, command: Command) -> Result<(), SessionError> {
        let mut frame = BytesMut::new();
        if let Err(e) = self.encoder.encode(command, &mut frame) {
            return self.reject(e.into());
        }
        if let Err(e) = self.transport.send(frame.freeze()) {
            return self.reject(e.into());
        }
        Ok(())
    }

    fn check_connected(&mut self) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed | ConnectionState::Failed => {
                self.reject(SessionError::SessionClosed)
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                self.reject(SessionError::NotConnected)
            }
        }
    }

    fn reject<R>(&mut self, error: SessionError) -> Result<R, SessionError> {
        self.stats.rejected_commands += 1;
        tracing::debug!(%error, "rejected session command");
        Err(error)
    }

    // Single exit path: the observer hears about it at most once, then is
    // released along with the stream and any buffered bytes
    fn terminate(&mut self, next: ConnectionState, reason: DisconnectReason) {
        let was_live = self.state.is_live();
        self.state = next;
        self.transport.close();
        self.events = None;
        self.inbound.clear();
        if was_live {
            if let Some(observer) = self.observer() {
                observer.on_disconnected(reason);
            }
        }
        self.unsubscribe();
    }
}
