use crate::error::TransportError;
use dogechat_protocol::{Error, Message};
use std::fmt;

/// Why a session stopped
#[derive(Debug)]
pub enum DisconnectReason {
    /// The peer closed the stream
    EndOfStream,
    /// [`ChatSession::close`](crate::ChatSession::close) was called
    LocalClose,
    /// The transport failed
    Transport(TransportError),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::EndOfStream => write!(f, "server closed the connection"),
            DisconnectReason::LocalClose => write!(f, "session closed"),
            DisconnectReason::Transport(e) => write!(f, "{e}"),
        }
    }
}

/// Receives everything a [`ChatSession`](crate::ChatSession) has to report
///
/// The session only keeps a weak reference to its observer; the collaborator
/// that registers it owns it. Callbacks run synchronously on the task that
/// drives the session.
pub trait SessionObserver: Send + Sync {
    fn on_message_received(&self, message: Message);

    fn on_connected(&self) {}

    /// Called exactly once per opened session
    fn on_disconnected(&self, _reason: DisconnectReason) {}

    /// An inbound frame could not be decoded and was skipped
    fn on_frame_rejected(&self, _error: &Error) {}
}
