use std::time::Duration;
use thiserror::Error;

/// Faults of the underlying byte stream; all of them end the session
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("transport is not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("read failed: {0}")]
    ReadFailed(#[source] std::io::Error),
}

/// Errors returned synchronously by [`ChatSession`](crate::ChatSession)
/// operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,

    #[error("session has not joined the chat")]
    NotJoined,

    #[error("session has already joined the chat")]
    AlreadyJoined,

    #[error("session is already open")]
    AlreadyOpen,

    #[error("session is closed")]
    SessionClosed,

    #[error(transparent)]
    Protocol(#[from] dogechat_protocol::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
