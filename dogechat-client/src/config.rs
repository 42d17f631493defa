use std::time::Duration;

/// Tuning for [`TcpTransport`](crate::TcpTransport)
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// How long to wait for the TCP handshake before failing the session
    pub connect_timeout: Duration,
    /// Largest chunk handed to the session per read
    pub read_buffer_size: usize,
    /// How long `close` lets queued writes drain before dropping the stream
    pub close_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: 1024,
            close_timeout: Duration::from_secs(5),
        }
    }
}
