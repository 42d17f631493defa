/// Byte-stream transport and its TCP implementation
use crate::{config::TransportConfig, error::TransportError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use tokio_util::{bytes::Bytes, sync::CancellationToken};

/// Lifecycle events emitted by a [`Transport`]
#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    DataReceived(Bytes),
    EndOfStream,
    Error(TransportError),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A connection to a single remote endpoint
///
/// None of the methods block: the outcome of `connect` and any later I/O
/// fault arrive on the event channel passed to `connect`.
pub trait Transport: Send + 'static {
    /// Starts connecting; reports `Connected` or `Error` on `events`
    fn connect(&mut self, host: &str, port: u16, events: EventSender);

    /// Queues `data` for writing
    fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Releases the stream in both directions. Safe to call repeatedly.
    fn close(&mut self);
}

/// [`Transport`] over a tokio `TcpStream`
///
/// I/O runs on a spawned task, so `connect` must be called from within a
/// Tokio runtime.
#[derive(Debug, Default)]
pub struct TcpTransport {
    config: TransportConfig,
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    cancel: Option<CancellationToken>,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            outbound: None,
            cancel: None,
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16, events: EventSender) {
        self.close();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.outbound = Some(outbound_tx);
        self.cancel = Some(cancel.clone());
        tokio::spawn(run_connection(
            format!("{host}:{port}"),
            self.config.clone(),
            outbound_rx,
            events,
            cancel,
        ));
    }

    fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        outbound
            .send(data)
            .map_err(|_| TransportError::NotConnected)
    }

    fn close(&mut self) {
        // Dropping the sender lets the connection task flush queued writes
        // before shutting the stream down
        self.outbound = None;
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            tracing::debug!("transport closed");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    addr: String,
    config: TransportConfig,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    events: EventSender,
    cancel: CancellationToken,
) {
    let connect = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr.as_str()));
    let stream = tokio::select! {
        result = connect => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                emit(&events, TransportEvent::Error(TransportError::ConnectFailed { addr, source }));
                return;
            }
            Err(_) => {
                let timeout = config.connect_timeout;
                emit(&events, TransportEvent::Error(TransportError::ConnectTimeout { addr, timeout }));
                return;
            }
        },
        _ = cancel.cancelled() => {
            tracing::debug!(%addr, "connect abandoned");
            return;
        }
    };

    tracing::info!(%addr, "connected");
    emit(&events, TransportEvent::Connected);

    let io = pump(&addr, stream, config.read_buffer_size, &mut outbound, &events);
    tokio::pin!(io);
    tokio::select! {
        _ = &mut io => {}
        _ = cancel.cancelled() => {
            // The owner dropped its sender, so the pump ends once the queue drains
            if tokio::time::timeout(config.close_timeout, &mut io).await.is_err() {
                tracing::warn!(%addr, "peer stopped reading, dropping queued writes");
            }
        }
    }
}

async fn pump(
    addr: &str,
    stream: TcpStream,
    read_buffer_size: usize,
    outbound: &mut mpsc::UnboundedReceiver<Bytes>,
    events: &EventSender,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut chunk = vec![0u8; read_buffer_size.max(1)];
    loop {
        tokio::select! {
            // Bytes from the peer
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    tracing::debug!(%addr, "end of stream");
                    emit(events, TransportEvent::EndOfStream);
                    break;
                }
                Ok(n) => {
                    tracing::trace!(%addr, bytes = n, "read");
                    emit(events, TransportEvent::DataReceived(Bytes::copy_from_slice(&chunk[..n])));
                }
                Err(e) => {
                    emit(events, TransportEvent::Error(TransportError::ReadFailed(e)));
                    break;
                }
            },

            // Bytes queued by the owner
            maybe_data = outbound.recv() => match maybe_data {
                Some(data) => {
                    if let Err(e) = writer.write_all(&data).await {
                        emit(events, TransportEvent::Error(TransportError::WriteFailed(e)));
                        break;
                    }
                }
                None => {
                    if let Err(error) = writer.shutdown().await {
                        tracing::debug!(%addr, %error, "shutdown failed");
                    }
                    break;
                }
            },
        }
    }
}

// The owner may already have dropped its receiver after closing
fn emit(events: &EventSender, event: TransportEvent) {
    if events.send(event).is_err() {
        tracing::trace!("transport event dropped, session gone");
    }
}

#[cfg(test)]
mod test {
    use super::{TcpTransport, Transport, TransportEvent};
    use crate::{config::TransportConfig, error::TransportError};
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpSocket, TcpStream},
        sync::mpsc,
        time::{sleep, timeout},
    };
    use tokio_util::bytes::Bytes;

    const WAIT: Duration = Duration::from_secs(3);

    async fn next(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, events.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn test_send_before_connect_is_rejected() {
        let mut transport = TcpTransport::default();
        let result = transport.send(Bytes::from_static(b"msg:hi\n"));
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_send_receive_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let mut transport = TcpTransport::new(TransportConfig::default());
        transport.connect("127.0.0.1", port, events_tx);
        let (mut peer, _) = listener.accept().await.unwrap();
        assert!(matches!(next(&mut events).await, TransportEvent::Connected));

        transport.send(Bytes::from_static(b"iam:bob\n")).unwrap();
        let mut received = [0u8; 8];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"iam:bob\n");

        peer.write_all(b"bob:hi\n").await.unwrap();
        match next(&mut events).await {
            TransportEvent::DataReceived(data) => assert_eq!(&data[..], b"bob:hi\n"),
            other => panic!("expected data, got {other:?}"),
        }

        transport.close();
        transport.close();
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        assert!(matches!(
            transport.send(Bytes::from_static(b"msg:late\n")),
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_peer_close_is_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let mut transport = TcpTransport::default();
        transport.connect("127.0.0.1", port, events_tx);
        let (peer, _) = listener.accept().await.unwrap();
        assert!(matches!(next(&mut events).await, TransportEvent::Connected));

        drop(peer);
        assert!(matches!(next(&mut events).await, TransportEvent::EndOfStream));
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let mut transport = TcpTransport::default();
        transport.connect("127.0.0.1", port, events_tx);
        assert!(matches!(
            next(&mut events).await,
            TransportEvent::Error(TransportError::ConnectFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_timeout_is_error() {
        // Once the accept queue is full, further handshakes are left hanging
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut queued = Vec::new();
        while queued.len() < 64 {
            match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(stream) => queued.push(stream.unwrap()),
                Err(_) => break,
            }
        }

        let config = TransportConfig {
            connect_timeout: Duration::from_millis(200),
            ..TransportConfig::default()
        };
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(config);
        transport.connect("127.0.0.1", addr.port(), events_tx);
        match next(&mut events).await {
            TransportEvent::Error(TransportError::ConnectTimeout { timeout, .. }) => {
                assert_eq!(timeout, Duration::from_millis(200))
            }
            other => panic!("expected connect timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_gives_up_on_stalled_peer() {
        const STALLED: usize = 32 * 1024 * 1024;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let config = TransportConfig {
            close_timeout: Duration::from_millis(200),
            ..TransportConfig::default()
        };
        let mut transport = TcpTransport::new(config);
        transport.connect("127.0.0.1", port, events_tx);
        let (mut peer, _) = listener.accept().await.unwrap();
        assert!(matches!(next(&mut events).await, TransportEvent::Connected));

        // More than the socket buffers hold, so the write stalls while the
        // peer is not reading
        transport.send(Bytes::from(vec![b'x'; STALLED])).unwrap();
        transport.close();
        sleep(Duration::from_millis(600)).await;

        let mut received = Vec::new();
        let _ = timeout(WAIT, peer.read_to_end(&mut received))
            .await
            .expect("stream was never released");
        assert!(received.len() < STALLED);
    }
}
