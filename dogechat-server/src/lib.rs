//! Relay server for the DogeChat line protocol
//!
//! Clients introduce themselves with `iam:<name>`; every `msg:<body>` that
//! follows is relayed to all connected clients, sender included, as
//! `<name>:<body>`.

use dogechat_protocol::{Command, CommandCodec, Error, MessageCodec, Relayed};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast::{self, error::RecvError},
};
use tokio_util::codec::{FramedRead, FramedWrite};

type ClientId = usize;

const RELAY_CAPACITY: usize = 256;

/// Accepts clients on `listener` until accepting fails
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    let (relay_tx, _relay_rx) = broadcast::channel::<Relayed>(RELAY_CAPACITY);
    let mut next_id: ClientId = 0;

    loop {
        let (stream, addr) = listener.accept().await?;
        // Subscribe before spawning so the client sees its own first message
        tokio::spawn(handle_client(
            next_id,
            stream,
            addr,
            relay_tx.clone(),
            relay_tx.subscribe(),
        ));
        next_id += 1;
    }
}

async fn handle_client(
    client_id: ClientId,
    stream: TcpStream,
    addr: SocketAddr,
    relay_tx: broadcast::Sender<Relayed>,
    mut relay_rx: broadcast::Receiver<Relayed>,
) {
    tracing::info!(client_id, %addr, "client connected");
    let (rx, tx) = tokio::io::split(stream);
    let mut reader = FramedRead::new(rx, CommandCodec::default());
    let mut writer = FramedWrite::new(tx, MessageCodec::default());
    let mut name: Option<String> = None;

    loop {
        tokio::select! {
            // Commands from the client
            maybe_frame = reader.next() => match maybe_frame {
                Some(Ok(Command::Join { username })) => {
                    tracing::info!(client_id, %username, "client joined");
                    name = Some(username);
                }
                Some(Ok(Command::Send { body })) => match &name {
                    Some(name) => {
                        if relay_tx.send(Relayed::new(name.as_str(), body)).is_err() {
                            tracing::debug!(client_id, "no clients to relay to");
                        }
                    }
                    None => tracing::warn!(client_id, "dropping message sent before iam"),
                },
                Some(Err(e)) => {
                    tracing::warn!(client_id, error = %e, "bad frame from client");
                    break;
                }
                None => break,
            },

            // Relayed messages to the client
            maybe_msg = relay_rx.recv() => match maybe_msg {
                Ok(msg) => match writer.send(msg).await {
                    Ok(()) => {}
                    // Nothing was written, the stream is still usable
                    Err(e @ Error::Encoding { .. }) => {
                        tracing::warn!(client_id, error = %e, "skipping unrelayable message");
                    }
                    Err(e) => {
                        tracing::warn!(client_id, error = %e, "write to client failed");
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(client_id, skipped, "client fell behind, messages skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!(client_id, name = name.as_deref().unwrap_or("-"), "client left");
}
