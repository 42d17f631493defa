//! Relay behaviour seen from raw protocol clients.

use anyhow::{Context, Result};
use dogechat_protocol::{Command, CommandCodec, Message, MessageCodec, Origin};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_util::codec::{FramedRead, FramedWrite};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

struct Client {
    reader: FramedRead<ReadHalf<TcpStream>, MessageCodec>,
    writer: FramedWrite<WriteHalf<TcpStream>, CommandCodec>,
}

impl Client {
    async fn connect(addr: &str, username: &str) -> Result<Self> {
        let (rx, tx) = tokio::io::split(TcpStream::connect(addr).await?);
        let mut codec = MessageCodec::default();
        codec.set_username(username);
        let mut client = Self {
            reader: FramedRead::new(rx, codec),
            writer: FramedWrite::new(tx, CommandCodec::default()),
        };
        client.writer.send(Command::join(username)).await?;
        Ok(client)
    }

    async fn say(&mut self, body: &str) -> Result<()> {
        self.writer.send(Command::send(body)).await?;
        Ok(())
    }

    async fn next(&mut self, what: &str) -> Result<Message> {
        let frame = timeout(READ_TIMEOUT, self.reader.next())
            .await
            .with_context(|| format!("timed out {what}"))?
            .with_context(|| format!("stream ended {what}"))??;
        Ok(frame)
    }
}

async fn start_relay() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        let _ = dogechat_server::serve(listener).await;
    });
    Ok(addr)
}

#[tokio::test]
async fn relays_to_everyone_including_sender() -> Result<()> {
    let addr = start_relay().await?;

    // each client hearing its own echo proves it is subscribed
    let mut alice = Client::connect(&addr, "alice").await?;
    alice.say("ping").await?;
    assert_eq!(
        alice.next("waiting for alice echo").await?,
        Message::new("alice", "ping", Origin::Ourself)
    );

    let mut bob = Client::connect(&addr, "bob").await?;
    bob.say("ping").await?;
    assert_eq!(
        bob.next("waiting for bob echo").await?,
        Message::new("bob", "ping", Origin::Ourself)
    );
    assert_eq!(
        alice.next("waiting for alice to hear bob").await?,
        Message::new("bob", "ping", Origin::Other)
    );

    alice.say("such relay: very wow").await?;
    assert_eq!(
        bob.next("waiting for bob to hear alice").await?,
        Message::new("alice", "such relay: very wow", Origin::Other)
    );
    assert_eq!(
        alice.next("waiting for second alice echo").await?,
        Message::new("alice", "such relay: very wow", Origin::Ourself)
    );
    Ok(())
}

#[tokio::test]
async fn drops_messages_before_iam() -> Result<()> {
    let addr = start_relay().await?;
    let (rx, tx) = tokio::io::split(TcpStream::connect(&addr).await?);
    let mut reader = FramedRead::new(rx, MessageCodec::default());
    let mut writer = FramedWrite::new(tx, CommandCodec::default());

    writer.send(Command::send("who am i")).await?;
    writer.send(Command::join("carol")).await?;
    writer.send(Command::send("now i know")).await?;

    let message = timeout(READ_TIMEOUT, reader.next())
        .await?
        .context("stream ended")??;
    assert_eq!(message, Message::new("carol", "now i know", Origin::Other));
    Ok(())
}

#[tokio::test]
async fn bad_body_only_disconnects_its_sender() -> Result<()> {
    let addr = start_relay().await?;
    let mut alice = Client::connect(&addr, "alice").await?;
    alice.say("ping").await?;
    alice.next("waiting for alice echo").await?;

    let mut mallory = TcpStream::connect(&addr).await?;
    mallory.write_all(b"iam:mallory\nmsg:a\rb\n").await?;
    let mut rest = Vec::new();
    // a reset counts as disconnected too
    let _ = timeout(READ_TIMEOUT, mallory.read_to_end(&mut rest))
        .await
        .context("mallory was not disconnected")?;

    alice.say("still here?").await?;
    assert_eq!(
        alice.next("waiting for alice after mallory").await?,
        Message::new("alice", "still here?", Origin::Ourself)
    );
    Ok(())
}
