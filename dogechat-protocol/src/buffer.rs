/// Per-session accumulation of inbound bytes
use crate::{Error, Message, MessageCodec};
use tokio_util::{bytes::BytesMut, codec::Decoder};

/// Holds bytes received from the stream until they form complete frames
///
/// Reads may split or coalesce frames arbitrarily; feeding the same bytes in
/// any chunking produces the same messages. Consumed frames are removed, so a
/// message is never emitted twice.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    buffer: BytesMut,
    codec: MessageCodec,
}

impl InboundBuffer {
    pub fn new(codec: MessageCodec) -> Self {
        Self {
            buffer: BytesMut::new(),
            codec,
        }
    }

    /// Sets the username used to classify message origins
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.codec.set_username(username);
    }

    /// Appends `bytes` and resolves every complete frame now available
    ///
    /// A bad frame yields an `Err` in its position and scanning carries on
    /// with the rest of the buffer.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Message, Error>> {
        self.buffer.extend_from_slice(bytes);
        let mut decoded = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(msg)) => decoded.push(Ok(msg)),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping inbound frame");
                    decoded.push(Err(e));
                }
            }
        }
        decoded
    }

    /// Resolves whatever is left once the stream has ended, then empties the
    /// buffer
    pub fn finish(&mut self) -> Vec<Result<Message, Error>> {
        let mut decoded = Vec::new();
        loop {
            match self.codec.decode_eof(&mut self.buffer) {
                Ok(Some(msg)) => decoded.push(Ok(msg)),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping trailing frame");
                    decoded.push(Err(e));
                }
            }
        }
        self.clear();
        decoded
    }

    /// Number of bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.codec.reset();
    }
}
