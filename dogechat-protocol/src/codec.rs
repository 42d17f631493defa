/// Codecs for the DogeChat line protocol
use crate::{
    model::{Command, Message, Relayed},
    util::OptionExt,
    Error,
};
use tokio_util::{
    bytes::{BufMut, BytesMut},
    codec::{Decoder, Encoder, LinesCodec},
};

// 640k ought to be enough for anyone
pub const MAX_LENGTH: usize = 1024 * 640;

const JOIN_VERB: &str = "iam";
const SEND_VERB: &str = "msg";
const SEPARATOR: u8 = b':';

/// Codec for commands sent from client to server
#[derive(Debug)]
pub struct CommandCodec {
    inner: LinesCodec,
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LENGTH),
        }
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some((verb, arg)) = self.inner.decode(src)?.map(split_frame).transpose()? {
            match verb.as_str() {
                JOIN_VERB => {
                    check_name("username", &arg)
                        .map_err(|e| Error::MalformedFrame(e.to_string()))?;
                    Ok(Some(Command::Join { username: arg }))
                }
                SEND_VERB => {
                    // A stray '\r' would make the body unrelayable
                    check_line("body", &arg)
                        .map_err(|e| Error::MalformedFrame(e.to_string()))?;
                    Ok(Some(Command::Send { body: arg }))
                }
                _ => Err(Error::MalformedFrame(format!("unknown verb {verb:?}"))),
            }
        } else {
            Ok(None)
        }
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = Error;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        use Command::*;
        match command {
            Join { username } => {
                check_name("username", &username)?;
                encode_frame(JOIN_VERB, &username, dst);
            }
            Send { body } => {
                check_line("body", &body)?;
                encode_frame(SEND_VERB, &body, dst);
            }
        }
        Ok(())
    }
}

/// Codec for chat messages relayed from server to client
///
/// Decoding classifies each message against the username the local session
/// joined as, so the codec has to be told about it with [`set_username`].
///
/// [`set_username`]: MessageCodec::set_username
#[derive(Debug)]
pub struct MessageCodec {
    inner: LinesCodec,
    username: Option<String>,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LENGTH),
            username: None,
        }
    }
}

impl MessageCodec {
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Forgets any partially scanned line, keeping the username
    pub fn reset(&mut self) {
        self.inner = LinesCodec::new_with_max_length(MAX_LENGTH);
    }

    fn resolve(&self, frame: String) -> Result<Message, Error> {
        let (sender_name, body) = split_frame(frame)?;
        if sender_name.is_empty() {
            return Err(Error::MalformedFrame("empty sender name".into()));
        }
        Ok(Relayed { sender_name, body }.classify(self.username()))
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = self.inner.decode(src)?;
        frame.map(|frame| self.resolve(frame)).transpose()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = self.inner.decode_eof(src)?;
        frame.map(|frame| self.resolve(frame)).transpose()
    }
}

impl Encoder<Relayed> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, msg: Relayed, dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_name("sender name", &msg.sender_name)?;
        check_line("body", &msg.body)?;
        encode_frame(&msg.sender_name, &msg.body, dst);
        Ok(())
    }
}

// Splits a frame on the first separator; everything after it is the payload
fn split_frame(frame: String) -> Result<(String, String), Error> {
    if !frame.is_ascii() {
        return Err(Error::MalformedFrame("frame is not ASCII".into()));
    }
    let (head, tail) = frame
        .split_once(SEPARATOR as char)
        .or_malformed("missing ':' separator")?;
    Ok((head.to_string(), tail.to_string()))
}

fn encode_frame(head: &str, tail: &str, dst: &mut BytesMut) {
    dst.reserve(head.len() + tail.len() + 2);
    dst.put_slice(head.as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(tail.as_bytes());
    dst.put_u8(b'\n');
}

// Anything written must survive the trip as exactly one ASCII line
fn check_line(field: &'static str, value: &str) -> Result<(), Error> {
    if !value.is_ascii() {
        return Err(Error::Encoding {
            field,
            reason: "contains non-ASCII characters",
        });
    }
    if value.contains(['\n', '\r']) {
        return Err(Error::Encoding {
            field,
            reason: "contains a line terminator",
        });
    }
    Ok(())
}

// Names additionally sit in front of the separator on the way back
fn check_name(field: &'static str, value: &str) -> Result<(), Error> {
    check_line(field, value)?;
    if value.is_empty() {
        return Err(Error::Encoding {
            field,
            reason: "is empty",
        });
    }
    if value.contains(SEPARATOR as char) {
        return Err(Error::Encoding {
            field,
            reason: "contains ':'",
        });
    }
    Ok(())
}
