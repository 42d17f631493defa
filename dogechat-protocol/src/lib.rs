/// Protocol definitions for the DogeChat line protocol
///
/// Every frame is a single line of ASCII text terminated by `\n`. Clients
/// send one of two commands:
///
/// ```ignore
/// iam:<username>
/// msg:<body>
/// ```
///
/// and the server relays chat messages back as:
///
/// ```ignore
/// <sender name>:<body>
/// ```
///
/// Frames are split on the first `:` only, so bodies may contain colons.
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

mod buffer;
mod codec;
mod model;
mod util;

pub use buffer::InboundBuffer;
pub use codec::{CommandCodec, MessageCodec, MAX_LENGTH};
pub use model::{Command, Message, Origin, Relayed};

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("cannot encode {field}: {reason}")]
    Encoding {
        field: &'static str,
        reason: &'static str,
    },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame exceeds maximum length")]
    FrameTooLong,
}

impl From<LinesCodecError> for Error {
    fn from(value: LinesCodecError) -> Self {
        match value {
            LinesCodecError::MaxLineLengthExceeded => Error::FrameTooLong,
            // LinesCodec only produces `InvalidData` when the line is not UTF-8
            LinesCodecError::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Error::MalformedFrame("frame is not ASCII".into())
            }
            LinesCodecError::Io(e) => Error::IoError(e),
        }
    }
}
