//! Client side of the DogeChat line protocol
//!
//! A [`ChatSession`] ties a username to one [`Transport`] connection. The
//! owner opens it, feeds it transport events as they arrive and gets chat
//! messages back through a [`SessionObserver`]:
//!
//! ```ignore
//! let mut session = ChatSession::tcp(TransportConfig::default());
//! session.subscribe(&observer);
//! session.open("localhost", 8080)?;
//! while let Some(event) = session.next_event().await {
//!     session.handle_event(event);
//!     if session.state() == ConnectionState::Connected && session.username().is_none() {
//!         session.join("doge")?;
//!     }
//! }
//! ```

mod config;
mod error;
mod observer;
mod session;
mod transport;

pub use config::TransportConfig;
pub use error::{SessionError, TransportError};
pub use observer::{DisconnectReason, SessionObserver};
pub use session::{ChatSession, ConnectionState, SessionStats};
pub use transport::{EventSender, TcpTransport, Transport, TransportEvent};

pub use dogechat_protocol::{Message, Origin};
