/// Line-based chat front end: stdin lines go out, received messages come in
use anyhow::Result;
use dogechat_client::{
    ChatSession, ConnectionState, DisconnectReason, Message, SessionError, SessionObserver,
    TcpTransport, TransportConfig,
};
use dogechat_protocol::Error;
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Actions taken in response to a line of input
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Action {
    Send(String),
    Quit,
    Ignore,
}

impl From<&str> for Action {
    fn from(line: &str) -> Self {
        let text = line.trim_end();
        if text.is_empty() {
            Action::Ignore
        } else if text.eq_ignore_ascii_case("/quit") {
            Action::Quit
        } else {
            Action::Send(text.to_string())
        }
    }
}

/// Prints session output to the terminal
#[derive(Debug)]
struct Printer;

impl SessionObserver for Printer {
    fn on_message_received(&self, message: Message) {
        if message.is_own() {
            println!("<you> {}", message.body);
        } else {
            println!("<{}> {}", message.sender_name, message.body);
        }
    }

    fn on_connected(&self) {
        println!("*** connected");
    }

    fn on_disconnected(&self, reason: DisconnectReason) {
        println!("*** {reason}");
    }

    fn on_frame_rejected(&self, error: &Error) {
        eprintln!("!!! {error}");
    }
}

pub async fn run(
    host: String,
    port: u16,
    user: String,
    connect_timeout: Duration,
) -> Result<()> {
    let config = TransportConfig {
        connect_timeout,
        ..TransportConfig::default()
    };
    let mut session = ChatSession::new(TcpTransport::new(config));
    let printer = Arc::new(Printer);
    session.subscribe(&printer);
    session.open(&host, port)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            // apply transport events, joining as soon as we are connected
            maybe_event = session.next_event() => {
                match maybe_event {
                    Some(event) => session.handle_event(event),
                    None => break,
                }
                if session.state() == ConnectionState::Connected && session.username().is_none() {
                    session.join(user.as_str())?;
                }
            }

            // turn input lines into actions
            maybe_line = lines.next_line() => {
                let action = match maybe_line? {
                    Some(line) => Action::from(line.as_str()),
                    None => Action::Quit,
                };
                match action {
                    Action::Send(text) => match session.send(text) {
                        Ok(()) => {}
                        Err(SessionError::SessionClosed) => break,
                        Err(e) => tracing::warn!(error = %e, "message not sent"),
                    },
                    Action::Quit => {
                        println!("*** leaving chat");
                        session.close();
                        break;
                    }
                    Action::Ignore => {}
                }
            }
        }
    }

    let stats = session.stats();
    tracing::debug!(
        malformed_frames = stats.malformed_frames,
        rejected_commands = stats.rejected_commands,
        "session finished"
    );
    Ok(())
}
