//! Model definition for types sent/received by DogeChat

/// Who wrote a message, relative to the local session
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Origin {
    /// Written by the user this session joined as
    Ourself,
    /// Written by anyone else
    Other,
}

/// Chat message as delivered to the local user
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Message {
    pub sender_name: String,
    pub body: String,
    pub origin: Origin,
}

impl Message {
    pub fn new(sender_name: impl Into<String>, body: impl Into<String>, origin: Origin) -> Self {
        Self {
            sender_name: sender_name.into(),
            body: body.into(),
            origin,
        }
    }

    pub fn is_own(&self) -> bool {
        self.origin == Origin::Ourself
    }
}

/// Commands sent by a client
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Command {
    Join { username: String },
    Send { body: String },
}

impl Command {
    pub fn join(username: impl Into<String>) -> Self {
        Self::Join {
            username: username.into(),
        }
    }

    pub fn send(body: impl Into<String>) -> Self {
        Self::Send { body: body.into() }
    }
}

/// Message as relayed from the server to every connected client
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Relayed {
    pub sender_name: String,
    pub body: String,
}

impl Relayed {
    pub fn new(sender_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            body: body.into(),
        }
    }

    /// Resolves the origin of this message for a session joined as `username`
    pub fn classify(self, username: Option<&str>) -> Message {
        let Relayed { sender_name, body } = self;
        let origin = match username {
            Some(name) if name == sender_name => Origin::Ourself,
            _ => Origin::Other,
        };
        Message {
            sender_name,
            body,
            origin,
        }
    }
}
