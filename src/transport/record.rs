//! Fixed-width wire record exchanged on every pipe.
//!
//! Each transfer moves exactly one [`RECORD_LEN`]-byte record: an action tag,
//! three NUL-padded text fields and two little-endian integers. Text fields
//! longer than their bound are truncated at the bound and may therefore fill
//! it without a terminating NUL.

use bytes::{Buf, BufMut};

use crate::utils::error::{Error, Result};

/// Width of the action field, in bytes.
pub const ACTION_LEN: usize = 10;
/// Width of the topic name field, in bytes.
pub const TOPIC_LEN: usize = 20;
/// Width of the username field, in bytes.
pub const USERNAME_LEN: usize = 50;
/// Width of the message body field, in bytes.
pub const BODY_LEN: usize = 300;

/// Total size of one wire record.
pub const RECORD_LEN: usize = ACTION_LEN + TOPIC_LEN + USERNAME_LEN + BODY_LEN + 4 + 4;

/// Username stamped on broker-generated records (errors, notifications).
pub const SYSTEM_USER: &str = "SYSTEM";

/// Action tag of a wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Client handshake: username + delivery pipe path in the body.
    Init,
    /// Publish to a topic.
    Msg,
    /// Subscribe to a topic.
    Sub,
    /// Unsubscribe from a topic.
    Unsub,
    /// Client departure, or broker-initiated disconnect when sent downstream.
    Exit,
    /// Broker-generated policy rejection, delivered to the sender only.
    Error,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Init => "INIT",
            Action::Msg => "MSG",
            Action::Sub => "SUB",
            Action::Unsub => "UNSUB",
            Action::Exit => "EXIT",
            Action::Error => "ERROR",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Action::Init),
            "MSG" => Some(Action::Msg),
            "SUB" => Some(Action::Sub),
            "UNSUB" => Some(Action::Unsub),
            "EXIT" => Some(Action::Exit),
            "ERROR" => Some(Action::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of transfer on the control and delivery pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub action: Action,
    pub topic: String,
    pub username: String,
    pub body: String,
    /// Lifetime in seconds; 0 means ephemeral (never persisted).
    pub duration: u32,
    /// Broker tick at persist time; meaningful only for persisted copies.
    pub created_tick: u32,
}

impl Record {
    pub fn new(action: Action, topic: &str, username: &str, body: &str, duration: u32) -> Self {
        Self {
            action,
            topic: topic.to_string(),
            username: username.to_string(),
            body: body.to_string(),
            duration,
            created_tick: 0,
        }
    }

    /// INIT handshake record carrying the delivery pipe path in the body.
    pub fn init(username: &str, pipe_path: &str) -> Self {
        Self::new(Action::Init, "", username, pipe_path, 0)
    }

    pub fn exit(username: &str) -> Self {
        Self::new(Action::Exit, "", username, "", 0)
    }

    pub fn subscribe(username: &str, topic: &str) -> Self {
        Self::new(Action::Sub, topic, username, "", 0)
    }

    pub fn unsubscribe(username: &str, topic: &str) -> Self {
        Self::new(Action::Unsub, topic, username, "", 0)
    }

    pub fn publish(username: &str, topic: &str, body: &str, duration: u32) -> Self {
        Self::new(Action::Msg, topic, username, body, duration)
    }

    /// Policy-rejection reply, stamped with the SYSTEM username.
    pub fn error(reason: &str) -> Self {
        Self::new(Action::Error, "", SYSTEM_USER, reason, 0)
    }

    /// Broker-to-feed notification (shown by clients like a regular message).
    pub fn notification(body: &str) -> Self {
        Self::new(Action::Msg, "", SYSTEM_USER, body, 0)
    }

    /// Encode into the fixed wire layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        {
            let mut cursor = &mut buf[..];
            put_padded(&mut cursor, self.action.as_str(), ACTION_LEN);
            put_padded(&mut cursor, &self.topic, TOPIC_LEN);
            put_padded(&mut cursor, &self.username, USERNAME_LEN);
            put_padded(&mut cursor, &self.body, BODY_LEN);
            cursor.put_u32_le(self.duration);
            cursor.put_u32_le(self.created_tick);
        }
        buf
    }

    /// Decode one wire record. Fails on an unrecognized action tag.
    pub fn decode(buf: &[u8; RECORD_LEN]) -> Result<Self> {
        let mut cursor = &buf[..];
        let action_str = take_padded(&mut cursor, ACTION_LEN);
        let topic = take_padded(&mut cursor, TOPIC_LEN);
        let username = take_padded(&mut cursor, USERNAME_LEN);
        let body = take_padded(&mut cursor, BODY_LEN);
        let duration = cursor.get_u32_le();
        let created_tick = cursor.get_u32_le();

        let action = Action::from_wire(&action_str)
            .ok_or_else(|| Error::MalformedRecord(format!("unknown action tag '{action_str}'")))?;

        Ok(Self {
            action,
            topic,
            username,
            body,
            duration,
            created_tick,
        })
    }
}

/// Write `s` truncated to `width` bytes, NUL-padding the remainder.
fn put_padded(buf: &mut impl BufMut, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}

/// Read a `width`-byte field, stopping at the first NUL if one is present.
fn take_padded(buf: &mut impl Buf, width: usize) -> String {
    let mut field = vec![0u8; width];
    buf.copy_to_slice(&mut field);
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&field[..end]).into_owned()
}
