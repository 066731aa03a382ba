//! SWIM Message Protocol
//!
//! The five datagram kinds exchanged between detectors. On the wire each
//! datagram carries exactly one message encoded with bincode: the kind as a
//! small integer tag followed by length-prefixed identifier strings.
//!
use bincode::{Decode, Encode};

use super::ProcessId;
use crate::error::{DecodeError, Result};

// Upper bound on an encoded message; identifiers are short
const MAX_MESSAGE_SIZE: usize = 4096;

fn wire_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_limit::<MAX_MESSAGE_SIZE>()
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq, Decode, Encode)]
pub enum Message {
    /// Direct liveness query
    Ping { source: ProcessId },

    /// Liveness answer. `target` is empty for a direct ACK and names the
    /// probed process when a helper relays the answer.
    Ack {
        source: ProcessId,
        target: Option<ProcessId>,
    },

    /// Ask the recipient to probe `target` on the sender's behalf
    PingReq { source: ProcessId, target: ProcessId },

    /// Announce `source` as a live member
    Join { source: ProcessId },

    /// `failed` was confirmed dead by `source`
    Fail { source: ProcessId, failed: ProcessId },
}

/// Message kind without its fields, for logging and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Ping,
    Ack,
    PingReq,
    Join,
    Fail,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Ping => write!(f, "PING"),
            MessageKind::Ack => write!(f, "ACK"),
            MessageKind::PingReq => write!(f, "PING_REQ"),
            MessageKind::Join => write!(f, "JOIN"),
            MessageKind::Fail => write!(f, "FAIL"),
        }
    }
}

impl Message {
    pub fn ping(source: ProcessId) -> Self {
        Self::Ping { source }
    }

    pub fn ack(source: ProcessId) -> Self {
        Self::Ack {
            source,
            target: None,
        }
    }

    pub fn relayed_ack(source: ProcessId, target: ProcessId) -> Self {
        Self::Ack {
            source,
            target: Some(target),
        }
    }

    pub fn ping_req(source: ProcessId, target: ProcessId) -> Self {
        Self::PingReq { source, target }
    }

    pub fn join(source: ProcessId) -> Self {
        Self::Join { source }
    }

    pub fn fail(source: ProcessId, failed: ProcessId) -> Self {
        Self::Fail { source, failed }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Ping { .. } => MessageKind::Ping,
            Self::Ack { .. } => MessageKind::Ack,
            Self::PingReq { .. } => MessageKind::PingReq,
            Self::Join { .. } => MessageKind::Join,
            Self::Fail { .. } => MessageKind::Fail,
        }
    }

    pub fn source(&self) -> &ProcessId {
        match self {
            Self::Ping { source }
            | Self::Ack { source, .. }
            | Self::PingReq { source, .. }
            | Self::Join { source }
            | Self::Fail { source, .. } => source,
        }
    }

    /// Serialize for the wire
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, wire_config())?)
    }

    /// Deserialize one datagram
    pub fn decode(data: &[u8]) -> std::result::Result<Self, DecodeError> {
        let (message, consumed): (Message, usize) =
            bincode::decode_from_slice(data, wire_config())?;
        if consumed != data.len() {
            return Err(DecodeError::TrailingBytes {
                consumed,
                len: data.len(),
            });
        }
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> std::result::Result<(), DecodeError> {
        let named = match self {
            Self::Ack {
                target: Some(target),
                ..
            }
            | Self::PingReq { target, .. } => Some(target),
            Self::Fail { failed, .. } => Some(failed),
            _ => None,
        };
        if self.source().is_empty() || named.is_some_and(ProcessId::is_empty) {
            return Err(DecodeError::EmptyIdentifier);
        }
        Ok(())
    }
}
