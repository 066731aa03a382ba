use std::net::IpAddr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Identifier of one process in the group.
///
/// Either a bare host (`10.0.0.4`, `node-a.local`) reached on the standard
/// ports, or `host:port` where `port` is the process's ping port.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash, Encode, Decode,
)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into host and optional ping port
    pub fn host_and_port(&self) -> (&str, Option<u16>) {
        let id = self.0.as_str();
        // bare IPv6 literals contain colons but no port
        if id.parse::<IpAddr>().is_ok() {
            return (id, None);
        }
        match id.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.trim_start_matches('[').trim_end_matches(']'), Some(port)),
                Err(_) => (id, None),
            },
            None => (id, None),
        }
    }
}

impl From<&str> for ProcessId {
    fn from(id: &str) -> Self {
        ProcessId::new(id.to_string())
    }
}

impl From<String> for ProcessId {
    fn from(id: String) -> Self {
        ProcessId::new(id)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
