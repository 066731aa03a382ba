//! Failure detector settings
use std::time::Duration;

use serde::Serialize;

use crate::config_error;
use crate::error::Result;
use crate::swim::ProcessId;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_PING: u16 = 12345;
pub const DEFAULT_PORT_PING: &str = "12345";
pub const STANDARD_PORT_PING_REQ: u16 = 12346;
pub const DEFAULT_PORT_PING_REQ: &str = "12346";
pub const STANDARD_PORT_FAIL: u16 = 12348;
pub const DEFAULT_PORT_FAIL: &str = "12348";

pub const DEFAULT_DIRECT_TIMEOUT_MS: &str = "1000";
pub const DEFAULT_INDIRECT_TIMEOUT_MS: &str = "3000";
pub const DEFAULT_HELPER_TIMEOUT_MS: &str = "1000";
pub const DEFAULT_PROBE_INTERVAL_MS: &str = "1000";
pub const DEFAULT_INDIRECT_FANOUT: &str = "3";
pub const DEFAULT_MAX_HELPER_PROBES: &str = "64";

/// The well-known listening endpoints of one process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// Plain PING in, ACK out
    Ping,
    /// PING_REQ in, relayed ACK out
    PingReq,
    /// FAIL and JOIN control messages
    Fail,
}

impl std::fmt::Display for PortRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRole::Ping => write!(f, "ping"),
            PortRole::PingReq => write!(f, "ping-req"),
            PortRole::Fail => write!(f, "fail"),
        }
    }
}

/// Port layout shared by every process in the group.
///
/// A process id of the form `host:port` names its own ping port; its other
/// ports keep the same offsets from the ping port as this layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Ports {
    pub ping: u16,
    pub ping_req: u16,
    pub fail: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            ping: STANDARD_PORT_PING,
            ping_req: STANDARD_PORT_PING_REQ,
            fail: STANDARD_PORT_FAIL,
        }
    }
}

impl Ports {
    pub fn port(&self, role: PortRole) -> u16 {
        match role {
            PortRole::Ping => self.ping,
            PortRole::PingReq => self.ping_req,
            PortRole::Fail => self.fail,
        }
    }

    /// Shift the whole layout so that the ping port lands on `base`
    pub fn rebased(&self, base: u16) -> Result<Self> {
        let shift = |port: u16| -> Result<u16> {
            let shifted = i32::from(port) - i32::from(self.ping) + i32::from(base);
            u16::try_from(shifted).map_err(|_| {
                config_error!("Port layout does not fit when based at {}", base)
            })
        };
        Ok(Self {
            ping: base,
            ping_req: shift(self.ping_req)?,
            fail: shift(self.fail)?,
        })
    }

    /// Host and ports to reach `id` on
    pub fn for_process(&self, id: &ProcessId) -> Result<(String, Ports)> {
        let (host, base) = id.host_and_port();
        let ports = match base {
            Some(base) => self.rebased(base)?,
            None => *self,
        };
        Ok((host.to_string(), ports))
    }

    fn validate(&self) -> Result<()> {
        if self.ping == self.ping_req || self.ping == self.fail || self.ping_req == self.fail {
            return Err(config_error!(
                "Ping ({}), ping-req ({}) and fail ({}) ports must be distinct",
                self.ping,
                self.ping_req,
                self.fail
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Identity of this process in the group
    pub process_id: ProcessId,

    // Address the well-known listeners bind to
    pub listen_address: String,

    // Bootstrap membership, not including this process
    pub peers: Vec<ProcessId>,

    // Well-known port layout
    pub ports: Ports,

    // How long a direct probe waits for its ACK (default: 1s)
    pub direct_timeout: Duration,

    // How long the coordinator waits for a relayed ACK (default: 3s)
    pub indirect_timeout: Duration,

    // How long a helper waits for the target on the requester's behalf (default: 1s)
    pub helper_timeout: Duration,

    // Time between probe cycles (default: 1s)
    pub probe_interval: Duration,

    // Helpers asked per indirect probe (default: 3)
    pub indirect_fanout: usize,

    // PING_REQs served at once; more are dropped (default: 64)
    pub max_helper_probes: usize,

    // Fixed seed for target and helper selection; entropy when unset
    pub rng_seed: Option<u64>,
}

impl Settings {
    pub fn new(process_id: ProcessId, peers: Vec<ProcessId>) -> Self {
        Self {
            process_id,
            listen_address: "0.0.0.0".to_string(),
            peers,
            ports: Ports::default(),
            direct_timeout: Duration::from_millis(1000),
            indirect_timeout: Duration::from_millis(3000),
            helper_timeout: Duration::from_millis(1000),
            probe_interval: Duration::from_millis(1000),
            indirect_fanout: 3,
            max_helper_probes: 64,
            rng_seed: None,
        }
    }

    /// Ports this process listens on
    pub fn local_ports(&self) -> Result<Ports> {
        self.ports
            .for_process(&self.process_id)
            .map(|(_host, ports)| ports)
    }

    pub fn validate(&self) -> Result<()> {
        if self.process_id.as_str().is_empty() {
            return Err(config_error!("Process id must not be empty"));
        }
        if self.direct_timeout.is_zero() {
            return Err(config_error!("Direct probe timeout must be positive"));
        }
        if self.probe_interval.is_zero() {
            return Err(config_error!("Probe interval must be positive"));
        }
        if self.max_helper_probes == 0 {
            return Err(config_error!("At least one helper probe must be allowed"));
        }
        if self.helper_timeout >= self.indirect_timeout {
            return Err(config_error!(
                "Helper timeout ({:?}) must be shorter than the indirect probe timeout ({:?})",
                self.helper_timeout,
                self.indirect_timeout
            ));
        }
        self.ports.validate()?;
        self.local_ports()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebased_ports_keep_offsets() {
        let ports = Ports::default().rebased(20000).unwrap();
        assert_eq!(ports.ping, 20000);
        assert_eq!(ports.ping_req, 20001);
        assert_eq!(ports.fail, 20003);
    }

    #[test]
    fn test_rebased_ports_out_of_range() {
        assert!(Ports::default().rebased(65534).is_err());
    }

    #[test]
    fn test_for_process_with_and_without_port() {
        let ports = Ports::default();

        let (host, bare) = ports.for_process(&ProcessId::from("10.0.0.7")).unwrap();
        assert_eq!(host, "10.0.0.7");
        assert_eq!(bare, ports);

        let (host, based) = ports
            .for_process(&ProcessId::from("127.0.0.1:30000"))
            .unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(based.ping, 30000);
        assert_eq!(based.fail, 30003);
    }

    #[test]
    fn test_validate_rejects_helper_timeout_past_deadline() {
        let mut settings = Settings::new(ProcessId::from("a"), vec![]);
        assert!(settings.validate().is_ok());

        settings.helper_timeout = Duration::from_secs(5);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_helper_probes() {
        let mut settings = Settings::new(ProcessId::from("a"), vec![]);
        settings.max_helper_probes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlapping_ports() {
        let mut settings = Settings::new(ProcessId::from("a"), vec![]);
        settings.ports.fail = settings.ports.ping;
        assert!(settings.validate().is_err());
    }
}
