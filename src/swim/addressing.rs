//! Process id to socket address mapping
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::ProcessId;
use crate::error::Result;
use crate::settings::{PortRole, Ports};
use crate::transport::Transport;

/// Where `id` listens for `role`, given the group's port layout
pub async fn resolve(
    transport: &dyn Transport,
    ports: &Ports,
    id: &ProcessId,
    role: PortRole,
) -> Result<SocketAddr> {
    let (host, ports) = ports.for_process(id)?;
    transport.resolve(&host, ports.port(role)).await
}

/// Ephemeral bind address on the listen interface, wildcard for hostnames
pub fn ephemeral_on(listen_address: &str) -> SocketAddr {
    let ip = listen_address
        .parse::<IpAddr>()
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    SocketAddr::new(ip, 0)
}
