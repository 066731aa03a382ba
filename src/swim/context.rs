//! State shared by every detector component
use std::net::SocketAddr;
use std::sync::Arc;

use super::addressing;
use super::{DetectorStats, Membership, ProcessId};
use crate::error::Result;
use crate::settings::{PortRole, Settings};
use crate::transport::{ephemeral_for, Endpoint, Transport};

pub struct SwimContext {
    pub settings: Settings,
    pub membership: Membership,
    pub transport: Arc<dyn Transport>,
    pub stats: DetectorStats,
}

impl SwimContext {
    pub fn new(settings: Settings, membership: Membership, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            membership,
            transport,
            stats: DetectorStats::default(),
        }
    }

    pub fn self_id(&self) -> &ProcessId {
        self.membership.self_id()
    }

    pub async fn address_of(&self, id: &ProcessId, role: PortRole) -> Result<SocketAddr> {
        addressing::resolve(self.transport.as_ref(), &self.settings.ports, id, role).await
    }

    /// One-shot endpoint able to reach `peer`
    pub async fn bind_ephemeral(&self, peer: &SocketAddr) -> Result<Arc<dyn Endpoint>> {
        self.transport.bind(ephemeral_for(peer)).await
    }

    /// One-shot endpoint on the listen interface
    pub async fn bind_local_ephemeral(&self) -> Result<Arc<dyn Endpoint>> {
        self.transport
            .bind(addressing::ephemeral_on(&self.settings.listen_address))
            .await
    }
}
