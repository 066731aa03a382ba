//! Failure detector assembly and lifecycle
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::context::SwimContext;
use super::disseminator::Disseminator;
use super::dispatcher::Dispatcher;
use super::scheduler::{CycleOutcome, Scheduler};
use super::{DetectorStats, FrozenDetectorStats, Membership, MembershipEntry, Message, ProcessId};
use crate::error::Result;
use crate::settings::{PortRole, Settings};
use crate::transport::{FrozenTransportStats, Transport, UdpTransport};

const LISTENER_ROLES: [PortRole; 3] = [PortRole::Ping, PortRole::PingReq, PortRole::Fail];

/// A SWIM failure detector for one process
#[derive(Clone)]
pub struct Detector {
    ctx: Arc<SwimContext>,
    scheduler: Scheduler,
    disseminator: Disseminator,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("process_id", self.ctx.self_id())
            .field("members", &self.ctx.membership.len())
            .finish()
    }
}

impl Detector {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>) -> Result<Self> {
        settings.validate()?;
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let membership = Membership::new(
            settings.process_id.clone(),
            settings.peers.iter().cloned(),
            rng,
        );
        info!(
            "[{}] Created failure detector with {} bootstrap peers",
            settings.process_id,
            membership.len() - 1
        );

        let ctx = Arc::new(SwimContext::new(settings, membership, transport));
        Ok(Self {
            scheduler: Scheduler::new(Arc::clone(&ctx)),
            disseminator: Disseminator::new(Arc::clone(&ctx)),
            ctx,
        })
    }

    /// Detector on real UDP sockets
    pub fn with_udp(settings: Settings) -> Result<Self> {
        Self::new(settings, Arc::new(UdpTransport::new()))
    }

    pub fn process_id(&self) -> &ProcessId {
        self.ctx.self_id()
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub fn membership(&self) -> &Membership {
        &self.ctx.membership
    }

    pub fn snapshot(&self) -> Vec<MembershipEntry> {
        self.ctx.membership.snapshot()
    }

    pub fn stats(&self) -> FrozenDetectorStats {
        self.ctx.stats.freeze()
    }

    pub fn transport_stats(&self) -> FrozenTransportStats {
        self.ctx.transport.stats()
    }

    /// Log the current member ids and their status
    pub fn log_membership(&self) {
        let view: Vec<String> = self
            .ctx
            .membership
            .snapshot()
            .iter()
            .map(|entry| format!("{}={}", entry.id, entry.status))
            .collect();
        info!(
            "[{}] Membership ({}): {}",
            self.ctx.self_id(),
            view.len(),
            view.join(", ")
        );
    }

    /// Probe one member now, escalating like a regular cycle
    pub async fn probe_member(&self, target: &ProcessId) -> Result<CycleOutcome> {
        self.scheduler.probe_member(target).await
    }

    /// Run one probe cycle now
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.scheduler.run_cycle().await
    }

    /// Bind the well-known listeners and announce this process to its peers.
    ///
    /// No probe cycles run; drive them with [`Detector::run_cycle`]. Failing
    /// to bind any listener is fatal.
    pub async fn start_listening(&self) -> Result<DetectorHandle> {
        let self_id = self.ctx.self_id().clone();
        let ports = self.ctx.settings.local_ports()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        let mut addrs = HashMap::new();

        let mut endpoints = Vec::with_capacity(LISTENER_ROLES.len());
        for role in LISTENER_ROLES {
            let addr = self
                .ctx
                .transport
                .resolve(&self.ctx.settings.listen_address, ports.port(role))
                .await?;
            let endpoint = self.ctx.transport.bind(addr).await?;
            addrs.insert(role, endpoint.local_addr());
            endpoints.push((role, endpoint));
        }

        let dispatcher = Dispatcher::new(Arc::clone(&self.ctx));
        for (role, endpoint) in endpoints {
            tasks.spawn(dispatcher.clone().listen(role, endpoint, shutdown_rx.clone()));
        }

        let peers = self.ctx.membership.peers();
        if !peers.is_empty() {
            let announced = self
                .disseminator
                .flood(&Message::join(self_id.clone()), peers)
                .await?;
            DetectorStats::add(&self.ctx.stats.joins_sent, announced);
            info!("[{}] Announced JOIN to {} peers", self_id, announced);
        }

        Ok(DetectorHandle {
            process_id: self_id,
            shutdown_tx,
            tasks,
            addrs,
            disseminator: self.disseminator.clone(),
            ctx: Arc::clone(&self.ctx),
        })
    }

    /// Listeners plus the periodic probe scheduler
    pub async fn start(&self) -> Result<DetectorHandle> {
        let mut handle = self.start_listening().await?;
        let shutdown_rx = handle.shutdown_tx.subscribe();
        handle.tasks.spawn(self.scheduler.clone().run(shutdown_rx));
        Ok(handle)
    }
}

/// Running detector tasks
pub struct DetectorHandle {
    process_id: ProcessId,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
    addrs: HashMap<PortRole, SocketAddr>,
    disseminator: Disseminator,
    ctx: Arc<SwimContext>,
}

impl DetectorHandle {
    /// Bound address of one listener
    pub fn local_addr(&self, role: PortRole) -> Option<SocketAddr> {
        self.addrs.get(&role).copied()
    }

    /// Tell every member this process is leaving, then shut down.
    ///
    /// Returns how many members were told.
    pub async fn leave(self) -> Result<usize> {
        let peers = self.ctx.membership.peers();
        let farewell = Message::fail(self.process_id.clone(), self.process_id.clone());
        let told = self.disseminator.flood(&farewell, peers).await?;
        DetectorStats::add(&self.ctx.stats.fails_sent, told);
        info!("[{}] Leaving, told {} members", self.process_id, told);
        self.shutdown().await;
        Ok(told)
    }

    /// Stop every task and wait for them to finish
    pub async fn shutdown(mut self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!("[{}] Detector task failed: {}", self.process_id, e);
            }
        }
        info!("[{}] Failure detector stopped", self.process_id);
    }
}
