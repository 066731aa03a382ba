//! Inbound Dispatcher
//!
//! One receive loop per well-known listener. Datagrams are decoded and
//! routed by message kind; helper probes run as tracked tasks so the loop
//! keeps receiving while they wait on their target. At most
//! `max_helper_probes` of them run at once across all listeners, and
//! PING_REQs arriving past that are dropped.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::context::SwimContext;
use super::handlers::Handlers;
use super::{DetectorStats, Message};
use crate::settings::PortRole;
use crate::transport::{Endpoint, Received};

// Pause after an unexpected receive error before trying again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<SwimContext>,
    handlers: Handlers,
    helper_slots: Arc<Semaphore>,
}

impl Dispatcher {
    /// Clones share the helper probe limit
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        Self {
            handlers: Handlers::new(Arc::clone(&ctx)),
            helper_slots: Arc::new(Semaphore::new(ctx.settings.max_helper_probes)),
            ctx,
        }
    }

    /// Receive on `endpoint` until shutdown is signalled
    pub async fn listen(
        self,
        role: PortRole,
        endpoint: Arc<dyn Endpoint>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let self_id = self.ctx.self_id().clone();
        let mut tasks: JoinSet<()> = JoinSet::new();
        info!(
            "[{}] Listening for {} messages on {}",
            self_id,
            role,
            endpoint.local_addr()
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = endpoint.recv(None) => match received {
                    Ok(Received::Datagram { data, from }) => {
                        self.dispatch(role, &data, from, &endpoint, &mut tasks).await;
                    }
                    Ok(Received::TimedOut) => {}
                    Err(e) => {
                        warn!("[{}] {} listener receive error: {}", self_id, role, e);
                        tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("[{}] {} handler task failed: {}", self_id, role, e);
                    }
                }
            }
        }

        tasks.shutdown().await;
        info!("[{}] {} listener stopped", self_id, role);
    }

    async fn dispatch(
        &self,
        role: PortRole,
        data: &[u8],
        from: SocketAddr,
        endpoint: &Arc<dyn Endpoint>,
        tasks: &mut JoinSet<()>,
    ) {
        let self_id = self.ctx.self_id();
        DetectorStats::incr(&self.ctx.stats.messages_received);
        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                DetectorStats::incr(&self.ctx.stats.decode_errors);
                debug!("[{}] Dropping datagram from {}: {}", self_id, from, e);
                return;
            }
        };
        debug!(
            "[{}] {} from {} on {} port",
            self_id,
            message.kind(),
            message.source(),
            role
        );

        match message {
            Message::Ping { source } => {
                if let Err(e) = self.handlers.on_ping(&source, from, endpoint.as_ref()).await {
                    warn!("[{}] ACK to {} not sent: {}", self_id, source, e);
                }
            }
            Message::PingReq { source, target } => {
                let Ok(permit) = Arc::clone(&self.helper_slots).try_acquire_owned() else {
                    DetectorStats::incr(&self.ctx.stats.ping_reqs_dropped);
                    warn!(
                        "[{}] Dropping PING_REQ from {} about {}: {} helper probes in flight",
                        self_id, source, target, self.ctx.settings.max_helper_probes
                    );
                    return;
                };
                let handlers = self.handlers.clone();
                let endpoint = Arc::clone(endpoint);
                let self_id = self_id.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    if let Err(e) = handlers
                        .on_ping_req(&source, &target, from, endpoint.as_ref())
                        .await
                    {
                        warn!(
                            "[{}] Probe of {} for {} failed: {}",
                            self_id, target, source, e
                        );
                    }
                });
            }
            Message::Join { source } => {
                self.handlers.on_join(&source);
            }
            Message::Fail { source, failed } => {
                self.handlers.on_fail(&source, &failed);
            }
            Message::Ack { source, .. } => {
                debug!("[{}] Stray ACK from {} at {}", self_id, source, from);
            }
        }
    }
}
