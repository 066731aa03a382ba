//! Reactions to inbound protocol messages
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::SwimContext;
use super::prober::{DirectOutcome, DirectProber};
use super::{DetectorStats, Message, ProcessId};
use crate::error::Result;
use crate::transport::Endpoint;

#[derive(Clone)]
pub struct Handlers {
    ctx: Arc<SwimContext>,
    prober: DirectProber,
}

impl Handlers {
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        let prober = DirectProber::new(Arc::clone(&ctx));
        Self { ctx, prober }
    }

    /// Answer a PING with a direct ACK to wherever it came from.
    ///
    /// A PING from a suspected member lifts the suspicion but never adds or
    /// removes entries.
    pub async fn on_ping(
        &self,
        source: &ProcessId,
        from: SocketAddr,
        reply: &dyn Endpoint,
    ) -> Result<()> {
        self.ctx.membership.refute(source);
        let ack = Message::ack(self.ctx.self_id().clone()).encode()?;
        reply.send_to(&ack, from).await?;
        debug!("[{}] ACK sent to {} at {}", self.ctx.self_id(), source, from);
        Ok(())
    }

    /// Probe `target` for `requester` and relay a positive answer to `from`.
    ///
    /// Returns whether a relay was sent.
    pub async fn on_ping_req(
        &self,
        requester: &ProcessId,
        target: &ProcessId,
        from: SocketAddr,
        reply: &dyn Endpoint,
    ) -> Result<bool> {
        let self_id = self.ctx.self_id();
        self.ctx.membership.refute(requester);

        if target != self_id {
            DetectorStats::incr(&self.ctx.stats.helper_probes);
            let outcome = self
                .prober
                .probe(target, self.ctx.settings.helper_timeout)
                .await?;
            if outcome == DirectOutcome::Timeout {
                debug!(
                    "[{}] {} did not answer on behalf of {}",
                    self_id, target, requester
                );
                return Ok(false);
            }
            self.ctx.membership.confirm_alive(target);
        }

        let relay = Message::relayed_ack(self_id.clone(), target.clone()).encode()?;
        reply.send_to(&relay, from).await?;
        DetectorStats::incr(&self.ctx.stats.relays_sent);
        debug!(
            "[{}] Relayed ACK for {} to {} at {}",
            self_id, target, requester, from
        );
        Ok(true)
    }

    /// Returns true if `source` was new
    pub fn on_join(&self, source: &ProcessId) -> bool {
        DetectorStats::incr(&self.ctx.stats.joins_received);
        if source == self.ctx.self_id() {
            return false;
        }
        self.ctx.membership.upsert_alive(source)
    }

    /// Drop `failed` from the membership. Returns true if it was present.
    pub fn on_fail(&self, source: &ProcessId, failed: &ProcessId) -> bool {
        DetectorStats::incr(&self.ctx.stats.fails_received);
        let self_id = self.ctx.self_id();
        if failed == self_id {
            warn!("[{}] Ignoring FAIL about this process from {}", self_id, source);
            return false;
        }
        match self.ctx.membership.mark_dead_and_remove(failed) {
            Some(_) => {
                if source == failed {
                    info!("[{}] {} left the group", self_id, failed);
                } else {
                    info!("[{}] {} reported {} as failed", self_id, source, failed);
                }
                true
            }
            None => false,
        }
    }
}
