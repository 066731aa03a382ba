//! Indirect probing through randomly chosen helpers
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::SwimContext;
use super::{DetectorStats, Message, ProcessId};
use crate::error::{Result, SwimError};
use crate::settings::PortRole;
use crate::transport::Received;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndirectOutcome {
    /// Some helper relayed an ACK from the target
    Confirmed,
    /// No relayed ACK before the deadline, or nobody to ask
    Failed,
}

#[derive(Clone)]
pub struct IndirectProber {
    ctx: Arc<SwimContext>,
}

impl IndirectProber {
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        Self { ctx }
    }

    /// Ask up to `k` helpers to probe `target` and wait for the first relay.
    ///
    /// Every PING_REQ leaves from one relay endpoint; helpers answer to the
    /// address the request came from.
    pub async fn probe_via_helpers(&self, target: &ProcessId, k: usize) -> Result<IndirectOutcome> {
        let self_id = self.ctx.self_id().clone();
        let helpers = self.ctx.membership.sample_helpers(k, &[target]);
        if helpers.is_empty() {
            info!("[{}] No helpers available to probe {}", self_id, target);
            return Ok(IndirectOutcome::Failed);
        }

        let relay = self.ctx.bind_local_ephemeral().await?;
        let request = Message::ping_req(self_id.clone(), target.clone()).encode()?;
        let deadline = Instant::now() + self.ctx.settings.indirect_timeout;

        let mut sends = JoinSet::new();
        for helper in helpers {
            let ctx = Arc::clone(&self.ctx);
            let relay = Arc::clone(&relay);
            let request = request.clone();
            sends.spawn(async move {
                let addr = ctx.address_of(&helper, PortRole::PingReq).await?;
                relay.send_to(&request, addr).await?;
                debug!("[{}] PING_REQ sent to {} at {}", ctx.self_id(), helper, addr);
                Ok::<(), SwimError>(())
            });
        }

        let mut sent = 0usize;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok(Ok(())) => sent += 1,
                Ok(Err(e)) => warn!("[{}] PING_REQ not sent: {}", self_id, e),
                Err(e) => warn!("[{}] PING_REQ send task failed: {}", self_id, e),
            }
        }
        DetectorStats::add(&self.ctx.stats.ping_reqs_sent, sent);
        if sent == 0 {
            return Ok(IndirectOutcome::Failed);
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match relay.recv(Some(remaining)).await? {
                Received::TimedOut => break,
                Received::Datagram { data, from } => match Message::decode(&data) {
                    Ok(Message::Ack {
                        source,
                        target: Some(relayed),
                    }) if relayed == *target => {
                        DetectorStats::incr(&self.ctx.stats.relays_received);
                        debug!("[{}] {} vouched for {}", self_id, source, target);
                        return Ok(IndirectOutcome::Confirmed);
                    }
                    Ok(other) => {
                        debug!(
                            "[{}] Ignoring {} from {} while probing {} indirectly",
                            self_id,
                            other.kind(),
                            from,
                            target
                        );
                    }
                    Err(e) => {
                        DetectorStats::incr(&self.ctx.stats.decode_errors);
                        debug!("[{}] Dropping datagram from {}: {}", self_id, from, e);
                    }
                },
            }
        }

        info!(
            "[{}] No helper could reach {} within {:?}",
            self_id, target, self.ctx.settings.indirect_timeout
        );
        Ok(IndirectOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::settings::Settings;
    use crate::swim::Membership;
    use crate::transport::{Endpoint, Transport, UdpTransport};

    // Helper endpoints are bound on their ping-req port; ids are rebased to match
    fn helper_id(endpoint: &Arc<dyn Endpoint>) -> ProcessId {
        let ping_port = endpoint.local_addr().port() - 1;
        ProcessId::from(format!("127.0.0.1:{}", ping_port))
    }

    fn context(peers: Vec<ProcessId>, indirect: Duration) -> Arc<SwimContext> {
        let self_id = ProcessId::from("127.0.0.1:1");
        let mut settings = Settings::new(self_id.clone(), peers.clone());
        settings.listen_address = "127.0.0.1".to_string();
        settings.indirect_timeout = indirect;
        let membership = Membership::new(self_id, peers, StdRng::seed_from_u64(3));
        Arc::new(SwimContext::new(
            settings,
            membership,
            Arc::new(UdpTransport::new()),
        ))
    }

    #[tokio::test]
    async fn test_no_helpers_fails_without_sending() {
        let target = ProcessId::from("127.0.0.1:2");
        let ctx = context(vec![target.clone()], Duration::from_secs(3));

        let started = Instant::now();
        let outcome = IndirectProber::new(Arc::clone(&ctx))
            .probe_via_helpers(&target, 3)
            .await
            .unwrap();

        assert_eq!(outcome, IndirectOutcome::Failed);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.stats.freeze().ping_reqs_sent, 0);
    }

    #[tokio::test]
    async fn test_relayed_ack_confirms() {
        let transport = UdpTransport::new();
        let helper = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let helper_id = helper_id(&helper);
        let target = ProcessId::from("127.0.0.1:2");
        let ctx = context(
            vec![target.clone(), helper_id.clone()],
            Duration::from_secs(2),
        );

        let responder = {
            let helper = Arc::clone(&helper);
            tokio::spawn(async move {
                if let Received::Datagram { data, from } =
                    helper.recv(Some(Duration::from_secs(2))).await.unwrap()
                {
                    let Message::PingReq { target, .. } = Message::decode(&data).unwrap() else {
                        panic!("expected PING_REQ");
                    };
                    let relay = Message::relayed_ack(helper_id, target);
                    helper.send_to(&relay.encode().unwrap(), from).await.unwrap();
                }
            })
        };

        let outcome = IndirectProber::new(Arc::clone(&ctx))
            .probe_via_helpers(&target, 3)
            .await
            .unwrap();
        responder.await.unwrap();

        assert_eq!(outcome, IndirectOutcome::Confirmed);
        let stats = ctx.stats.freeze();
        assert_eq!(stats.ping_reqs_sent, 1);
        assert_eq!(stats.relays_received, 1);
    }

    #[tokio::test]
    async fn test_silent_helpers_fail_at_deadline() {
        let transport = UdpTransport::new();
        let first = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let second = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let target = ProcessId::from("127.0.0.1:2");
        let ctx = context(
            vec![target.clone(), helper_id(&first), helper_id(&second)],
            Duration::from_millis(150),
        );

        let started = Instant::now();
        let outcome = IndirectProber::new(Arc::clone(&ctx))
            .probe_via_helpers(&target, 3)
            .await
            .unwrap();

        assert_eq!(outcome, IndirectOutcome::Failed);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(ctx.stats.freeze().ping_reqs_sent, 2);
    }
}
