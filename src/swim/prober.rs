//! Direct probing: one PING, one bounded wait for the matching ACK
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::context::SwimContext;
use super::{DetectorStats, Message, ProcessId};
use crate::error::Result;
use crate::settings::PortRole;
use crate::transport::Received;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectOutcome {
    Ack,
    Timeout,
}

#[derive(Clone)]
pub struct DirectProber {
    ctx: Arc<SwimContext>,
}

impl DirectProber {
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        Self { ctx }
    }

    /// PING `target` and wait up to `wait` for its direct ACK.
    ///
    /// Resolution and bind failures are local problems and come back as
    /// errors. Losing the PING on the way out counts as a timeout.
    pub async fn probe(&self, target: &ProcessId, wait: Duration) -> Result<DirectOutcome> {
        let self_id = self.ctx.self_id();
        let addr = self.ctx.address_of(target, PortRole::Ping).await?;
        let endpoint = self.ctx.bind_ephemeral(&addr).await?;
        let ping = Message::ping(self_id.clone()).encode()?;

        let deadline = Instant::now() + wait;
        DetectorStats::incr(&self.ctx.stats.probes_sent);
        if let Err(e) = endpoint.send_to(&ping, addr).await {
            warn!("[{}] PING to {} at {} not sent: {}", self_id, target, addr, e);
            DetectorStats::incr(&self.ctx.stats.probe_timeouts);
            return Ok(DirectOutcome::Timeout);
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match endpoint.recv(Some(remaining)).await? {
                Received::TimedOut => break,
                Received::Datagram { data, from } => match Message::decode(&data) {
                    Ok(Message::Ack {
                        source,
                        target: None,
                    }) if source == *target => {
                        DetectorStats::incr(&self.ctx.stats.acks_received);
                        return Ok(DirectOutcome::Ack);
                    }
                    Ok(other) => {
                        debug!(
                            "[{}] Ignoring {} from {} while probing {}",
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

        debug!("[{}] No ACK from {} within {:?}", self_id, target, wait);
        DetectorStats::incr(&self.ctx.stats.probe_timeouts);
        Ok(DirectOutcome::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::settings::Settings;
    use crate::swim::Membership;
    use crate::transport::{Endpoint, Transport, UdpTransport};

    fn context(peers: Vec<ProcessId>) -> Arc<SwimContext> {
        let self_id = ProcessId::from("127.0.0.1:1");
        let mut settings = Settings::new(self_id.clone(), peers.clone());
        settings.listen_address = "127.0.0.1".to_string();
        let membership = Membership::new(self_id, peers, StdRng::seed_from_u64(1));
        Arc::new(SwimContext::new(
            settings,
            membership,
            Arc::new(UdpTransport::new()),
        ))
    }

    // Peer id whose ping port is the endpoint's own port
    fn id_for(endpoint: &Arc<dyn Endpoint>) -> ProcessId {
        ProcessId::from(format!("127.0.0.1:{}", endpoint.local_addr().port()))
    }

    #[tokio::test]
    async fn test_probe_ack() {
        let transport = UdpTransport::new();
        let peer = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let peer_id = id_for(&peer);
        let ctx = context(vec![peer_id.clone()]);

        let responder = {
            let peer = Arc::clone(&peer);
            let peer_id = peer_id.clone();
            tokio::spawn(async move {
                if let Received::Datagram { data, from } =
                    peer.recv(Some(Duration::from_secs(2))).await.unwrap()
                {
                    assert!(matches!(Message::decode(&data).unwrap(), Message::Ping { .. }));
                    // noise first, then the real answer
                    peer.send_to(b"junk", from).await.unwrap();
                    let wrong = Message::relayed_ack(peer_id.clone(), peer_id.clone());
                    peer.send_to(&wrong.encode().unwrap(), from).await.unwrap();
                    let ack = Message::ack(peer_id).encode().unwrap();
                    peer.send_to(&ack, from).await.unwrap();
                }
            })
        };

        let outcome = DirectProber::new(Arc::clone(&ctx))
            .probe(&peer_id, Duration::from_secs(1))
            .await
            .unwrap();
        responder.await.unwrap();

        assert_eq!(outcome, DirectOutcome::Ack);
        let stats = ctx.stats.freeze();
        assert_eq!(stats.acks_received, 1);
        assert_eq!(stats.decode_errors, 1);
    }

    #[tokio::test]
    async fn test_probe_timeout_when_silent() {
        let transport = UdpTransport::new();
        let silent = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let silent_id = id_for(&silent);
        let ctx = context(vec![silent_id.clone()]);

        let started = Instant::now();
        let outcome = DirectProber::new(Arc::clone(&ctx))
            .probe(&silent_id, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(outcome, DirectOutcome::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(ctx.stats.freeze().probe_timeouts, 1);
    }

    #[tokio::test]
    async fn test_ack_from_someone_else_is_not_an_ack() {
        let transport = UdpTransport::new();
        let peer = transport.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let peer_id = id_for(&peer);
        let ctx = context(vec![peer_id.clone()]);

        let responder = {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move {
                if let Received::Datagram { from, .. } =
                    peer.recv(Some(Duration::from_secs(2))).await.unwrap()
                {
                    let ack = Message::ack(ProcessId::from("impostor")).encode().unwrap();
                    peer.send_to(&ack, from).await.unwrap();
                }
            })
        };

        let outcome = DirectProber::new(ctx)
            .probe(&peer_id, Duration::from_millis(200))
            .await
            .unwrap();
        responder.await.unwrap();

        assert_eq!(outcome, DirectOutcome::Timeout);
    }

    #[tokio::test]
    async fn test_unresolvable_target_is_error() {
        let ctx = context(vec![]);
        let result = DirectProber::new(ctx)
            .probe(
                &ProcessId::from("no-such-host.invalid"),
                Duration::from_millis(50),
            )
            .await;
        assert!(result.is_err());
    }
}
