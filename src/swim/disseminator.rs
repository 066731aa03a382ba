//! Point-to-point flooding of control messages
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::context::SwimContext;
use super::{DetectorStats, Message, ProcessId};
use crate::error::{Result, SwimError};
use crate::settings::PortRole;

#[derive(Clone)]
pub struct Disseminator {
    ctx: Arc<SwimContext>,
}

impl Disseminator {
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        Self { ctx }
    }

    /// Remove `target` and tell every other member it failed.
    ///
    /// Returns how many FAIL messages went out.
    pub async fn disseminate(&self, target: &ProcessId) -> Result<usize> {
        let self_id = self.ctx.self_id();
        let recipients: Vec<ProcessId> = self
            .ctx
            .membership
            .snapshot()
            .into_iter()
            .map(|entry| entry.id)
            .filter(|id| id != self_id && id != target)
            .collect();
        self.ctx.membership.mark_dead_and_remove(target);
        DetectorStats::incr(&self.ctx.stats.failures_declared);

        let message = Message::fail(self.ctx.self_id().clone(), target.clone());
        let notified = self.flood(&message, recipients).await?;
        DetectorStats::add(&self.ctx.stats.fails_sent, notified);
        info!(
            "[{}] Declared {} failed, notified {} members",
            self.ctx.self_id(),
            target,
            notified
        );
        Ok(notified)
    }

    /// Send `message` to the fail port of every recipient, concurrently.
    ///
    /// Each send uses its own one-shot endpoint. Returns how many sends
    /// succeeded; individual failures are logged and skipped.
    pub async fn flood(&self, message: &Message, recipients: Vec<ProcessId>) -> Result<usize> {
        let data = message.encode()?;
        let mut sends = JoinSet::new();
        for recipient in recipients {
            let ctx = Arc::clone(&self.ctx);
            let data = data.clone();
            sends.spawn(async move {
                let addr = ctx.address_of(&recipient, PortRole::Fail).await?;
                let endpoint = ctx.bind_ephemeral(&addr).await?;
                endpoint.send_to(&data, addr).await?;
                Ok::<ProcessId, SwimError>(recipient)
            });
        }

        let self_id = self.ctx.self_id();
        let mut sent = 0usize;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok(Ok(recipient)) => {
                    sent += 1;
                    debug!("[{}] {} sent to {}", self_id, message.kind(), recipient);
                }
                Ok(Err(e)) => warn!("[{}] {} not sent: {}", self_id, message.kind(), e),
                Err(e) => warn!("[{}] {} send task failed: {}", self_id, message.kind(), e),
            }
        }
        Ok(sent)
    }
}
