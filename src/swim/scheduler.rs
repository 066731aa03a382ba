//! Probe Scheduler
//!
//! One probe cycle per interval: pick a random member, probe it directly,
//! escalate to helpers on timeout, and declare it failed when nobody can
//! reach it.
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use super::context::SwimContext;
use super::disseminator::Disseminator;
use super::indirect::{IndirectOutcome, IndirectProber};
use super::prober::{DirectOutcome, DirectProber};
use super::{DetectorStats, ProcessId, Status};
use crate::error::Result;

/// What one probe cycle ended with
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No member other than self to probe
    Idle,
    /// Direct ACK received
    Alive { target: ProcessId },
    /// A helper relayed an ACK
    ConfirmedIndirectly { target: ProcessId },
    /// Target removed and FAIL sent to `notified` members
    Declared { target: ProcessId, notified: usize },
    /// Suspicion lifted by out-of-band liveness before the verdict
    Refuted { target: ProcessId },
    /// Target left the membership while being probed
    Removed { target: ProcessId },
    /// Local error; nothing was concluded about the target
    Skipped { target: ProcessId },
}

#[derive(Clone)]
pub struct Scheduler {
    ctx: Arc<SwimContext>,
    prober: DirectProber,
    indirect: IndirectProber,
    disseminator: Disseminator,
}

impl Scheduler {
    pub fn new(ctx: Arc<SwimContext>) -> Self {
        Self {
            prober: DirectProber::new(Arc::clone(&ctx)),
            indirect: IndirectProber::new(Arc::clone(&ctx)),
            disseminator: Disseminator::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Full escalation against one member
    #[instrument(skip(self), fields(node = %self.ctx.self_id()), level = "debug")]
    pub async fn probe_member(&self, target: &ProcessId) -> Result<CycleOutcome> {
        let settings = &self.ctx.settings;
        let membership = &self.ctx.membership;
        let target = target.clone();

        match self.prober.probe(&target, settings.direct_timeout).await? {
            DirectOutcome::Ack => {
                if membership.confirm_alive(&target) {
                    return Ok(CycleOutcome::Alive { target });
                }
                return Ok(CycleOutcome::Removed { target });
            }
            DirectOutcome::Timeout => {}
        }

        if !membership.mark_suspected(&target) && !membership.contains(&target) {
            return Ok(CycleOutcome::Removed { target });
        }
        info!(
            "[{}] {} missed its ACK, asking helpers",
            self.ctx.self_id(),
            target
        );

        match self
            .indirect
            .probe_via_helpers(&target, settings.indirect_fanout)
            .await?
        {
            IndirectOutcome::Confirmed => {
                membership.confirm_alive(&target);
                Ok(CycleOutcome::ConfirmedIndirectly { target })
            }
            IndirectOutcome::Failed => match membership.status(&target) {
                Some(Status::Suspected) => {
                    let notified = self.disseminator.disseminate(&target).await?;
                    Ok(CycleOutcome::Declared { target, notified })
                }
                Some(_) => Ok(CycleOutcome::Refuted { target }),
                None => Ok(CycleOutcome::Removed { target }),
            },
        }
    }

    /// One probe cycle against a random member
    pub async fn run_cycle(&self) -> CycleOutcome {
        DetectorStats::incr(&self.ctx.stats.probe_cycles);
        let Some(target) = self.ctx.membership.get_random_target(&[]) else {
            trace!("[{}] Nothing to probe", self.ctx.self_id());
            return CycleOutcome::Idle;
        };

        match self.probe_member(&target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "[{}] Skipping probe of {}: {}",
                    self.ctx.self_id(),
                    target,
                    e
                );
                CycleOutcome::Skipped { target }
            }
        }
    }

    /// Run cycles every probe interval until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let self_id = self.ctx.self_id().clone();
        let mut interval = time::interval(self.ctx.settings.probe_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "[{}] Probe scheduler started with {}ms interval",
            self_id,
            self.ctx.settings.probe_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        outcome = self.run_cycle() => {
                            debug!("[{}] Probe cycle: {:?}", self_id, outcome);
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }
        info!("[{}] Probe scheduler stopped", self_id);
    }
}
