//! Membership store
//!
//! The only state shared between the scheduler, the listeners and the
//! per-probe tasks. Every operation takes the lock, touches memory and
//! returns; nothing here awaits or performs I/O.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use serde::Serialize;
use tracing::{debug, info};

use super::ProcessId;

/// Liveness of a member as seen from this process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Status {
    Alive,
    Suspected,
    Dead,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Alive => write!(f, "alive"),
            Status::Suspected => write!(f, "suspected"),
            Status::Dead => write!(f, "dead"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MembershipEntry {
    pub id: ProcessId,
    pub status: Status,
    pub last_confirmed: DateTime<Utc>,
}

impl MembershipEntry {
    fn alive(id: ProcessId) -> Self {
        Self {
            id,
            status: Status::Alive,
            last_confirmed: Utc::now(),
        }
    }

    fn confirm(&mut self) {
        self.status = Status::Alive;
        self.last_confirmed = Utc::now();
    }
}

struct Inner {
    // IndexMap for stable iteration and cheap random picks
    members: IndexMap<ProcessId, MembershipEntry>,
    rng: StdRng,
}

/// Known processes and their liveness, self included
pub struct Membership {
    self_id: ProcessId,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("self_id", &self.self_id)
            .field("members", &self.len())
            .finish()
    }
}

impl Membership {
    /// Load the bootstrap list. Duplicates and self are folded into one entry each.
    pub fn new<I>(self_id: ProcessId, peers: I, rng: StdRng) -> Self
    where
        I: IntoIterator<Item = ProcessId>,
    {
        let mut members = IndexMap::new();
        members.insert(self_id.clone(), MembershipEntry::alive(self_id.clone()));
        for peer in peers {
            members
                .entry(peer.clone())
                .or_insert_with(|| MembershipEntry::alive(peer));
        }

        Self {
            self_id,
            inner: Mutex::new(Inner { members, rng }),
        }
    }

    pub fn self_id(&self) -> &ProcessId {
        &self.self_id
    }

    /// Insert `id` as alive or refresh it. Returns true for a new member.
    pub fn upsert_alive(&self, id: &ProcessId) -> bool {
        let mut inner = self.inner.lock();
        match inner.members.get_mut(id) {
            Some(entry) => {
                if entry.status == Status::Suspected {
                    info!("[{}] {} refuted suspicion", self.self_id, id);
                }
                entry.confirm();
                false
            }
            None => {
                inner
                    .members
                    .insert(id.clone(), MembershipEntry::alive(id.clone()));
                info!(
                    "[{}] {} joined, {} members",
                    self.self_id,
                    id,
                    inner.members.len()
                );
                true
            }
        }
    }

    /// Positive liveness signal for a known member; never re-creates a removed one
    pub fn confirm_alive(&self, id: &ProcessId) -> bool {
        let mut inner = self.inner.lock();
        match inner.members.get_mut(id) {
            Some(entry) => {
                if entry.status == Status::Suspected {
                    info!("[{}] {} is alive again", self.self_id, id);
                }
                entry.confirm();
                true
            }
            None => false,
        }
    }

    /// Restore a suspected member to alive. Returns true if a suspicion was lifted.
    pub fn refute(&self, id: &ProcessId) -> bool {
        let mut inner = self.inner.lock();
        match inner.members.get_mut(id) {
            Some(entry) if entry.status == Status::Suspected => {
                entry.confirm();
                info!("[{}] {} refuted suspicion", self.self_id, id);
                true
            }
            _ => false,
        }
    }

    /// Returns true if `id` moved from alive to suspected
    pub fn mark_suspected(&self, id: &ProcessId) -> bool {
        if *id == self.self_id {
            return false;
        }
        let mut inner = self.inner.lock();
        match inner.members.get_mut(id) {
            Some(entry) if entry.status == Status::Alive => {
                entry.status = Status::Suspected;
                debug!("[{}] suspecting {}", self.self_id, id);
                true
            }
            _ => false,
        }
    }

    /// Remove `id`, returning its final entry. Absent ids and self are no-ops.
    pub fn mark_dead_and_remove(&self, id: &ProcessId) -> Option<MembershipEntry> {
        if *id == self.self_id {
            return None;
        }
        let mut inner = self.inner.lock();
        let mut entry = inner.members.shift_remove(id)?;
        entry.status = Status::Dead;
        info!(
            "[{}] removed {}, {} members left",
            self.self_id,
            id,
            inner.members.len()
        );
        Some(entry)
    }

    /// Random member other than self and `exclude`
    pub fn get_random_target(&self, exclude: &[&ProcessId]) -> Option<ProcessId> {
        let mut guard = self.inner.lock();
        let Inner { members, rng } = &mut *guard;
        members
            .keys()
            .filter(|id| **id != self.self_id && !exclude.contains(id))
            .choose(rng)
            .cloned()
    }

    /// Up to `k` distinct members other than self and `exclude`, in random order
    pub fn sample_helpers(&self, k: usize, exclude: &[&ProcessId]) -> Vec<ProcessId> {
        let mut guard = self.inner.lock();
        let Inner { members, rng } = &mut *guard;
        members
            .keys()
            .filter(|id| **id != self.self_id && !exclude.contains(id))
            .cloned()
            .choose_multiple(rng, k)
    }

    pub fn status(&self, id: &ProcessId) -> Option<Status> {
        self.inner.lock().members.get(id).map(|entry| entry.status)
    }

    pub fn get(&self, id: &ProcessId) -> Option<MembershipEntry> {
        self.inner.lock().members.get(id).cloned()
    }

    pub fn contains(&self, id: &ProcessId) -> bool {
        self.inner.lock().members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Never true: self is always a member
    pub fn is_empty(&self) -> bool {
        self.inner.lock().members.is_empty()
    }

    /// Copy of every entry, self first, then in join order
    pub fn snapshot(&self) -> Vec<MembershipEntry> {
        self.inner.lock().members.values().cloned().collect()
    }

    /// Every member id except self
    pub fn peers(&self) -> Vec<ProcessId> {
        self.inner
            .lock()
            .members
            .keys()
            .filter(|id| **id != self.self_id)
            .cloned()
            .collect()
    }
}
