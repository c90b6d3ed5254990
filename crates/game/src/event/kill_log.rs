use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillLogEntry {
    pub id: Uuid,
    pub victim: String,
    pub killer: String,
}

impl KillLogEntry {
    pub fn new(victim: String, killer: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            victim,
            killer,
        }
    }
}

pub fn append_entry(log: &[KillLogEntry], entry: KillLogEntry) -> Vec<KillLogEntry> {
    let mut next = Vec::with_capacity(log.len() + 1);
    next.extend_from_slice(log);
    next.push(entry);
    next
}

/// Removes entries by id. Position in the log is irrelevant.
pub fn remove_entries(log: &[KillLogEntry], ids: &[Uuid]) -> Vec<KillLogEntry> {
    log.iter()
        .filter(|entry| !ids.contains(&entry.id))
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
struct PendingExpiry {
    id: Uuid,
    deadline: Instant,
}

/// Deferred removals for kill log entries, one per entry, each with its own
/// deadline.
#[derive(Debug)]
pub struct ExpiryQueue {
    pending: Vec<PendingExpiry>,
    ttl: Duration,
}

impl ExpiryQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Vec::new(),
            ttl,
        }
    }

    pub fn schedule(&mut self, id: Uuid, now: Instant) {
        self.pending.push(PendingExpiry {
            id,
            deadline: now + self.ttl,
        });
    }

    /// Ids whose deadline is at or before `now`, removed from the queue.
    pub fn take_expired(&mut self, now: Instant) -> Vec<Uuid> {
        let mut expired = Vec::new();
        self.pending.retain(|p| {
            if p.deadline <= now {
                expired.push(p.id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
