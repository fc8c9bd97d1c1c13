//! Topics and their bounded persisted-message rings.

use std::collections::HashSet;

pub type SubscriberId = String;

/// Maximum persisted messages retained per topic. Overflow is dropped from
/// storage only; live delivery is unaffected.
pub const PERSISTED_CAPACITY: usize = 5;

/// A message retained in a topic's ring, subject to tick-based TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMessage {
    pub sender: String,
    pub body: String,
    /// Lifetime in seconds granted at persist (or restore) time.
    pub duration: u32,
    /// Broker tick at which the message entered the ring.
    pub created_tick: u64,
}

impl PersistedMessage {
    /// Seconds of life left at `now`; zero or negative means expired.
    pub fn remaining(&self, now: u64) -> i64 {
        self.duration as i64 - now.saturating_sub(self.created_tick) as i64
    }
}

/// A named pub/sub group: subscriber back-references (usernames resolved
/// through the feed registry, never owned here), a lock flag and the
/// persisted ring.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub locked: bool,
    pub subscribers: HashSet<SubscriberId>,
    pub messages: Vec<PersistedMessage>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            locked: false,
            subscribers: HashSet::new(),
            messages: Vec::new(),
        }
    }

    /// Adds a subscriber. Idempotent: re-subscribing has no effect.
    pub fn subscribe(&mut self, id: SubscriberId) {
        self.subscribers.insert(id);
    }

    /// Removes a subscriber, reporting whether it was present.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.subscribers.remove(id)
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.subscribers.contains(id)
    }

    /// Store a persisted copy if the ring has room. Returns false on a full
    /// ring; the caller still delivers the message live.
    pub fn persist(&mut self, msg: PersistedMessage) -> bool {
        if self.messages.len() >= PERSISTED_CAPACITY {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Drop expired messages, keeping survivors in arrival order. Returns the
    /// evicted messages for logging.
    pub fn evict_expired(&mut self, now: u64) -> Vec<PersistedMessage> {
        let mut expired = Vec::new();
        self.messages.retain(|m| {
            if m.remaining(now) > 0 {
                true
            } else {
                expired.push(m.clone());
                false
            }
        });
        expired
    }
}
