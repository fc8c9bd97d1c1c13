//! Broker engine
//!
//! This module contains the shared-state engine responsible for:
//! - the feed registry (bounded, keyed by username)
//! - the topic directory and subscription graph
//! - dispatching control-channel records with lock/subscription policy
//! - tick-based TTL eviction of persisted messages
//! - the operations behind the admin console
//!
//! Concurrency and usage notes:
//! - The public API here is synchronous and designed to be held behind a
//!   lock (`Arc<Mutex<Broker>>`) shared by the control loop, the evictor and
//!   the admin console. Every operation holds the lock for its full duration.
//! - Delivery never touches pipe I/O under the lock: each feed owns an
//!   unbounded queue drained by a dedicated writer task, so a stalled client
//!   cannot stall the broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::feed::Feed;
use crate::broker::topic::{PersistedMessage, Topic};
use crate::config::BrokerSettings;
use crate::persistence::file_store::StoredMessage;
use crate::transport::record::{Action, Record};
use crate::utils::error::{Error, Result};

/// One row of the admin `topics` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub name: String,
    pub persisted: usize,
    pub locked: bool,
}

/// The manager's entire shared state: feed registry, topic directory, the
/// logical tick counter and the running flag, guarded by one exclusive lock.
#[derive(Debug)]
pub struct Broker {
    feeds: HashMap<String, Feed>,
    topics: HashMap<String, Topic>,
    ticks: u64,
    running: bool,
    limits: BrokerSettings,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(limits: BrokerSettings) -> Self {
        Self {
            feeds: HashMap::new(),
            topics: HashMap::new(),
            ticks: 0,
            running: true,
            limits,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ---- feed registry ----

    /// Checks registration preconditions without mutating anything, so the
    /// control loop can refuse an INIT before opening the delivery pipe.
    pub fn can_register(&self, username: &str) -> Result<()> {
        if self.feeds.len() >= self.limits.max_feeds {
            return Err(Error::CapacityExceeded("feeds"));
        }
        if self.feeds.contains_key(username) {
            return Err(Error::DuplicateFeed(username.to_string()));
        }
        Ok(())
    }

    pub fn register_feed(&mut self, feed: Feed) -> Result<()> {
        self.can_register(&feed.username)?;
        info!(user = %feed.username, pipe = %feed.pipe_path, "Feed connected");
        self.feeds.insert(feed.username.clone(), feed);
        Ok(())
    }

    pub fn lookup_feed(&self, username: &str) -> Option<&Feed> {
        self.feeds.get(username)
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Removes a feed and every subscription it holds. A topic whose
    /// subscriber count drops to zero here is deleted along with its
    /// persisted messages, so no subscriber reference ever dangles.
    pub fn cleanup_feed(&mut self, username: &str) -> Option<Feed> {
        let feed = self.feeds.remove(username)?;
        self.topics.retain(|name, topic| {
            if topic.unsubscribe(username) && topic.subscribers.is_empty() {
                info!(topic = %name, "Topic removed (no subscribers)");
                return false;
            }
            true
        });
        Some(feed)
    }

    // ---- topic directory & subscription graph ----

    pub fn get_or_create_topic(&mut self, name: &str) -> Result<&mut Topic> {
        if !self.topics.contains_key(name) && self.topics.len() >= self.limits.max_topics {
            return Err(Error::CapacityExceeded("topics"));
        }
        Ok(self
            .topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(name)))
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Subscribes a registered feed to a topic, creating the topic on demand.
    /// A subscribe from an unknown feed is tolerated as a no-op and creates
    /// nothing.
    pub fn subscribe(&mut self, username: &str, topic_name: &str) -> Result<()> {
        if !self.feeds.contains_key(username) {
            debug!(user = %username, topic = %topic_name, "Ignoring subscribe from unknown feed");
            return Ok(());
        }
        let max_subs = self.limits.max_subscribers_per_topic;
        let topic = self.get_or_create_topic(topic_name)?;
        if !topic.is_subscribed(username) && topic.subscribers.len() >= max_subs {
            return Err(Error::CapacityExceeded("subscribers"));
        }
        topic.subscribe(username.to_string());
        info!(user = %username, topic = %topic_name, "Subscribed");
        Ok(())
    }

    /// Removes a subscription. The topic is deleted on the 1 -> 0 subscriber
    /// transition, discarding any persisted messages it still held.
    pub fn unsubscribe(&mut self, username: &str, topic_name: &str) -> Result<()> {
        let topic = self
            .topics
            .get_mut(topic_name)
            .ok_or_else(|| Error::TopicNotFound(topic_name.to_string()))?;
        if !topic.unsubscribe(username) {
            return Err(Error::NotSubscribed {
                user: username.to_string(),
                topic: topic_name.to_string(),
            });
        }
        info!(user = %username, topic = %topic_name, "Unsubscribed");
        if topic.subscribers.is_empty() {
            let dropped = topic.messages.len();
            self.topics.remove(topic_name);
            info!(topic = %topic_name, dropped, "Topic removed (no subscribers)");
        }
        Ok(())
    }

    pub fn set_topic_lock(&mut self, topic_name: &str, locked: bool) -> Result<()> {
        let topic = self
            .topics
            .get_mut(topic_name)
            .ok_or_else(|| Error::TopicNotFound(topic_name.to_string()))?;
        topic.locked = locked;
        info!(topic = %topic_name, locked, "Topic lock changed");
        Ok(())
    }

    // ---- dispatcher ----

    /// Handles one inbound control-channel record. INIT never reaches this
    /// point: opening the delivery pipe is async and is done by the control
    /// loop before registration.
    pub fn dispatch(&mut self, rec: Record) {
        match rec.action {
            Action::Msg => self.publish(&rec),
            Action::Sub => {
                if let Err(e) = self.subscribe(&rec.username, &rec.topic) {
                    warn!(user = %rec.username, topic = %rec.topic, error = %e, "Subscribe rejected");
                }
            }
            Action::Unsub => {
                if let Err(e) = self.unsubscribe(&rec.username, &rec.topic) {
                    warn!(user = %rec.username, topic = %rec.topic, error = %e, "Unsubscribe rejected");
                }
            }
            Action::Exit => {
                info!(user = %rec.username, "Feed disconnected");
                self.cleanup_feed(&rec.username);
            }
            Action::Init | Action::Error => {
                debug!(action = %rec.action, user = %rec.username, "Ignoring record on control pipe");
            }
        }
    }

    /// MSG handling: policy checks, persisted copy, fan-out.
    ///
    /// Delivery is best-effort: a dead subscriber is logged, skipped and
    /// cleaned up after the fan-out so the remaining deliveries go through.
    pub fn publish(&mut self, rec: &Record) {
        let (locked, subscribed, subscribers) = match self.topics.get(&rec.topic) {
            Some(topic) => (
                topic.locked,
                topic.is_subscribed(&rec.username),
                topic.subscribers.iter().cloned().collect::<Vec<_>>(),
            ),
            None => {
                warn!(user = %rec.username, topic = %rec.topic, "Message to unknown topic dropped");
                return;
            }
        };

        if locked {
            warn!(user = %rec.username, topic = %rec.topic, "Message to locked topic rejected");
            self.reject(
                &rec.username,
                &format!("Topic '{}' is locked. Message rejected.", rec.topic),
            );
            return;
        }
        if !subscribed {
            warn!(user = %rec.username, topic = %rec.topic, "Message from non-subscriber rejected");
            self.reject(
                &rec.username,
                &format!("Not subscribed to topic '{}'. Message rejected.", rec.topic),
            );
            return;
        }

        if rec.duration > 0 {
            let now = self.ticks;
            if let Some(topic) = self.topics.get_mut(&rec.topic) {
                let stored = topic.persist(PersistedMessage {
                    sender: rec.username.clone(),
                    body: rec.body.clone(),
                    duration: rec.duration,
                    created_tick: now,
                });
                if !stored {
                    debug!(topic = %rec.topic, "Persisted ring full; message delivered live only");
                }
            }
        }

        let mut dead = Vec::new();
        for sub in &subscribers {
            match self.feeds.get(sub) {
                Some(feed) => {
                    if feed.send(rec.clone()).is_err() {
                        warn!(user = %sub, "Delivery channel closed; dropping feed");
                        dead.push(sub.clone());
                    }
                }
                None => {
                    warn!(user = %sub, topic = %rec.topic, "Subscriber has no registered feed");
                }
            }
        }
        info!(user = %rec.username, topic = %rec.topic, "Message published");

        for user in dead {
            self.cleanup_feed(&user);
        }
    }

    /// One ERROR record back to the sender; nobody else sees anything.
    fn reject(&mut self, username: &str, reason: &str) {
        let failed = match self.feeds.get(username) {
            Some(feed) => feed.send(Record::error(reason)).is_err(),
            None => {
                debug!(user = %username, "Cannot send ERROR to unregistered sender");
                false
            }
        };
        if failed {
            warn!(user = %username, "Delivery channel closed; dropping feed");
            self.cleanup_feed(username);
        }
    }

    // ---- TTL eviction ----

    /// Advances the logical clock and drops every persisted message whose
    /// remaining lifetime has run out, compacting the survivors in order.
    pub fn advance_tick(&mut self) {
        self.ticks += 1;
        let now = self.ticks;
        for topic in self.topics.values_mut() {
            for msg in topic.evict_expired(now) {
                info!(topic = %topic.name, sender = %msg.sender, "Persisted message expired");
            }
        }
    }

    /// Evictor loop: one tick roughly every `interval`, until shutdown is
    /// signalled or the running flag clears.
    pub async fn run_evictor(
        broker: Arc<Mutex<Broker>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {
                    let mut broker = broker.lock().unwrap();
                    if !broker.running {
                        break;
                    }
                    broker.advance_tick();
                }
            }
        }
        debug!("Evictor stopped");
    }

    // ---- persistence ----

    /// Still-alive persisted messages with their remaining lifetime computed
    /// at snapshot time, ordered by topic name for a stable save file.
    pub fn snapshot(&self) -> Vec<StoredMessage> {
        let now = self.ticks;
        let mut names: Vec<&String> = self.topics.keys().collect();
        names.sort();

        let mut out = Vec::new();
        for name in names {
            let topic = &self.topics[name];
            for msg in &topic.messages {
                let remaining = msg.remaining(now);
                if remaining > 0 {
                    out.push(StoredMessage {
                        topic: topic.name.clone(),
                        sender: msg.sender.clone(),
                        remaining: remaining as u32,
                        body: msg.body.clone(),
                    });
                }
            }
        }
        out
    }

    /// Re-seeds topics from a loaded store. Each message's TTL clock restarts:
    /// the saved remaining lifetime becomes the new duration and creation is
    /// stamped at the current tick.
    pub fn restore(&mut self, messages: Vec<StoredMessage>) {
        let now = self.ticks;
        for msg in messages {
            match self.get_or_create_topic(&msg.topic) {
                Ok(topic) => {
                    let stored = topic.persist(PersistedMessage {
                        sender: msg.sender,
                        body: msg.body,
                        duration: msg.remaining,
                        created_tick: now,
                    });
                    if !stored {
                        warn!(topic = %msg.topic, "Persisted ring full while restoring; message dropped");
                    }
                }
                Err(e) => {
                    warn!(topic = %msg.topic, error = %e, "Could not restore message");
                }
            }
        }
    }

    // ---- admin console operations ----

    pub fn list_feeds(&self) -> Vec<String> {
        let mut users: Vec<String> = self.feeds.keys().cloned().collect();
        users.sort();
        users
    }

    /// Admin removal: the target gets one EXIT record, is cleaned up, and
    /// every remaining feed is notified.
    pub fn remove_feed(&mut self, username: &str) -> Result<()> {
        let feed = self
            .feeds
            .get(username)
            .ok_or_else(|| Error::FeedNotFound(username.to_string()))?;
        if feed.send(Record::exit(username)).is_err() {
            warn!(user = %username, "Could not notify feed of removal");
        }
        self.cleanup_feed(username);
        info!(user = %username, "Feed removed by admin");

        let note = Record::notification(&format!("User '{username}' was removed."));
        for feed in self.feeds.values() {
            if feed.send(note.clone()).is_err() {
                warn!(user = %feed.username, "Could not deliver removal notification");
            }
        }
        Ok(())
    }

    pub fn topics_overview(&self) -> Vec<TopicSummary> {
        let mut summaries: Vec<TopicSummary> = self
            .topics
            .values()
            .map(|t| TopicSummary {
                name: t.name.clone(),
                persisted: t.messages.len(),
                locked: t.locked,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn topic_messages(&self, topic_name: &str) -> Result<Vec<PersistedMessage>> {
        let topic = self
            .topics
            .get(topic_name)
            .ok_or_else(|| Error::TopicNotFound(topic_name.to_string()))?;
        Ok(topic.messages.clone())
    }

    /// Full shutdown: clears the running flag, sends EXIT to every feed and
    /// drains the registry. Returns the delivery pipe paths so the caller can
    /// unlink them; topics stay in place for the save-on-shutdown snapshot.
    pub fn close_platform(&mut self) -> Vec<String> {
        self.running = false;
        let mut paths = Vec::new();
        for (username, feed) in self.feeds.drain() {
            if feed.send(Record::exit(&username)).is_err() {
                warn!(user = %username, "Could not notify feed of shutdown");
            }
            paths.push(feed.pipe_path.clone());
        }
        info!("Platform closed");
        paths
    }
}
