//! Inbound event filtering: echo suppression and message deduplication.
//!
//! Webhook deliveries overlap in awkward ways: the same message can arrive
//! in several entries, our own outbound messages come back through the same
//! event stream (sometimes without the echo flag), and read receipts share
//! the stream with real messages. The filter classifies every inbound event
//! exactly once, backed by two bounded caches of message ids.

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{Action, InboundEvent},
};

/// Bounded set of message ids that preserves insertion order.
///
/// Once an insert pushes the size past the capacity, the oldest half of the
/// entries is evicted in a single pass, keeping maintenance amortized O(1)
/// rather than evicting on every insert past the bound.
#[derive(Debug)]
pub struct MessageIdCache {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl MessageIdCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "cache capacity must be at least 2");

        Self {
            capacity,
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Insert an id; returns `false` if it was already present.
    ///
    /// Eviction triggers when the size strictly exceeds the capacity and
    /// removes `capacity / 2` entries in insertion order (not LRU-by-access).
    pub fn insert(&mut self, id: &str) -> bool {
        if !self.members.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());

        if self.order.len() > self.capacity {
            for _ in 0..self.capacity / 2 {
                if let Some(oldest) = self.order.pop_front() {
                    self.members.remove(&oldest);
                }
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Classifies inbound events, suppressing echoes, duplicates, self-messages,
/// read receipts, and contentless events.
///
/// Trivially cloneable; all clones share the same caches, so concurrent
/// webhook deliveries see a consistent view. The caches live for the process
/// lifetime and are never persisted.
#[derive(Clone)]
pub struct EventFilter {
    inner: Arc<FilterInner>,
}

struct FilterInner {
    bot_ids: HashSet<String>,
    seen: Mutex<MessageIdCache>,
    sent: Mutex<MessageIdCache>,
}

impl EventFilter {
    pub fn new(config: &Config) -> Self {
        let mut bot_ids = HashSet::new();
        bot_ids.insert(config.bot_page_id.clone());
        if !config.bot_account_id.is_empty() {
            bot_ids.insert(config.bot_account_id.clone());
        }

        Self::with_capacities(bot_ids, config.seen_cache_capacity, config.sent_cache_capacity)
    }

    pub fn with_capacities(bot_ids: HashSet<String>, seen_capacity: usize, sent_capacity: usize) -> Self {
        Self {
            inner: Arc::new(FilterInner {
                bot_ids,
                seen: Mutex::new(MessageIdCache::new(seen_capacity)),
                sent: Mutex::new(MessageIdCache::new(sent_capacity)),
            }),
        }
    }

    /// Decide what to do with an inbound event.
    ///
    /// First match wins; the order of the checks is part of the contract.
    /// Pure over the caches: no I/O, cannot fail.
    #[instrument(skip_all, fields(sender = %event.sender_id))]
    pub fn decide(&self, event: &InboundEvent) -> Action {
        // Flagged echoes of our own outbound messages.
        if event.is_echo {
            return Action::IgnoreEcho;
        }

        // Events sent by one of our own accounts.
        if self.inner.bot_ids.contains(&event.sender_id) {
            return Action::IgnoreSelf;
        }

        // Redelivered message ids. The id is recorded here even when a later
        // check ignores the event, so a redelivery is caught no matter how
        // the first delivery was classified.
        if !event.message_id.is_empty() {
            let mut seen = self.inner.seen.lock().unwrap();
            if !seen.insert(&event.message_id) {
                debug!("Duplicate message id.");
                return Action::IgnoreDuplicate;
            }
        }

        // Messages we sent that come back without the echo flag.
        if !event.message_id.is_empty() && self.inner.sent.lock().unwrap().contains(&event.message_id) {
            debug!("Message id matches one we sent.");
            return Action::IgnoreSelf;
        }

        if event.is_read_receipt {
            return Action::IgnoreReadReceipt;
        }

        if !event.has_content() {
            return Action::IgnoreEmpty;
        }

        Action::Process
    }

    /// Record the id of a message this bot sent, so the eventual webhook
    /// echo of it is ignored even when the echo flag is missing.
    pub fn register_sent(&self, message_id: &str) {
        if message_id.is_empty() {
            return;
        }

        self.inner.sent.lock().unwrap().insert(message_id);
    }
}

// Tests.
