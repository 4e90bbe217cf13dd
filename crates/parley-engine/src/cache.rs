// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TTL caches in front of the durable store.
//!
//! Generations come from one monotonic clock per cache. Invalidation stamps
//! the key (or prefix) with a new tick, and a fill whose captured generation
//! is older than a matching stamp is refused by [`Cache::set_if_current`].
//! Stamps are pruned: a prefix stamp replaces every key stamp under it, and
//! once too many key stamps pile up they are folded into a single floor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parley_core::types::{Conversation, ConversationFilter, Message};
use tokio::time::Instant;

/// Key stamps kept before they are folded into the floor.
const MAX_KEY_STAMPS: usize = 1024;

/// Key/value cache with explicit per-entry TTLs and generation tracking.
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync,
{
    /// The cached value, if present and unexpired.
    fn get(&self, key: &str) -> Option<V>;

    /// Store unconditionally.
    fn set(&self, key: &str, value: V, ttl: Duration);

    /// Store only if nothing invalidated `key` since `generation` was taken.
    fn set_if_current(&self, key: &str, value: V, ttl: Duration, generation: u64) -> bool;

    /// Current generation for `key`. Capture this before reading the source.
    fn generation(&self, key: &str) -> u64;

    /// Drop the entry and refuse fills that started before now.
    fn invalidate(&self, key: &str);

    /// Invalidate every key starting with `prefix`.
    fn invalidate_prefix(&self, prefix: &str);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Default)]
struct Stamps {
    clock: u64,
    /// Fills older than this are refused for every key.
    floor: u64,
    keys: HashMap<String, u64>,
    prefixes: HashMap<String, u64>,
}

impl Stamps {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_stale(&self, key: &str, generation: u64) -> bool {
        if generation < self.floor {
            return true;
        }
        if self.keys.get(key).is_some_and(|&stamp| stamp > generation) {
            return true;
        }
        key.char_indices()
            .map(|(i, _)| &key[..i])
            .chain(std::iter::once(key))
            .any(|prefix| {
                self.prefixes
                    .get(prefix)
                    .is_some_and(|&stamp| stamp > generation)
            })
    }

    fn stamp_key(&mut self, key: &str) {
        let tick = self.tick();
        if self.keys.len() >= MAX_KEY_STAMPS && !self.keys.contains_key(key) {
            // Every pruned stamp is older than `tick`.
            self.floor = tick;
            self.keys.clear();
            return;
        }
        self.keys.insert(key.to_string(), tick);
    }

    fn stamp_prefix(&mut self, prefix: &str) {
        let tick = self.tick();
        self.keys.retain(|key, _| !key.starts_with(prefix));
        self.prefixes.insert(prefix.to_string(), tick);
    }
}

/// In-process [`Cache`] backed by a concurrent hash map.
pub struct MemoryCache<V> {
    entries: DashMap<String, Entry<V>>,
    stamps: Mutex<Stamps>,
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stamps: Mutex::new(Stamps::default()),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-key and per-prefix invalidation stamps currently held.
    pub fn tracked_stamps(&self) -> usize {
        let stamps = self.lock_stamps();
        stamps.keys.len() + stamps.prefixes.len()
    }

    fn lock_stamps(&self) -> MutexGuard<'_, Stamps> {
        self.stamps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn set_if_current(&self, key: &str, value: V, ttl: Duration, generation: u64) -> bool {
        // Held across the insert so an invalidation cannot slip in between.
        let stamps = self.lock_stamps();
        if stamps.is_stale(key, generation) {
            return false;
        }
        self.set(key, value, ttl);
        drop(stamps);
        true
    }

    fn generation(&self, _key: &str) -> u64 {
        self.lock_stamps().clock
    }

    fn invalidate(&self, key: &str) {
        let mut stamps = self.lock_stamps();
        stamps.stamp_key(key);
        self.entries.remove(key);
        drop(stamps);
    }

    fn invalidate_prefix(&self, prefix: &str) {
        let mut stamps = self.lock_stamps();
        stamps.stamp_prefix(prefix);
        let now = Instant::now();
        self.entries
            .retain(|key, entry| !key.starts_with(prefix) && entry.expires_at > now);
        drop(stamps);
    }
}

/// Tracks keys with a background refresh in flight.
#[derive(Default)]
pub struct InFlight {
    keys: DashSet<String>,
}

impl InFlight {
    /// Claim `key`. `None` means a refresh for it is already running.
    pub fn try_begin(self: &Arc<Self>, key: &str) -> Option<InFlightGuard> {
        if self.keys.insert(key.to_string()) {
            Some(InFlightGuard {
                owner: Arc::clone(self),
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Releases its key when dropped.
pub struct InFlightGuard {
    owner: Arc<InFlight>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.keys.remove(&self.key);
    }
}

/// The two caches the inbox read path uses, with their TTLs.
#[derive(Clone)]
pub struct InboxCaches {
    pub conversations: Arc<dyn Cache<Vec<Conversation>>>,
    pub messages: Arc<dyn Cache<Vec<Message>>>,
    pub conversation_ttl: Duration,
    pub message_ttl: Duration,
}

impl InboxCaches {
    /// In-memory caches with the given TTLs.
    pub fn in_memory(conversation_ttl: Duration, message_ttl: Duration) -> Self {
        Self {
            conversations: Arc::new(MemoryCache::new()),
            messages: Arc::new(MemoryCache::new()),
            conversation_ttl,
            message_ttl,
        }
    }

    pub fn list_key(tenant_id: i64, filter: &ConversationFilter) -> String {
        format!("{tenant_id}:{}", filter.cache_key())
    }

    pub fn history_key(tenant_id: i64, conversation_id: &str) -> String {
        format!("{tenant_id}:{conversation_id}")
    }

    /// Drop every cached conversation listing for the tenant.
    pub fn invalidate_lists(&self, tenant_id: i64) {
        self.conversations.invalidate_prefix(&format!("{tenant_id}:"));
    }

    /// Drop the listings and the conversation's message history.
    pub fn invalidate_conversation(&self, tenant_id: i64, conversation_id: &str) {
        self.messages
            .invalidate(&Self::history_key(tenant_id, conversation_id));
        self.invalidate_lists(tenant_id);
    }
}
