//! Execution record cache.
//!
//! Remembers which rules have already produced a link for a given
//! `(user, content)` pair so that saving a task repeatedly with unchanged
//! text does not regenerate links. Entries live in process memory only and
//! are bounded: once more than `capacity` distinct keys exist, the
//! oldest-inserted key is evicted.

use lru::LruCache;
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Default number of distinct `(user, content)` keys kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: String,
    content: String,
}

impl CacheKey {
    fn new(user_id: &str, content: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            content: content.to_string(),
        }
    }
}

/// Thread-safe `(user, content) -> {rule id}` execution map.
///
/// Lookups use `peek` so reads never refresh an entry; the least recently
/// used key is therefore always the oldest inserted one.
///
/// One mutex guards the whole map. A poisoned lock is recovered instead of
/// propagated: the worst a torn update can do is let one duplicate link
/// through.
pub struct ExecutionCache {
    entries: Mutex<LruCache<CacheKey, HashSet<String>>>,
}

impl ExecutionCache {
    /// Create a cache holding at most `capacity` distinct keys (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, HashSet<String>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Number of distinct `(user, content)` keys currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `rule_id` has already fired for this user and content.
    pub fn was_executed(&self, user_id: &str, content: &str, rule_id: &str) -> bool {
        let key = CacheKey::new(user_id, content);
        self.lock()
            .peek(&key)
            .is_some_and(|rules| rules.contains(rule_id))
    }

    /// Record that `rule_id` fired for this user and content. Idempotent.
    pub fn record_executed(&self, user_id: &str, content: &str, rule_id: &str) {
        let key = CacheKey::new(user_id, content);
        let mut entries = self.lock();

        if let Some(rules) = entries.peek_mut(&key) {
            rules.insert(rule_id.to_string());
            return;
        }

        if let Some((evicted, _)) = entries.push(key, HashSet::from([rule_id.to_string()])) {
            tracing::trace!(user_id = %evicted.user_id, "Evicted automation cache entry");
        }
    }

    /// Undo [`record_executed`](Self::record_executed) for each of `rule_ids`.
    /// Keys left without rules are dropped.
    pub fn forget(&self, user_id: &str, content: &str, rule_ids: &[String]) {
        if rule_ids.is_empty() {
            return;
        }
        let key = CacheKey::new(user_id, content);
        let mut entries = self.lock();

        let now_empty = match entries.peek_mut(&key) {
            Some(rules) => {
                for rule_id in rule_ids {
                    rules.remove(rule_id);
                }
                rules.is_empty()
            }
            None => return,
        };
        if now_empty {
            entries.pop(&key);
        }
    }

    /// Drop every entry belonging to `user_id`. Returns how many keys were removed.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut entries = self.lock();
        let keys: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.user_id == user_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            entries.pop(key);
        }
        keys.len()
    }

    /// Drop everything.
    pub fn invalidate_all(&self) {
        self.lock().clear();
    }
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for ExecutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("ExecutionCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
