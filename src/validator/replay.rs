use super::claims::{SystemClockTimeProvider, TimeProvider};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::fmt;

/// A cache of tokens already seen, used to detect replays.
pub trait TokenReplayCache: Send + Sync {
    /// Add a token that expires at the given time. Returns `false` if it could not be added.
    fn try_add(&self, token: &str, expires_at: DateTime<Utc>) -> bool;

    /// Check whether the given token has been seen and hasn't expired yet.
    fn try_find(&self, token: &str) -> bool;
}

/// An in memory replay cache.
///
/// Expired tokens are dropped lazily, when they are looked up or re-added.
pub struct InMemoryTokenReplayCache {
    tokens: DashMap<String, DateTime<Utc>>,
    time_provider: Box<dyn TimeProvider>,
}

impl InMemoryTokenReplayCache {
    /// Construct a new cache that uses the system clock.
    pub fn new() -> Self {
        Self::with_time_provider(Box::new(SystemClockTimeProvider))
    }

    /// Construct a new cache that uses the given time provider.
    pub fn with_time_provider(time_provider: Box<dyn TimeProvider>) -> Self {
        Self { tokens: Default::default(), time_provider }
    }

    /// Drop every expired token.
    pub fn purge(&self) {
        let now = self.time_provider.current_time();
        self.tokens.retain(|_, expires_at| *expires_at > now);
    }

    /// The number of tokens in the cache, including expired ones that haven't been purged.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for InMemoryTokenReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTokenReplayCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTokenReplayCache").field("tokens", &self.tokens.len()).finish()
    }
}

impl TokenReplayCache for InMemoryTokenReplayCache {
    fn try_add(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        let now = self.time_provider.current_time();
        if expires_at <= now {
            return false;
        }
        match self.tokens.entry(token.to_string()) {
            Entry::Occupied(mut entry) if *entry.get() <= now => {
                entry.insert(expires_at);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }

    fn try_find(&self, token: &str) -> bool {
        let now = self.time_provider.current_time();
        // Expired tokens are removed so they don't count as seen.
        self.tokens.remove_if(token, |_, expires_at| *expires_at <= now);
        self.tokens.contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    };

    #[derive(Debug, Default)]
    struct Clock(Arc<AtomicI64>);

    impl TimeProvider for Clock {
        fn current_time(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn add_and_find() {
        let cache = InMemoryTokenReplayCache::with_time_provider(Box::new(Clock::default()));
        assert!(!cache.try_find("a"));
        assert!(cache.try_add("a", at(10)));
        assert!(cache.try_find("a"));
        assert!(!cache.try_add("a", at(10)));
        assert!(!cache.try_find("b"));
    }

    #[test]
    fn expired_entries() {
        let seconds = Arc::new(AtomicI64::new(0));
        let cache = InMemoryTokenReplayCache::with_time_provider(Box::new(Clock(seconds.clone())));
        assert!(cache.try_add("a", at(10)));
        assert!(cache.try_add("b", at(20)));

        seconds.store(10, Ordering::SeqCst);
        assert!(!cache.try_find("a"));
        assert!(cache.try_find("b"));
        assert_eq!(cache.len(), 1);

        // Already expired tokens are rejected while expired entries can be replaced.
        assert!(!cache.try_add("c", at(5)));
        seconds.store(20, Ordering::SeqCst);
        assert!(cache.try_add("b", at(30)));
        assert!(cache.try_find("b"));
    }

    #[test]
    fn purge() {
        let seconds = Arc::new(AtomicI64::new(0));
        let cache = InMemoryTokenReplayCache::with_time_provider(Box::new(Clock(seconds.clone())));
        cache.try_add("a", at(10));
        cache.try_add("b", at(20));
        seconds.store(15, Ordering::SeqCst);
        cache.purge();
        assert_eq!(cache.len(), 1);
    }
}
