use crate::api::error::{ApiError, ApiResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Set of keys with an operation in flight. A second operation on a busy key
/// is rejected until the first one's guard is dropped.
#[derive(Debug)]
pub struct InFlight<K> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash + Clone + Debug> InFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing with [`ApiError::Busy`] if it is already claimed.
    pub fn try_acquire(&self, key: K) -> ApiResult<InFlightGuard<K>> {
        let mut keys = self.keys.lock();
        if !keys.insert(key.clone()) {
            return Err(ApiError::Busy(format!("{:?}", key)));
        }
        Ok(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// Releases its key when dropped, whatever the operation's outcome.
#[derive(Debug)]
pub struct InFlightGuard<K: Eq + Hash> {
    keys: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}

/// Token identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Monotonic request counter of one component. Only responses carrying the
/// latest generation may be applied; older ones are stale.
#[derive(Debug, Default)]
pub struct Generations {
    latest: AtomicU64,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::SeqCst) == generation.0
    }

    /// Make every outstanding generation stale.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}
