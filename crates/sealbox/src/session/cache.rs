//! [`SessionKeyCache`]: single-slot, single-writer cache for the session base key.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::crypto::PasswordKey;

/// Shared handle to the one base key that unlocks the current session.
///
/// Wraps an `Arc<Mutex<Option<PasswordKey>>>` so that:
/// - Clones handed to different orchestrators all see the same slot.
/// - An orchestrator holds the slot exclusively through [`SessionKeyCache::lock`]
///   for as long as it reads or writes it; an encrypt started while a decrypt is
///   still prompting waits for that decrypt to finish.
///
/// The cached key is zeroed when it is replaced, cleared, or the last handle drops.
#[derive(Clone, Debug, Default)]
pub struct SessionKeyCache {
    inner: Arc<Mutex<Option<PasswordKey>>>,
}

/// Exclusive access to the cache slot, released on drop.
#[derive(Debug)]
pub struct KeySlot<'a> {
    guard: MutexGuard<'a, Option<PasswordKey>>,
}

impl KeySlot<'_> {
    /// Borrow the cached base key, if the session is unlocked.
    pub fn get(&self) -> Option<&PasswordKey> {
        self.guard.as_ref()
    }

    /// Store (or replace) the base key.
    pub fn set(&mut self, key: PasswordKey) {
        *self.guard = Some(key);
    }

    /// Drop the cached key.
    pub fn clear(&mut self) {
        *self.guard = None;
    }
}

impl SessionKeyCache {
    /// Create a new, locked (empty) cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to the slot, waiting for any in-flight holder.
    pub async fn lock(&self) -> KeySlot<'_> {
        KeySlot {
            guard: self.inner.lock().await,
        }
    }

    /// Returns `true` if a base key is currently cached.
    pub async fn is_unlocked(&self) -> bool {
        self.lock().await.get().is_some()
    }

    /// Store (or replace) the base key.
    pub async fn set(&self, key: PasswordKey) {
        self.lock().await.set(key);
    }

    /// Clone the cached base key.
    ///
    /// The clone is a short-lived copy; callers should use and drop it promptly.
    pub async fn get(&self) -> Option<PasswordKey> {
        self.lock().await.get().cloned()
    }

    /// Forget the base key. Subsequent encryption fails until a record is
    /// decrypted again.
    pub async fn clear(&self) {
        self.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto::derive_password_key;
    use crate::secret::Credential;

    fn key(pw: &str) -> PasswordKey {
        derive_password_key(&Credential::new(pw))
    }

    #[tokio::test]
    async fn initially_locked() {
        let cache = SessionKeyCache::new();
        assert!(!cache.is_unlocked().await);
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn set_get_clear() {
        let cache = SessionKeyCache::new();
        cache.set(key("a")).await;
        assert!(cache.is_unlocked().await);
        assert!(cache.get().await.is_some());
        cache.clear().await;
        assert!(!cache.is_unlocked().await);
    }

    #[tokio::test]
    async fn clones_share_the_slot() {
        let cache = SessionKeyCache::new();
        let other = cache.clone();
        other.set(key("a")).await;
        assert!(cache.is_unlocked().await);
    }

    #[tokio::test]
    async fn holder_excludes_other_readers() {
        let cache = SessionKeyCache::new();
        let mut slot = cache.lock().await;

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.is_unlocked().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        slot.set(key("a"));
        drop(slot);
        assert!(reader.await.unwrap(), "reader must see the write");
    }
}
