//! Session key caching.
//!
//! # Lifecycle
//!
//! 1. The cache starts empty: the session is locked and encryption is refused.
//! 2. A successful decrypt stores the password-derived base key in the slot.
//! 3. Encryption derives a fresh per-envelope key from the cached base key.
//! 4. [`SessionKeyCache::clear`] locks the session again (logout / teardown).
//!
//! # Security invariants
//!
//! - The base key is **never** written to disk, logged, or included in traces.
//! - At most one base key is cached at a time.

pub mod cache;

pub use cache::{KeySlot, SessionKeyCache};
