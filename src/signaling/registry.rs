use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::signaling::errors::RegistryError;
use crate::signaling::protocol::ConnectionId;

/// Live connections by identity.
///
/// The only state the relay shares between connection threads. Every
/// operation takes the map lock, so register/lookup/unregister are atomic
/// with respect to each other.
pub struct SessionRegistry<H> {
    entries: Mutex<HashMap<ConnectionId, H>>,
}

impl<H: Clone> SessionRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Add a freshly minted identity. Never overwrites a live entry.
    pub fn register(&self, id: ConnectionId, handle: H) -> Result<(), RegistryError> {
        let mut entries = self.entries();
        if entries.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        entries.insert(id, handle);
        Ok(())
    }

    /// Clone of the handle for `id`, or `None` if nobody by that identity is connected.
    pub fn lookup(&self, id: &str) -> Option<H> {
        self.entries().get(id).cloned()
    }

    /// Remove `id`. Returns the handle the first time, `None` on repeats.
    pub fn unregister(&self, id: &str) -> Option<H> {
        self.entries().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn identities(&self) -> Vec<ConnectionId> {
        self.entries().keys().cloned().collect()
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every critical section is a single HashMap call), so keep going.
    fn entries(&self) -> MutexGuard<'_, HashMap<ConnectionId, H>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: Clone> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn register_lookup_unregister_roundtrip() {
        let reg = SessionRegistry::new();
        reg.register("A1".into(), 7u32).unwrap();

        assert_eq!(reg.lookup("A1"), Some(7));
        assert_eq!(reg.unregister("A1"), Some(7));
        assert_eq!(reg.lookup("A1"), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn lookup_of_unknown_identity_is_none_not_error() {
        let reg: SessionRegistry<u32> = SessionRegistry::new();
        assert_eq!(reg.lookup("never-connected"), None);
    }

    #[test]
    fn double_unregister_is_a_noop() {
        let reg = SessionRegistry::new();
        reg.register("A1".into(), 1u32).unwrap();
        reg.register("B1".into(), 2u32).unwrap();

        assert_eq!(reg.unregister("A1"), Some(1));
        assert_eq!(reg.unregister("A1"), None);

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup("B1"), Some(2));
    }

    #[test]
    fn register_never_overwrites() {
        let reg = SessionRegistry::new();
        reg.register("A1".into(), 1u32).unwrap();

        assert_eq!(
            reg.register("A1".into(), 2u32),
            Err(RegistryError::AlreadyRegistered("A1".into()))
        );
        assert_eq!(reg.lookup("A1"), Some(1));
    }

    #[test]
    fn concurrent_connect_disconnect_leaves_consistent_map() {
        let reg = Arc::new(SessionRegistry::new());

        let workers: Vec<_> = (0..8u32)
            .map(|t| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let id = format!("c{t}-{i}");
                        reg.register(id.clone(), i).unwrap();
                        assert_eq!(reg.lookup(&id), Some(i));
                        if i % 2 == 0 {
                            assert_eq!(reg.unregister(&id), Some(i));
                        }
                    }
                })
            })
            .collect();

        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(reg.len(), 8 * 100);
    }
}
