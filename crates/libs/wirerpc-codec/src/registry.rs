//! Pending call registries.
//!
//! Each codec owns one registry. Locks are held for the map operation only and
//! never across stream I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CodecError, Result};
use crate::sync::lock_ignore_poison;

/// Client side: outgoing sequence number to method name. Responses carry the
/// id but not the method, so the method is remembered here.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    pending: Mutex<HashMap<u64, String>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, seq: u64, method: &str) -> Result<()> {
        let mut pending = lock_ignore_poison(&self.pending);
        if pending.contains_key(&seq) {
            return Err(CodecError::DuplicateSequence { seq });
        }
        pending.insert(seq, method.to_string());
        Ok(())
    }

    pub fn take(&self, seq: u64) -> Option<String> {
        lock_ignore_poison(&self.pending).remove(&seq)
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry, lowest sequence first.
    pub fn drain(&self) -> Vec<(u64, String)> {
        let mut drained: Vec<_> = lock_ignore_poison(&self.pending).drain().collect();
        drained.sort_unstable_by_key(|(seq, _)| *seq);
        drained
    }
}

#[derive(Debug, Default)]
struct ServerState {
    last_seq: u64,
    pending: HashMap<u64, u64>,
}

/// Server side: local sequence number to the id the client put on the wire.
///
/// Local numbers start at 1, strictly increase per connection and are never
/// reused, so two calls whose wire ids collide are still answered separately.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    state: Mutex<ServerState>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next local sequence number for `wire_id`.
    pub fn register(&self, wire_id: u64) -> u64 {
        let mut state = lock_ignore_poison(&self.state);
        state.last_seq += 1;
        let seq = state.last_seq;
        state.pending.insert(seq, wire_id);
        seq
    }

    /// Looks up the wire id for `seq` without releasing the call.
    pub fn get(&self, seq: u64) -> Option<u64> {
        lock_ignore_poison(&self.state).pending.get(&seq).copied()
    }

    pub fn take(&self, seq: u64) -> Option<u64> {
        lock_ignore_poison(&self.state).pending.remove(&seq)
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.state).pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> usize {
        let mut state = lock_ignore_poison(&self.state);
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientRegistry, ServerRegistry};
    use crate::error::CodecError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn client_entries_are_taken_once() {
        let registry = ClientRegistry::new();
        registry.insert(1, "Echo.Call").expect("insert");
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.take(1).as_deref(), Some("Echo.Call"));
        assert!(registry.take(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn client_rejects_second_live_entry_for_same_seq() {
        let registry = ClientRegistry::new();
        registry.insert(5, "A.First").expect("insert");
        let err = registry.insert(5, "B.Second").expect_err("duplicate");
        assert!(matches!(err, CodecError::DuplicateSequence { seq: 5 }));
        assert_eq!(registry.take(5).as_deref(), Some("A.First"));
        registry.insert(5, "B.Second").expect("seq is free again");
    }

    #[test]
    fn client_drain_empties_in_sequence_order() {
        let registry = ClientRegistry::new();
        for seq in [3_u64, 1, 2] {
            registry.insert(seq, &format!("M.{seq}")).expect("insert");
        }
        let drained = registry.drain();
        assert_eq!(drained.iter().map(|(seq, _)| *seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(registry.is_empty());
    }

    #[test]
    fn server_sequence_is_monotonic_even_for_repeated_wire_ids() {
        let registry = ServerRegistry::new();
        let first = registry.register(7);
        let second = registry.register(7);
        assert_eq!((first, second), (1, 2));
        assert_eq!(registry.get(second), Some(7));
        assert_eq!(registry.take(second), Some(7));
        assert_eq!(registry.take(first), Some(7));
        assert!(registry.take(first).is_none());
        assert!(registry.get(first).is_none());

        assert_eq!(registry.register(1), 3);
        assert_eq!(registry.clear(), 1);
        assert_eq!(registry.register(2), 4);
        assert_eq!(registry.clear(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn server_registration_is_unique_across_threads() {
        let registry = Arc::new(ServerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..100).map(|n| registry.register(worker * 1000 + n)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> =
            handles.into_iter().flat_map(|handle| handle.join().expect("worker")).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 800);
        assert_eq!(registry.len(), 800);
    }
}
