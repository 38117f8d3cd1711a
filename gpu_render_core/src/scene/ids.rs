//! Concurrent handle → dense-id tables. Grounded on spec §5's "lock-free
//! concurrent hash maps" note: both threads may read, only the update thread
//! inserts, and ids are small monotonically-increasing integers rather than
//! the 64-bit handle itself, so they pack into `SceneCommand.mesh_id`/
//! `material_id`.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

/// Maps a stable external handle (a scene-graph mesh/material pointer or
/// asset id, opaque to this crate) to a dense `u32` id. Ids start at 1; 0 is
/// reserved so a zeroed `SceneCommand` is recognizably "no mesh/material".
#[derive(Debug, Default)]
pub struct IdTable {
    handles: DashMap<u64, u32>,
    next: AtomicU32,
}

impl IdTable {
    pub fn new() -> Self {
        Self { handles: DashMap::new(), next: AtomicU32::new(1) }
    }

    /// Looks up an existing id without allocating one.
    pub fn get(&self, handle: u64) -> Option<u32> {
        self.handles.get(&handle).map(|id| *id)
    }

    /// Returns the existing id for `handle`, allocating a fresh one if this
    /// is the first time it's seen. Only the update thread calls this.
    pub fn get_or_insert(&self, handle: u64) -> u32 {
        if let Some(id) = self.get(handle) {
            return id;
        }
        *self
            .handles
            .entry(handle)
            .or_insert_with(|| self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_monotonic_nonzero_ids() {
        let table = IdTable::new();
        assert_eq!(table.get_or_insert(100), 1);
        assert_eq!(table.get_or_insert(200), 2);
        assert_eq!(table.get_or_insert(100), 1);
    }

    #[test]
    fn get_does_not_allocate() {
        let table = IdTable::new();
        assert_eq!(table.get(42), None);
        assert_eq!(table.get_or_insert(42), 1);
        assert_eq!(table.get(42), Some(1));
    }
}
