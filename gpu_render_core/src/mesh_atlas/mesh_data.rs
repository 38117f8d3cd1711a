//! `MeshDataBuffer`: the per-mesh-id offset table consumed by `BuildBatches`
//! to fill in `IndirectDraw.{index_count,first_index,base_vertex}`.

use crate::layout::MeshDataEntry;

/// Sparse, mesh-id-indexed table of atlas offsets. Indexed directly by
/// `mesh_id` (ids are small, monotonically assigned, and dense in practice),
/// mirroring the invariant "for every mesh_id present in any live
/// SceneCommand, MeshDataBuffer[mesh_id].index_count > 0".
#[derive(Debug, Default)]
pub struct MeshDataTable {
    entries: Vec<MeshDataEntry>,
}

impl MeshDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mesh_id: u32) -> MeshDataEntry {
        self.entries.get(mesh_id as usize).copied().unwrap_or_default()
    }

    pub fn set(&mut self, mesh_id: u32, entry: MeshDataEntry) {
        let idx = mesh_id as usize;
        if idx >= self.entries.len() {
            self.entries.resize(idx + 1, MeshDataEntry::default());
        }
        self.entries[idx] = entry;
    }

    /// Zeroes the slot, per "mesh-data slot zeroed" on atlas reclamation.
    pub fn clear(&mut self, mesh_id: u32) {
        if let Some(slot) = self.entries.get_mut(mesh_id as usize) {
            *slot = MeshDataEntry::default();
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }
}
