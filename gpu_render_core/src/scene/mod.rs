//! Double-buffered single source of truth for which renderables are in the
//! scene. Grounded on the teacher's double-buffered emulator state pattern
//! (an `updating` side mutated by one thread and a `loaded` side read by
//! another, exchanged at a frame boundary) generalized to scene commands,
//! and on `graphics/buffer/retained_mesh.rs`'s handle → dense-id registry
//! for `ids.rs`.

mod commands;
mod ids;

#[cfg(test)]
mod tests;

use hashbrown::HashMap;
use parking_lot::Mutex;

pub use commands::{build_scene_command, CommandFlags, MaterialRef, MeshRef, RenderableMeshCommand};
pub use ids::IdTable;

use crate::error::SceneStoreError;
use crate::layout::SceneCommand;
use crate::mesh_atlas::{GpuCapacity, MeshAtlas, MeshGeometry};

/// Tracks which live scene-command slots belong to one externally-identified
/// renderable, so `remove`/`update` can find them again.
type RenderableId = u64;

struct SceneStoreInner {
    updating: Vec<SceneCommand>,
    capacity: GpuCapacity,
    atlas: MeshAtlas,
    renderable_slots: HashMap<RenderableId, Vec<u32>>,
    mesh_refcount: HashMap<u32, u32>,
    mesh_local_bounds: HashMap<u32, [f32; 4]>,
    unsupported_meshes: HashMap<u64, crate::error::MeshAtlasError>,
}

struct LoadedScene {
    commands: Vec<SceneCommand>,
    total_command_count: u32,
}

/// GPU-resident command store. `add`/`remove`/`update` mutate the `updating`
/// side under a single mutex; `swap` publishes it to `loaded`, which the
/// render thread reads outside that critical section.
pub struct SceneStore {
    inner: Mutex<SceneStoreInner>,
    loaded: Mutex<LoadedScene>,
    mesh_ids: IdTable,
    material_ids: IdTable,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SceneStoreInner {
                updating: Vec::new(),
                capacity: GpuCapacity::new(crate::config::MIN_COMMAND_COUNT),
                atlas: MeshAtlas::new(),
                renderable_slots: HashMap::new(),
                mesh_refcount: HashMap::new(),
                mesh_local_bounds: HashMap::new(),
                unsupported_meshes: HashMap::new(),
            }),
            loaded: Mutex::new(LoadedScene { commands: Vec::new(), total_command_count: 0 }),
            mesh_ids: IdTable::new(),
            material_ids: IdTable::new(),
        }
    }

    /// Registers a mesh's geometry with the atlas, idempotently. Caches
    /// validation failures so subsequent `add` calls referencing this mesh
    /// are refused without re-validating.
    pub fn register_mesh(
        &self,
        mesh: MeshRef,
        geometry: &MeshGeometry<'_>,
        local_bounding_sphere: [f32; 4],
    ) -> Result<u32, SceneStoreError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.unsupported_meshes.get(&mesh.0) {
            return Err(SceneStoreError::MeshUnsupported(*err));
        }
        if let Some(id) = self.mesh_ids.get(mesh.0) {
            if inner.atlas.is_resident(id) {
                return Ok(id);
            }
        }
        let mesh_id = self.mesh_ids.get_or_insert(mesh.0);
        match inner.atlas.append(mesh_id, geometry) {
            Ok(_) => {
                inner.mesh_local_bounds.insert(mesh_id, local_bounding_sphere);
                Ok(mesh_id)
            }
            Err(err) => {
                inner.unsupported_meshes.insert(mesh.0, err);
                Err(SceneStoreError::MeshUnsupported(err))
            }
        }
    }

    /// Adds one renderable's submeshes to the `updating` buffer, returning
    /// the slot index assigned to each. A submesh whose mesh is cached as
    /// unsupported is silently skipped, per the failure-semantics note in
    /// spec §4.3.
    pub fn add(
        &self,
        renderable: RenderableId,
        submeshes: &[RenderableMeshCommand],
    ) -> Result<Vec<u32>, SceneStoreError> {
        let mut inner = self.inner.lock();
        let mut produced = Vec::with_capacity(submeshes.len());

        for (submesh_id, cmd) in submeshes.iter().enumerate() {
            if inner.unsupported_meshes.contains_key(&cmd.mesh.0) {
                continue;
            }
            let Some(mesh_id) = self.mesh_ids.get(cmd.mesh.0) else {
                tracing::warn!("scene add: mesh {:?} was never registered", cmd.mesh);
                return Err(SceneStoreError::AtlasRegistrationFailed);
            };
            let Some(material_ref) = cmd.material_override else {
                return Err(SceneStoreError::MaterialMissing);
            };
            if inner.updating.len() >= u32::MAX as usize {
                return Err(SceneStoreError::CapacityOverflow);
            }

            let material_id = self.material_ids.get_or_insert(material_ref.0);
            let local_bounds = inner.mesh_local_bounds.get(&mesh_id).copied().unwrap_or_default();
            let mut scene_cmd = build_scene_command(
                cmd,
                mesh_id,
                material_id,
                submesh_id as u32,
                0,
                glam::Mat4::IDENTITY,
                local_bounds,
            );

            let index = inner.updating.len() as u32;
            scene_cmd.reserved1 = index;
            inner.capacity.ensure(inner.updating.len() + 1);
            inner.updating.push(scene_cmd);
            *inner.mesh_refcount.entry(mesh_id).or_insert(0) += 1;
            produced.push(index);
        }

        inner.renderable_slots.insert(renderable, produced.clone());
        Ok(produced)
    }

    /// Updates one renderable's submeshes in place, preserving slot indices
    /// and carrying each slot's current `world_matrix` forward as
    /// `prev_world_matrix` so motion vectors stay correct across the update.
    /// Recomputes the bounding sphere, layer mask, instance count,
    /// render-pass and flags from `submeshes`, and adjusts mesh refcounts
    /// when a slot's mesh reference changes. Falls back to `remove` + `add`
    /// when `submeshes.len()` no longer matches the renderable's existing
    /// slot count, since in-place update assumes a stable submesh count; an
    /// unregistered renderable is treated as a fresh `add`.
    pub fn update(
        &self,
        renderable: RenderableId,
        submeshes: &[RenderableMeshCommand],
    ) -> Result<Vec<u32>, SceneStoreError> {
        let existing_slots = { self.inner.lock().renderable_slots.get(&renderable).cloned() };

        let Some(slots) = existing_slots else {
            return self.add(renderable, submeshes);
        };

        if slots.len() != submeshes.len() {
            self.remove(renderable);
            return self.add(renderable, submeshes);
        }

        let mut inner = self.inner.lock();
        let mut produced = Vec::with_capacity(submeshes.len());

        for (local_idx, (&slot, cmd)) in slots.iter().zip(submeshes.iter()).enumerate() {
            let idx = slot as usize;
            if idx >= inner.updating.len() {
                return Err(SceneStoreError::AtlasRegistrationFailed);
            }
            if inner.unsupported_meshes.contains_key(&cmd.mesh.0) {
                continue;
            }
            let Some(mesh_id) = self.mesh_ids.get(cmd.mesh.0) else {
                tracing::warn!("scene update: mesh {:?} was never registered", cmd.mesh);
                return Err(SceneStoreError::AtlasRegistrationFailed);
            };
            let Some(material_ref) = cmd.material_override else {
                return Err(SceneStoreError::MaterialMissing);
            };

            let prev_world = glam::Mat4::from_cols_array(&inner.updating[idx].world_matrix);
            let old_mesh_id = inner.updating[idx].mesh_id;

            let material_id = self.material_ids.get_or_insert(material_ref.0);
            let local_bounds = inner.mesh_local_bounds.get(&mesh_id).copied().unwrap_or_default();
            let mut scene_cmd = build_scene_command(
                cmd,
                mesh_id,
                material_id,
                local_idx as u32,
                0,
                prev_world,
                local_bounds,
            );
            scene_cmd.reserved1 = idx as u32;
            inner.updating[idx] = scene_cmd;

            if mesh_id != old_mesh_id {
                if let Some(count) = inner.mesh_refcount.get_mut(&old_mesh_id) {
                    *count -= 1;
                    if *count == 0 {
                        inner.mesh_refcount.remove(&old_mesh_id);
                        inner.atlas.remove(old_mesh_id);
                    }
                }
                *inner.mesh_refcount.entry(mesh_id).or_insert(0) += 1;
            }

            produced.push(idx as u32);
        }

        Ok(produced)
    }

    /// Swap-removes every slot owned by `renderable` against the tail,
    /// rewriting the moved entry's `reserved1` and the owning renderable's
    /// slot list, then decrements mesh refcounts (reclaiming atlas residency
    /// at zero).
    pub fn remove(&self, renderable: RenderableId) {
        let mut inner = self.inner.lock();
        let Some(mut slots) = inner.renderable_slots.remove(&renderable) else { return };
        slots.sort_unstable_by(|a, b| b.cmp(a)); // remove highest-index first

        for slot in slots {
            let idx = slot as usize;
            if idx >= inner.updating.len() {
                continue;
            }
            let removed = inner.updating.swap_remove(idx);
            if let Some(count) = inner.mesh_refcount.get_mut(&removed.mesh_id) {
                *count -= 1;
                if *count == 0 {
                    inner.mesh_refcount.remove(&removed.mesh_id);
                    inner.atlas.remove(removed.mesh_id);
                }
            }

            if idx < inner.updating.len() {
                inner.updating[idx].reserved1 = idx as u32;
                let moved_from = (inner.updating.len()) as u32;
                for owned in inner.renderable_slots.values_mut() {
                    for slot_ref in owned.iter_mut() {
                        if *slot_ref == moved_from {
                            *slot_ref = idx as u32;
                        }
                    }
                }
            }
        }
    }

    /// Copies the live portion of `updating` into `loaded` and publishes the
    /// new total command count. The render thread only reads `loaded`
    /// commands, and only after this call returns.
    pub fn swap(&self) {
        let inner = self.inner.lock();
        let mut loaded = self.loaded.lock();
        loaded.commands.clear();
        loaded.commands.extend_from_slice(&inner.updating);
        loaded.total_command_count = inner.updating.len() as u32;
    }

    pub fn total_command_count(&self) -> u32 {
        self.loaded.lock().total_command_count
    }

    /// Runs `f` against the currently loaded command slice.
    pub fn with_loaded<R>(&self, f: impl FnOnce(&[SceneCommand]) -> R) -> R {
        let loaded = self.loaded.lock();
        f(&loaded.commands[..loaded.total_command_count as usize])
    }

    pub fn mesh_refcount(&self, mesh_id: u32) -> u32 {
        self.inner.lock().mesh_refcount.get(&mesh_id).copied().unwrap_or(0)
    }

    pub fn is_mesh_resident(&self, mesh_id: u32) -> bool {
        self.inner.lock().atlas.is_resident(mesh_id)
    }

    pub fn rebuild_atlas_if_dirty(&self, device: &mut impl crate::gpu_api::GraphicsDevice) {
        self.inner.lock().atlas.rebuild_if_dirty(device);
    }

    pub fn atlas_version(&self) -> u32 {
        self.inner.lock().atlas.atlas_version()
    }

    pub fn try_get_mesh_data(&self, mesh_id: u32) -> crate::layout::MeshDataEntry {
        self.inner.lock().atlas.mesh_data_table().get(mesh_id)
    }
}
