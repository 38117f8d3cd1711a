//! Bindless vertex/index store: five parallel attribute buffers shared by
//! every resident mesh, indexed by per-mesh `(first_vertex, first_index,
//! index_count)` offsets.
//!
//! Grounded on `graphics/buffer/growable_buffer.rs` (capacity doubling,
//! `ensure_capacity`/`write`) and `graphics/buffer/retained_mesh.rs`
//! (handle-based registry with a monotonic id and a `HashMap<u32, _>`) in the
//! teacher's graphics backend.

mod growable;
mod mesh_data;


use hashbrown::HashMap;

pub use growable::GpuCapacity;
pub use mesh_data::MeshDataTable;

use crate::error::MeshAtlasError;
use crate::gpu_api::{BufferId, GraphicsDevice};

/// A mesh's vertex attributes and index list, already in the triangle-list
/// layout §6 requires (position vec3, normal vec3, tangent vec4, uv0 vec2).
#[derive(Debug, Clone)]
pub struct MeshGeometry<'a> {
    pub positions: &'a [[f32; 3]],
    pub normals: &'a [[f32; 3]],
    pub tangents: &'a [[f32; 4]],
    pub uv0: &'a [[f32; 2]],
    pub indices: &'a [u32],
    pub topology: Topology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    Other,
}

/// Atlas residency info for one mesh: its slice of the shared vertex/index
/// buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtlasMeshData {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

impl From<AtlasMeshData> for crate::layout::MeshDataEntry {
    fn from(m: AtlasMeshData) -> Self {
        crate::layout::MeshDataEntry {
            index_count: m.index_count,
            first_index: m.first_index,
            first_vertex: m.first_vertex,
            base_instance: 0,
        }
    }
}

/// Notification sent after a successful atlas rebuild. Carried over a
/// `crossbeam_channel::bounded(1)` "latest value" channel: a new rebuild
/// overwrites any unconsumed previous one, so at most one subscriber (the
/// render pass) ever needs to drain it, and it always sees the newest
/// version when it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRebuilt(pub u32);

struct AttributeBuffer {
    /// CPU mirror of the GPU buffer contents (element count, not bytes).
    data: Vec<u8>,
    element_size: usize,
    capacity: GpuCapacity,
    gpu_buffer: Option<BufferId>,
    label: &'static str,
}

impl AttributeBuffer {
    fn new(element_size: usize, label: &'static str) -> Self {
        Self {
            data: Vec::new(),
            element_size,
            capacity: GpuCapacity::new(crate::config::MIN_COMMAND_COUNT),
            gpu_buffer: None,
            label,
        }
    }

    fn element_count(&self) -> usize {
        self.data.len() / self.element_size
    }

    fn ensure_buffer(&mut self, device: &mut impl GraphicsDevice) {
        if self.gpu_buffer.is_none() {
            let bytes = (self.capacity.capacity() * self.element_size) as u64;
            self.gpu_buffer = Some(device.create_storage_buffer(self.label, bytes));
        }
    }

    fn rebuild(&mut self, device: &mut impl GraphicsDevice) {
        self.ensure_buffer(device);
        let buffer = self.gpu_buffer.expect("ensure_buffer just ran");
        if let Some(new_cap) = self.capacity.ensure(self.element_count()) {
            device.ensure_capacity(buffer, (new_cap * self.element_size) as u64);
        }
        device.write_buffer(buffer, 0, &self.data);
    }
}

/// Bindless vertex/index atlas. Single-writer (the scene-graph update
/// thread via `append`/`remove`), read-only from the GPU's perspective.
pub struct MeshAtlas {
    positions: AttributeBuffer,
    normals: AttributeBuffer,
    tangents: AttributeBuffer,
    uv0: AttributeBuffer,
    indices: AttributeBuffer,

    entries: HashMap<u32, AtlasMeshData>,
    mesh_data: MeshDataTable,
    dirty: bool,
    atlas_version: u32,
    rebuilt_tx: crossbeam_channel::Sender<AtlasRebuilt>,
    rebuilt_rx: crossbeam_channel::Receiver<AtlasRebuilt>,
}

impl Default for MeshAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshAtlas {
    pub fn new() -> Self {
        let (rebuilt_tx, rebuilt_rx) = crossbeam_channel::bounded(1);
        Self {
            positions: AttributeBuffer::new(std::mem::size_of::<[f32; 3]>(), "atlas positions"),
            normals: AttributeBuffer::new(std::mem::size_of::<[f32; 3]>(), "atlas normals"),
            tangents: AttributeBuffer::new(std::mem::size_of::<[f32; 4]>(), "atlas tangents"),
            uv0: AttributeBuffer::new(std::mem::size_of::<[f32; 2]>(), "atlas uv0"),
            indices: AttributeBuffer::new(std::mem::size_of::<u32>(), "atlas indices"),
            entries: HashMap::new(),
            mesh_data: MeshDataTable::new(),
            dirty: false,
            atlas_version: 0,
            rebuilt_tx,
            rebuilt_rx,
        }
    }

    pub fn atlas_version(&self) -> u32 {
        self.atlas_version
    }

    /// Drains the latest `AtlasRebuilt` notification, if any arrived since
    /// last drained. Matches "guarantee-deliver to at most one subscriber
    /// per version": if two rebuilds happen before this is called, only the
    /// newest is observed, which is correct because only the current layout
    /// matters to a consumer resyncing its element buffer.
    pub fn try_recv_rebuilt(&self) -> Option<AtlasRebuilt> {
        self.rebuilt_rx.try_recv().ok()
    }

    pub fn is_resident(&self, mesh_id: u32) -> bool {
        self.entries.contains_key(&mesh_id)
    }

    pub fn get(&self, mesh_id: u32) -> Option<AtlasMeshData> {
        self.entries.get(&mesh_id).copied()
    }

    pub fn mesh_data_table(&self) -> &MeshDataTable {
        &self.mesh_data
    }

    /// Lazily creates the five attribute buffers and the index buffer.
    pub fn ensure_buffers(&mut self, device: &mut impl GraphicsDevice) {
        self.positions.ensure_buffer(device);
        self.normals.ensure_buffer(device);
        self.tangents.ensure_buffer(device);
        self.uv0.ensure_buffer(device);
        self.indices.ensure_buffer(device);
    }

    /// Appends a mesh's geometry into the atlas, returning its new offsets.
    pub fn append(&mut self, mesh_id: u32, geometry: &MeshGeometry<'_>) -> Result<AtlasMeshData, MeshAtlasError> {
        if self.entries.contains_key(&mesh_id) {
            return Err(MeshAtlasError::AlreadyResident);
        }
        if geometry.positions.is_empty() {
            return Err(MeshAtlasError::EmptyVertices);
        }
        if geometry.indices.is_empty() {
            return Err(MeshAtlasError::NoIndices);
        }
        if geometry.topology != Topology::TriangleList {
            return Err(MeshAtlasError::UnsupportedTopology);
        }

        let mut indices = geometry.indices;
        if !indices.len().is_multiple_of(3) {
            let truncated = (indices.len() / 3) * 3;
            tracing::warn!(
                "{}",
                MeshAtlasError::IndexCountNotMultipleOfThree(indices.len() as u32)
            );
            indices = &indices[..truncated];
        }
        if indices.is_empty() {
            return Err(MeshAtlasError::NoIndices);
        }

        let vertex_count = geometry.positions.len() as u32;
        let first_vertex = (self.positions.element_count()) as u32;
        let first_index = (self.indices.element_count()) as u32;
        let index_count = indices.len() as u32;

        self.positions.data.extend_from_slice(bytemuck::cast_slice(geometry.positions));
        self.normals.data.extend_from_slice(bytemuck::cast_slice(pad_or_truncate(geometry.normals, geometry.positions.len())));
        self.tangents.data.extend_from_slice(bytemuck::cast_slice(pad_or_truncate(geometry.tangents, geometry.positions.len())));
        self.uv0.data.extend_from_slice(bytemuck::cast_slice(pad_or_truncate(geometry.uv0, geometry.positions.len())));
        self.indices.data.extend_from_slice(bytemuck::cast_slice(indices));

        let atlas_data = AtlasMeshData { first_vertex, vertex_count, first_index, index_count };
        self.entries.insert(mesh_id, atlas_data);
        self.mesh_data.set(mesh_id, atlas_data.into());
        self.dirty = true;

        tracing::debug!(
            "atlas: appended mesh {} ({} verts, {} indices) at v={} i={}",
            mesh_id, vertex_count, index_count, first_vertex, first_index
        );

        Ok(atlas_data)
    }

    /// Slides every higher-offset range down over the freed span and adjusts
    /// the offsets of all still-resident meshes accordingly.
    pub fn remove(&mut self, mesh_id: u32) {
        let Some(removed) = self.entries.remove(&mesh_id) else { return };

        remove_range(&mut self.positions.data, self.positions.element_size, removed.first_vertex as usize, removed.vertex_count as usize);
        remove_range(&mut self.normals.data, self.normals.element_size, removed.first_vertex as usize, removed.vertex_count as usize);
        remove_range(&mut self.tangents.data, self.tangents.element_size, removed.first_vertex as usize, removed.vertex_count as usize);
        remove_range(&mut self.uv0.data, self.uv0.element_size, removed.first_vertex as usize, removed.vertex_count as usize);
        remove_range(&mut self.indices.data, self.indices.element_size, removed.first_index as usize, removed.index_count as usize);

        for entry in self.entries.values_mut() {
            if entry.first_vertex > removed.first_vertex {
                entry.first_vertex -= removed.vertex_count;
            }
            if entry.first_index > removed.first_index {
                entry.first_index -= removed.index_count;
            }
        }

        self.mesh_data.clear(mesh_id);
        for (&id, &entry) in self.entries.iter() {
            self.mesh_data.set(id, entry.into());
        }

        self.dirty = true;
        tracing::debug!("atlas: removed mesh {}", mesh_id);
    }

    /// Grows GPU buffers to current counts (never shrinks), uploads the
    /// whole CPU mirror, repopulates `MeshDataBuffer`, bumps `atlas_version`,
    /// and publishes `AtlasRebuilt`.
    pub fn rebuild_if_dirty(&mut self, device: &mut impl GraphicsDevice) {
        if !self.dirty {
            return;
        }
        self.ensure_buffers(device);
        self.positions.rebuild(device);
        self.normals.rebuild(device);
        self.tangents.rebuild(device);
        self.uv0.rebuild(device);
        self.indices.rebuild(device);

        self.dirty = false;
        self.atlas_version += 1;

        // Latest-value semantics: drop any unconsumed previous notification.
        let _ = self.rebuilt_rx.try_recv();
        let _ = self.rebuilt_tx.try_send(AtlasRebuilt(self.atlas_version));

        tracing::debug!("atlas: rebuilt, version={}", self.atlas_version);
    }
}

fn pad_or_truncate<T: Copy + Default>(data: &[T], len: usize) -> Vec<T> {
    let mut out = data.to_vec();
    out.resize(len, T::default());
    out
}

fn remove_range(data: &mut Vec<u8>, element_size: usize, first: usize, count: usize) {
    let start = first * element_size;
    let len = count * element_size;
    if start + len <= data.len() {
        data.drain(start..start + len);
    }
}
