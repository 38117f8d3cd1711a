//! GPU-shared record definitions and the startup layout check.
//!
//! Every record here is `#[repr(C)]`, `Pod`, little-endian, and must match
//! the byte layout the compute shaders in `shaders/` assume. Sizes that are
//! knowable at compile time are pinned with [`static_assertions::const_assert_eq`]
//! so a regression is a compile error; [`LayoutRegistry::verify`] re-checks
//! the same constants at process start so an embedder gets a catchable
//! [`LayoutError`] too.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::error::LayoutError;

/// A single GPU `DrawIndexedIndirect`-compatible record. 20 bytes, matching
/// the wire format `MultiDrawIndirectCount` reads in bulk.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDraw {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: u32,
    pub base_instance: u32,
}

pub const INDIRECT_DRAW_SIZE: usize = 20;
const_assert_eq!(std::mem::size_of::<IndirectDraw>(), INDIRECT_DRAW_SIZE);

/// One renderable submesh, as stored in the [`crate::scene::SceneStore`]
/// command array and shared with the GPU. 192 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneCommand {
    pub mesh_id: u32,
    pub submesh_id: u32,
    pub material_id: u32,
    pub render_pass: u32,
    pub instance_count: u32,
    pub layer_mask: u32,
    pub render_distance: f32,
    pub world_matrix: [f32; 16],
    pub prev_world_matrix: [f32; 16],
    pub flags: u32,
    pub lod: u32,
    pub shader_program_id: u32,
    pub bounding_sphere: [f32; 4],
    pub reserved0: u32,
    /// Always equal to this command's own index in the owning buffer; the
    /// "source_index" used by sort keys and CPU occlusion queries.
    pub reserved1: u32,
}

pub const SCENE_COMMAND_SIZE: usize = 192;
const_assert_eq!(std::mem::size_of::<SceneCommand>(), SCENE_COMMAND_SIZE);

impl Default for SceneCommand {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Per-mesh GPU-atlas offsets, one entry per `mesh_id`. 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct MeshDataEntry {
    pub index_count: u32,
    pub first_index: u32,
    pub first_vertex: u32,
    pub base_instance: u32,
}

pub const MESH_DATA_ENTRY_SIZE: usize = 16;
const_assert_eq!(std::mem::size_of::<MeshDataEntry>(), MESH_DATA_ENTRY_SIZE);

/// The packed per-command sort key quad used by `BuildKeys`/`BuildBatches`.
/// 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct SortKeyRaw {
    /// `pass << 24 | pipeline << 8 | state`, packed so a plain integer
    /// compare sorts by render pass, then pipeline, then blend state.
    pub pass_pipeline_state: u32,
    pub material_id: u32,
    pub mesh_id: u32,
    pub source_index: u32,
}

pub const SORT_KEY_SIZE: usize = 16;
const_assert_eq!(std::mem::size_of::<SortKeyRaw>(), SORT_KEY_SIZE);

/// A contiguous run of `IndirectDraw`s sharing one material. 12 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct BatchRangeEntry {
    pub draw_offset: u32,
    pub draw_count: u32,
    pub material_id: u32,
}

pub const BATCH_RANGE_ENTRY_SIZE: usize = 12;
const_assert_eq!(std::mem::size_of::<BatchRangeEntry>(), BATCH_RANGE_ENTRY_SIZE);

/// Per-pass readback counters. At least 64 bytes, padded to exactly 64 so
/// the GPU-side struct declaration has no trailing hole.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct StatsBlock {
    pub input_count: u32,
    pub culled_count: u32,
    pub drawn_count: u32,
    pub rejected_frustum: u32,
    pub rejected_distance: u32,
    pub occlusion_candidates: u32,
    pub occlusion_accepted: u32,
    pub occlusion_recoveries: u32,
    pub occlusion_temporal_overrides: u32,
    pub bvh_build_time_lo: u32,
    pub bvh_build_time_hi: u32,
    pub bvh_refit_time_lo: u32,
    pub bvh_refit_time_hi: u32,
    pub reserved: [u32; 3],
}

pub const STATS_BLOCK_SIZE: usize = 64;
const_assert_eq!(std::mem::size_of::<StatsBlock>(), STATS_BLOCK_SIZE);

/// One entry in the [`crate::view_set::ViewSet`] ring. 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct ViewDescriptor {
    /// Bit `i` set means this view accepts commands with `render_pass == i`.
    pub render_pass_mask: u64,
    pub view_kind: u32,
    pub viewport: [u32; 4],
    pub flags: u32,
}

pub const VIEW_DESCRIPTOR_SIZE: usize = 32;
const_assert_eq!(std::mem::size_of::<ViewDescriptor>(), VIEW_DESCRIPTOR_SIZE);

/// Per-view GPU constants (matrices + camera params). 288 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewConstants {
    pub view_proj: [f32; 16],
    pub view: [f32; 16],
    pub proj: [f32; 16],
    pub prev_view_proj: [f32; 16],
    pub camera_position: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub flags: u32,
    pub reserved: u32,
}

pub const VIEW_CONSTANTS_SIZE: usize = 288;
const_assert_eq!(std::mem::size_of::<ViewConstants>(), VIEW_CONSTANTS_SIZE);

impl Default for ViewConstants {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Verifies every GPU-shared record against its expected byte size.
///
/// Called once at context construction; failure is meant to fail process
/// start with a configuration error, per spec.
pub struct LayoutRegistry;

impl LayoutRegistry {
    pub fn verify() -> Result<(), LayoutError> {
        Self::check("IndirectDraw", std::mem::size_of::<IndirectDraw>(), INDIRECT_DRAW_SIZE)?;
        Self::check("SceneCommand", std::mem::size_of::<SceneCommand>(), SCENE_COMMAND_SIZE)?;
        Self::check("MeshDataEntry", std::mem::size_of::<MeshDataEntry>(), MESH_DATA_ENTRY_SIZE)?;
        Self::check("SortKeyRaw", std::mem::size_of::<SortKeyRaw>(), SORT_KEY_SIZE)?;
        Self::check(
            "BatchRangeEntry",
            std::mem::size_of::<BatchRangeEntry>(),
            BATCH_RANGE_ENTRY_SIZE,
        )?;
        Self::check("StatsBlock", std::mem::size_of::<StatsBlock>(), STATS_BLOCK_SIZE)?;
        Self::check(
            "ViewDescriptor",
            std::mem::size_of::<ViewDescriptor>(),
            VIEW_DESCRIPTOR_SIZE,
        )?;
        Self::check("ViewConstants", std::mem::size_of::<ViewConstants>(), VIEW_CONSTANTS_SIZE)?;
        Ok(())
    }

    fn check(name: &'static str, actual: usize, expected: usize) -> Result<(), LayoutError> {
        if actual != expected {
            return Err(LayoutError::SizeMismatch { name, expected, actual });
        }
        Ok(())
    }
}
