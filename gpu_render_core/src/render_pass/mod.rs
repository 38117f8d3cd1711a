//! One render pass's GPU-driven pipeline: `Cull → Occlusion → BuildKeys →
//! (CpuMaterialSort) → BuildBatches → submit`, against the [`GraphicsDevice`]
//! boundary so the same code runs the real backend or [`CpuGraphicsDevice`].

mod pipeline;
mod stats;

#[cfg(test)]
mod tests;

pub use pipeline::{cull, BatchOutput, CullOutput};

use crate::camera::Camera;
use crate::config::{IndirectDebug, RenderingSettings};
use crate::error::RenderPassError;
use crate::gpu_api::{BufferId, GraphicsDevice, IndirectDrawCall};
use crate::layout::{MeshDataEntry, StatsBlock};
use crate::mesh_atlas::GpuCapacity;
use crate::occlusion::{OcclusionEngine, OcclusionInput};
use crate::scene::SceneStore;

/// Lifecycle state of a [`RenderPass`]'s GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPassState {
    #[default]
    Uninitialized,
    Initialized,
    Disposed,
}

/// Everything `run_frame` produced for one pass, for the caller to submit
/// (or, in tests, inspect).
#[derive(Debug, Clone, Default)]
pub struct FramePassResult {
    pub draw_call: Option<IndirectDrawCall>,
    pub draw_count: u32,
    pub stats: StatsBlock,
}

/// One render pass's GPU-resident buffers and per-frame state. Capacity only
/// grows, per [`GpuCapacity`]; a pass keeps its buffers across frames and
/// across scenes, resized in place as the live command count demands.
pub struct RenderPass {
    pub render_pass_id: u32,
    state: RenderPassState,
    capacity: GpuCapacity,
    indirect_buffer: Option<BufferId>,
    count_buffer: Option<BufferId>,
    atlas_version_synced: u32,
    stats: StatsBlock,
    occlusion: OcclusionEngine,
}

impl RenderPass {
    pub fn new(render_pass_id: u32) -> Self {
        Self {
            render_pass_id,
            state: RenderPassState::Uninitialized,
            capacity: GpuCapacity::new(crate::config::MIN_COMMAND_COUNT),
            indirect_buffer: None,
            count_buffer: None,
            atlas_version_synced: 0,
            stats: StatsBlock::default(),
            occlusion: OcclusionEngine::new(),
        }
    }

    pub fn state(&self) -> RenderPassState {
        self.state
    }

    pub fn stats(&self) -> StatsBlock {
        self.stats
    }

    /// Creates the indirect/count buffers at the pass's starting capacity.
    /// Idempotent: a pass already `Initialized` is left untouched.
    pub fn pre_render_initialize(&mut self, device: &mut impl GraphicsDevice) {
        if self.state == RenderPassState::Initialized {
            return;
        }
        let indirect_size = self.capacity.capacity() as u64 * crate::layout::INDIRECT_DRAW_SIZE as u64;
        self.indirect_buffer =
            Some(device.create_storage_buffer("gpu_render_core indirect draws", indirect_size));
        self.count_buffer = Some(device.create_storage_buffer("gpu_render_core draw count", 4));
        self.state = RenderPassState::Initialized;
    }

    pub fn dispose(&mut self) {
        self.indirect_buffer = None;
        self.count_buffer = None;
        self.state = RenderPassState::Disposed;
    }

    /// Rebuilds the mesh atlas if dirty and remembers the version this pass
    /// has now synced to, so callers can tell whether a rebuild happened.
    pub fn ensure_atlas_synced(&mut self, scene: &SceneStore, device: &mut impl GraphicsDevice) {
        scene.rebuild_atlas_if_dirty(device);
        self.atlas_version_synced = scene.atlas_version();
    }

    /// Runs the full per-frame pipeline for this pass against the scene's
    /// currently loaded commands. `force_passthrough` and `is_shadow_pass`
    /// both come from the owning [`crate::context::GpuRenderContext`] and
    /// together determine the effective occlusion mode (always disabled for
    /// either).
    #[allow(clippy::too_many_arguments)]
    pub fn run_frame(
        &mut self,
        device: &mut impl GraphicsDevice,
        scene: &SceneStore,
        camera: &Camera,
        settings: &RenderingSettings,
        debug: &IndirectDebug,
        force_passthrough: bool,
        is_shadow_pass: bool,
        layer_mask: u32,
        occlusion_input: Option<OcclusionInput<'_>>,
        material_allows_aggregation: impl Fn(u32) -> bool,
    ) -> Result<FramePassResult, RenderPassError> {
        if self.state != RenderPassState::Initialized {
            return Err(RenderPassError::NotInitialized);
        }

        let commands = scene.with_loaded(|c| c.to_vec());
        let input_count = commands.len() as u32;

        let cull_output = pipeline::cull(
            &commands,
            camera,
            self.render_pass_id,
            layer_mask,
            self.capacity.capacity(),
            force_passthrough,
        );

        let effective_mode =
            OcclusionEngine::effective_mode(settings.gpu_occlusion_mode, is_shadow_pass, force_passthrough);
        let (surviving, occlusion_stats) =
            self.occlusion
                .apply(effective_mode, camera, &commands, &cull_output.culled_indices, occlusion_input);

        let mut keys = pipeline::build_keys(&commands, &surviving);
        if settings.enable_cpu_material_sort {
            pipeline::sort_by_material(&mut keys);
        }

        let lookup = |mesh_id: u32| -> MeshDataEntry { scene.try_get_mesh_data(mesh_id) };
        let batches = pipeline::build_batches(
            &commands,
            lookup,
            &keys,
            self.capacity.capacity(),
            settings.enable_gpu_driven_instancing,
            material_allows_aggregation,
        );

        if let Some(new_capacity) = self.capacity.ensure(batches.draws.len().max(1)) {
            if let Some(indirect) = self.indirect_buffer {
                device.ensure_capacity(indirect, new_capacity as u64 * crate::layout::INDIRECT_DRAW_SIZE as u64);
            }
        }

        let indirect_buffer = self.indirect_buffer.ok_or(RenderPassError::NotInitialized)?;
        let count_buffer = self.count_buffer.ok_or(RenderPassError::NotInitialized)?;

        if debug.force_cpu_indirect_build || debug.enable_cpu_batching {
            for (i, draw) in batches.draws.iter().enumerate() {
                device.write_buffer(
                    indirect_buffer,
                    (i * crate::layout::INDIRECT_DRAW_SIZE) as u64,
                    bytemuck::bytes_of(draw),
                );
            }
        } else {
            device.dispatch_compute("build_batches", [(batches.draws.len() as u32).max(1), 1, 1]);
        }

        let draw_count = batches.draws.len() as u32;
        if !debug.disable_count_draw_path {
            device.write_buffer(count_buffer, 0, &draw_count.to_le_bytes());
        }
        device.memory_barrier();

        let draw_call = if debug.force_cpu_fallback_count {
            None
        } else {
            Some(device.multi_draw_indirect_count(
                indirect_buffer,
                count_buffer,
                self.capacity.capacity() as u32,
                crate::layout::INDIRECT_DRAW_SIZE as u32,
            ))
        };

        stats::accumulate(&mut self.stats, input_count, &cull_output, occlusion_stats, draw_count);

        Ok(FramePassResult { draw_call, draw_count, stats: self.stats })
    }
}
