//! Ambient configuration: plain `Copy` structs with `Default` impls, owned
//! by [`crate::context::GpuRenderContext`] rather than kept as globals.

/// Runtime-switchable occlusion strategy. See [`crate::occlusion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuOcclusionMode {
    #[default]
    Disabled,
    GpuHiZ,
    CpuQueryAsync,
}

/// User-facing rendering toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderingSettings {
    pub enable_gpu_indirect_debug_logging: bool,
    pub enable_gpu_driven_batching: bool,
    pub enable_gpu_driven_instancing: bool,
    pub use_gpu_bvh: bool,
    pub cache_gpu_hiz_once_per_frame: bool,
    pub gpu_occlusion_mode: GpuOcclusionMode,
    pub enable_cpu_material_sort: bool,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            enable_gpu_indirect_debug_logging: false,
            enable_gpu_driven_batching: true,
            enable_gpu_driven_instancing: true,
            use_gpu_bvh: false,
            cache_gpu_hiz_once_per_frame: true,
            gpu_occlusion_mode: GpuOcclusionMode::Disabled,
            // The reorder routine assumes exclusive ownership of the
            // indirect buffer between BuildBatches and submission (open
            // question in SPEC_FULL.md §9); off by default, as upstream.
            enable_cpu_material_sort: false,
        }
    }
}

/// Debug escape hatches. Every toggle here routes a normally-GPU-only step
/// through the same CPU reference path the test suite uses (see
/// `crate::gpu_api::CpuGraphicsDevice`), rather than being test-only
/// scaffolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndirectDebug {
    pub force_cpu_fallback_count: bool,
    pub disable_count_draw_path: bool,
    pub skip_indirect_tail_clear: bool,
    pub force_cpu_indirect_build: bool,
    pub log_count_buffer_writes: bool,
    pub force_parameter_remap: bool,
    pub validate_buffer_layouts: bool,
    pub validate_live_handles: bool,
    pub disable_cpu_readback_count: bool,
    pub enable_cpu_batching: bool,
    pub probe_source_commands_before_copy: bool,
    pub probe_source_command_count: u32,
    pub validate_copy_command_atomic_bounds: bool,
}

/// Starting (pre-growth) capacity for any per-pass or atlas buffer sized in
/// elements.
pub const MIN_COMMAND_COUNT: usize = 64;

/// Up to this many CPU hardware occlusion queries are submitted per frame in
/// [`GpuOcclusionMode::CpuQueryAsync`].
pub const CPU_OCC_MAX_PER_FRAME: usize = 256;

/// Consecutive zero-sample frames required before a command is declared
/// occluded.
pub const TEMPORAL_HYSTERESIS: u32 = 4;

/// Camera translation (world units) beyond which all temporal occlusion
/// state is invalidated.
pub const TEMPORAL_CAMERA_JUMP: f32 = 5.0;

/// Per-entry view-projection delta beyond which all temporal occlusion
/// state is invalidated.
pub const TEMPORAL_PROJ_DELTA: f32 = 0.25;

/// Maximum simultaneous views, per spec §4.6.
pub const ABSOLUTE_MAX_VIEWS: usize = 64;
