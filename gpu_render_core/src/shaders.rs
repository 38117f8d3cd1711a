//! Compute shader source constants for the GPU-driven pipeline.
//!
//! Each stage's WGSL lives under `shaders/` and is embedded at compile time.
//! The CPU reference implementations in [`crate::render_pass::pipeline`] and
//! [`crate::occlusion`] mirror these byte-for-byte against the structs in
//! [`crate::layout`]; a real backend compiles these and dispatches against
//! the same buffer layouts the CPU path writes.

/// Struct/helper definitions shared by every stage (`SceneCommand`,
/// `SortKeyRaw`, `IndirectDraw`, `BatchRangeEntry`, `MeshDataEntry`).
pub const COMMON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl"));

/// Clears per-pass counters and the indirect tail before `Cull` writes.
pub const RESET: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/reset.wgsl")),
);

/// Frustum + distance cull, compacting surviving command indices.
pub const CULL: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/cull.wgsl")),
);

/// Builds the Hi-Z min/max mip pyramid from the previous frame's depth.
pub const HIZ_BUILD: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/hiz_build.wgsl")),
);

/// Refines `Cull`'s survivors against the Hi-Z pyramid.
pub const HIZ_REFINE: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/hiz_refine.wgsl")),
);

/// Packs one `SortKeyRaw` per surviving command.
pub const BUILD_KEYS: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/build_keys.wgsl")),
);

/// Emits `BatchRangeEntry`/`IndirectDraw` from sorted keys.
pub const BUILD_BATCHES: &str = concat!(
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/common.wgsl")),
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/build_batches.wgsl")),
);
