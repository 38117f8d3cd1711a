//! Folds one frame's cull/occlusion/draw results into a [`StatsBlock`] for
//! CPU readback, mirroring the atomic counters the real compute shaders
//! accumulate into the same struct.

use crate::layout::StatsBlock;
use crate::occlusion::FrameStats;
use crate::render_pass::pipeline::CullOutput;

/// Overwrites `stats` with this frame's counters. Each [`StatsBlock`] is
/// scoped to one render pass, so this replaces rather than adds.
pub fn accumulate(
    stats: &mut StatsBlock,
    input_count: u32,
    cull_output: &CullOutput,
    occlusion: FrameStats,
    drawn_count: u32,
) {
    *stats = StatsBlock {
        input_count,
        culled_count: cull_output.culled_indices.len() as u32,
        drawn_count,
        rejected_frustum: cull_output.rejected_frustum,
        rejected_distance: cull_output.rejected_distance,
        occlusion_candidates: occlusion.candidates,
        occlusion_accepted: occlusion.accepted,
        occlusion_recoveries: occlusion.recoveries,
        occlusion_temporal_overrides: occlusion.temporal_overrides,
        ..StatsBlock::default()
    };
}
