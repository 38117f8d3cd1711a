//! Runtime-switchable occlusion stage: Hi-Z (GPU-shaped, CPU-referenced
//! here) or asynchronous hardware occlusion queries with temporal
//! hysteresis. See [`crate::config::GpuOcclusionMode`].

mod cpu_query;
mod hiz;

#[cfg(test)]
mod tests;

pub use cpu_query::CpuQueryOcclusion;
pub use hiz::{project_to_screen, HiZPyramid};

use hashbrown::HashMap;

use crate::camera::Camera;
use crate::config::GpuOcclusionMode;
use crate::layout::SceneCommand;

/// Per-pass per-frame occlusion counters, folded into [`crate::layout::StatsBlock`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub candidates: u32,
    pub accepted: u32,
    pub recoveries: u32,
    pub temporal_overrides: u32,
}

/// Depth/query input for one call to [`OcclusionEngine::apply`].
pub enum OcclusionInput<'a> {
    HiZ { depth: &'a [f32], width: u32, height: u32 },
    CpuQuery { results: &'a HashMap<u32, u32> },
}

/// Owns the Hi-Z pyramid (rebuilt every frame it's used) and the per-pass
/// temporal query state; both are invalidated on a mode change.
#[derive(Default)]
pub struct OcclusionEngine {
    cpu_query: CpuQueryOcclusion,
    last_mode: Option<GpuOcclusionMode>,
}

impl OcclusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chooses "disabled" for shadow passes or when passthrough culling is
    /// forced, per spec §4.5, regardless of the configured mode.
    pub fn effective_mode(
        configured: GpuOcclusionMode,
        is_shadow_pass: bool,
        passthrough_culling_forced: bool,
    ) -> GpuOcclusionMode {
        if is_shadow_pass || passthrough_culling_forced {
            GpuOcclusionMode::Disabled
        } else {
            configured
        }
    }

    fn reset_temporal_state_on_mode_change(&mut self, mode: GpuOcclusionMode) {
        if self.last_mode != Some(mode) {
            self.cpu_query = CpuQueryOcclusion::new();
            self.last_mode = Some(mode);
        }
    }

    /// Applies the occlusion stage to `candidates` (the compacted indices
    /// coming out of `Cull`), returning the surviving subset and this
    /// frame's [`FrameStats`].
    pub fn apply(
        &mut self,
        mode: GpuOcclusionMode,
        camera: &Camera,
        commands: &[SceneCommand],
        candidates: &[u32],
        input: Option<OcclusionInput<'_>>,
    ) -> (Vec<u32>, FrameStats) {
        self.reset_temporal_state_on_mode_change(mode);
        let mut stats = FrameStats { candidates: candidates.len() as u32, ..Default::default() };

        match (mode, input) {
            (GpuOcclusionMode::Disabled, _) => {
                stats.accepted = candidates.len() as u32;
                (candidates.to_vec(), stats)
            }
            (GpuOcclusionMode::GpuHiZ, Some(OcclusionInput::HiZ { depth, width, height })) => {
                let pyramid = HiZPyramid::build(depth, width, height, camera.is_reversed_depth);
                let survivors = hiz::refine(&pyramid, camera, width, height, commands, candidates);
                stats.accepted = survivors.len() as u32;
                (survivors, stats)
            }
            (GpuOcclusionMode::CpuQueryAsync, Some(OcclusionInput::CpuQuery { results })) => {
                let jumped = self.cpu_query.invalidate_on_camera_jump(camera);
                let (survivors, recoveries) = self.cpu_query.apply(candidates, results);
                stats.accepted = survivors.len() as u32;
                stats.recoveries = recoveries;
                stats.temporal_overrides = if jumped { candidates.len() as u32 } else { 0 };
                (survivors, stats)
            }
            (mode, _) => {
                tracing::warn!("occlusion: mode {:?} selected without matching input, passing through", mode);
                stats.accepted = candidates.len() as u32;
                (candidates.to_vec(), stats)
            }
        }
    }
}
