//! `CpuQueryAsync` occlusion: temporal hysteresis over one-frame-latent
//! hardware occlusion query results, keyed by `source_index` (`reserved1`).

use hashbrown::HashMap;

use crate::camera::Camera;
use crate::config::{CPU_OCC_MAX_PER_FRAME, TEMPORAL_CAMERA_JUMP, TEMPORAL_HYSTERESIS, TEMPORAL_PROJ_DELTA};

/// Per-command consecutive-zero-sample counters, persisted across frames.
#[derive(Debug, Default)]
pub struct CpuQueryOcclusion {
    zero_streak: HashMap<u32, u32>,
    prev_camera_position: Option<glam::Vec3>,
    prev_view_proj: Option<glam::Mat4>,
}

impl CpuQueryOcclusion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all temporal state if the camera jumped beyond the thresholds
    /// since the last call. Always updates the stored previous camera state.
    pub fn invalidate_on_camera_jump(&mut self, camera: &Camera) -> bool {
        let position = camera.position();
        let view_proj = camera.view_proj();
        let mut jumped = false;

        if let Some(prev_position) = self.prev_camera_position {
            if position.distance(prev_position) > TEMPORAL_CAMERA_JUMP {
                jumped = true;
            }
        }
        if let Some(prev_vp) = self.prev_view_proj {
            if matrix_max_abs_delta(prev_vp, view_proj) > TEMPORAL_PROJ_DELTA {
                jumped = true;
            }
        }
        if jumped {
            self.zero_streak.clear();
        }

        self.prev_camera_position = Some(position);
        self.prev_view_proj = Some(view_proj);
        jumped
    }

    /// Picks up to `CPU_OCC_MAX_PER_FRAME` candidates to submit queries for
    /// this frame.
    pub fn select_queries_to_submit(candidates: &[u32]) -> &[u32] {
        let n = candidates.len().min(CPU_OCC_MAX_PER_FRAME);
        &candidates[..n]
    }

    /// Resolves this frame's (one-frame-latent) query results against
    /// `candidates`, applying hysteresis, and returns `(survivors,
    /// recoveries)`. A candidate with no resolved result yet (not queried,
    /// or query not ready) keeps its prior occlusion state rather than
    /// stalling on a fresh query.
    pub fn apply(&mut self, candidates: &[u32], results: &HashMap<u32, u32>) -> (Vec<u32>, u32) {
        let mut survivors = Vec::with_capacity(candidates.len());
        let mut recoveries = 0;

        for &source_index in candidates {
            let was_occluded = self.is_occluded(source_index);

            if let Some(&samples) = results.get(&source_index) {
                if samples == 0 {
                    *self.zero_streak.entry(source_index).or_insert(0) += 1;
                } else {
                    if was_occluded {
                        recoveries += 1;
                    }
                    self.zero_streak.remove(&source_index);
                }
            }

            if !self.is_occluded(source_index) {
                survivors.push(source_index);
            }
        }

        (survivors, recoveries)
    }

    pub fn is_occluded(&self, source_index: u32) -> bool {
        self.zero_streak.get(&source_index).copied().unwrap_or(0) >= TEMPORAL_HYSTERESIS
    }
}

fn matrix_max_abs_delta(a: glam::Mat4, b: glam::Mat4) -> f32 {
    let ac = a.to_cols_array();
    let bc = b.to_cols_array();
    ac.iter().zip(bc.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
}
