//! Hierarchical-Z occlusion: mip-pyramid build from a depth attachment, and
//! the CPU reference refine step used by [`CpuGraphicsDevice`](crate::gpu_api::CpuGraphicsDevice)
//! backends and by `IndirectDebug::force_cpu_indirect_build`-adjacent tests.

use crate::camera::Camera;
use crate::layout::SceneCommand;

/// A mip chain of depth minima (reverse-Z) or maxima (normal-Z), built once
/// per frame from the pass's depth attachment.
pub struct HiZPyramid {
    mips: Vec<Vec<f32>>,
    dims: Vec<(u32, u32)>,
    reversed_z: bool,
}

impl HiZPyramid {
    /// Builds the full mip chain from a `width * height` row-major depth
    /// buffer (mip 0), down to a 1x1 top mip.
    pub fn build(depth: &[f32], width: u32, height: u32, reversed_z: bool) -> Self {
        assert_eq!(depth.len(), (width * height) as usize);
        let mut mips = vec![depth.to_vec()];
        let mut dims = vec![(width, height)];
        let (mut w, mut h) = (width, height);

        while w > 1 || h > 1 {
            let nw = (w / 2).max(1);
            let nh = (h / 2).max(1);
            let prev = mips.last().unwrap();
            let (pw, ph) = *dims.last().unwrap();
            let mut next = vec![0f32; (nw * nh) as usize];
            for y in 0..nh {
                for x in 0..nw {
                    let x0 = (x * 2).min(pw - 1);
                    let x1 = (x * 2 + 1).min(pw - 1);
                    let y0 = (y * 2).min(ph - 1);
                    let y1 = (y * 2 + 1).min(ph - 1);
                    let samples = [
                        prev[(y0 * pw + x0) as usize],
                        prev[(y0 * pw + x1) as usize],
                        prev[(y1 * pw + x0) as usize],
                        prev[(y1 * pw + x1) as usize],
                    ];
                    next[(y * nw + x) as usize] = if reversed_z {
                        samples.iter().copied().fold(f32::INFINITY, f32::min)
                    } else {
                        samples.iter().copied().fold(f32::NEG_INFINITY, f32::max)
                    };
                }
            }
            mips.push(next);
            dims.push((nw, nh));
            w = nw;
            h = nh;
        }

        Self { mips, dims, reversed_z }
    }

    pub fn mip_count(&self) -> usize {
        self.mips.len()
    }

    pub fn dims(&self, mip: usize) -> (u32, u32) {
        self.dims[mip]
    }

    pub fn sample(&self, mip: usize, x: u32, y: u32) -> f32 {
        let (w, h) = self.dims[mip];
        let xi = x.min(w.saturating_sub(1));
        let yi = y.min(h.saturating_sub(1));
        self.mips[mip][(yi * w + xi) as usize]
    }

    /// Smallest mip whose texel footprint (in mip-0 pixels) bounds
    /// `footprint_px`.
    pub fn select_mip(&self, footprint_px: f32) -> usize {
        let mut mip = 0usize;
        let mut texel_size = 1.0f32;
        while mip + 1 < self.mips.len() && texel_size < footprint_px {
            mip += 1;
            texel_size *= 2.0;
        }
        mip
    }

    /// True if `candidate_depth` is behind the occluder depth stored at
    /// `(mip, x, y)` — i.e. the candidate is fully occluded at this texel.
    pub fn occludes(&self, mip: usize, x: u32, y: u32, candidate_depth: f32) -> bool {
        let occluder = self.sample(mip, x, y);
        if self.reversed_z {
            candidate_depth < occluder
        } else {
            candidate_depth > occluder
        }
    }
}

/// Projects a world-space point through the camera's view-projection
/// matrix, returning `(screen_x, screen_y, depth, clip_w)` in mip-0 pixel
/// space, or `None` if the point is behind the camera (`clip_w <= 0`).
pub fn project_to_screen(
    camera: &Camera,
    width: u32,
    height: u32,
    world_pos: glam::Vec3,
) -> Option<(f32, f32, f32, f32)> {
    let clip = camera.view_proj() * world_pos.extend(1.0);
    if clip.w <= 1e-5 {
        return None;
    }
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    let ndc_z = clip.z / clip.w;
    let screen_x = (ndc_x * 0.5 + 0.5) * width as f32;
    let screen_y = (1.0 - (ndc_y * 0.5 + 0.5)) * height as f32;
    Some((screen_x, screen_y, ndc_z, clip.w))
}

/// Refines `candidates` (indices into `commands`) against the Hi-Z pyramid,
/// returning `(survivors, accepted_count)`. `candidates` is the compacted
/// index list coming out of `Cull`.
pub fn refine(
    pyramid: &HiZPyramid,
    camera: &Camera,
    width: u32,
    height: u32,
    commands: &[SceneCommand],
    candidates: &[u32],
) -> Vec<u32> {
    let fovy_scale = camera.projection_matrix.y_axis.y;
    let mut survivors = Vec::with_capacity(candidates.len());

    for &idx in candidates {
        let cmd = &commands[idx as usize];
        let sphere = cmd.bounding_sphere;
        let center = glam::Vec3::new(sphere[0], sphere[1], sphere[2]);
        let radius = sphere[3];

        let Some((sx, sy, depth, clip_w)) = project_to_screen(camera, width, height, center) else {
            survivors.push(idx);
            continue;
        };

        let footprint_px = (radius * fovy_scale.abs() / clip_w.max(1e-4)) * (height as f32 * 0.5);
        let mip = pyramid.select_mip(footprint_px.max(1.0));
        let (mw, mh) = pyramid.dims(mip);
        let shift = (width / mw.max(1)).max(1);
        let mx = ((sx as u32) / shift).min(mw.saturating_sub(1));
        let my = ((sy as u32) / shift).min(mh.saturating_sub(1));

        if !pyramid.occludes(mip, mx, my, depth) {
            survivors.push(idx);
        }
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_reduces_to_single_top_mip() {
        let depth = vec![0.5f32; 16]; // 4x4
        let pyramid = HiZPyramid::build(&depth, 4, 4, false);
        assert_eq!(pyramid.mip_count(), 3); // 4x4 -> 2x2 -> 1x1
        assert_eq!(pyramid.dims(2), (1, 1));
        assert_eq!(pyramid.sample(2, 0, 0), 0.5);
    }

    #[test]
    fn max_reduction_picks_farthest_for_normal_z() {
        let depth = vec![0.1, 0.9, 0.2, 0.3]; // 2x2
        let pyramid = HiZPyramid::build(&depth, 2, 2, false);
        assert_eq!(pyramid.sample(1, 0, 0), 0.9);
    }

    #[test]
    fn min_reduction_picks_nearest_for_reverse_z() {
        let depth = vec![0.1, 0.9, 0.2, 0.3]; // 2x2
        let pyramid = HiZPyramid::build(&depth, 2, 2, true);
        assert_eq!(pyramid.sample(1, 0, 0), 0.1);
    }

    #[test]
    fn select_mip_grows_with_footprint() {
        let depth = vec![0.5f32; 64 * 64];
        let pyramid = HiZPyramid::build(&depth, 64, 64, false);
        assert_eq!(pyramid.select_mip(1.0), 0);
        assert!(pyramid.select_mip(40.0) > 0);
    }
}
