//! The camera record handed in once per frame from the pipeline-graph
//! collaborator (spec §6). Plain data; this crate never derives a camera
//! from a transform component, only consumes one already built.

use glam::Mat4;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub world_matrix: Mat4,
    pub projection_matrix: Mat4,
    /// Six frustum planes in `ax + by + cz + d >= 0` (inside) form, in the
    /// order left/right/bottom/top/near/far.
    pub frustum_planes: [[f32; 4]; 6],
    pub near: f32,
    pub far: f32,
    pub is_reversed_depth: bool,
}

impl Camera {
    pub fn position(&self) -> glam::Vec3 {
        self.world_matrix.to_scale_rotation_translation().2
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix.inverse()
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix()
    }

    /// True if the sphere `(center, radius)` is entirely outside any one of
    /// the six frustum planes (and therefore invisible).
    pub fn sphere_outside_frustum(&self, center: [f32; 3], radius: f32) -> bool {
        self.frustum_planes.iter().any(|p| {
            let dist = p[0] * center[0] + p[1] * center[1] + p[2] * center[2] + p[3];
            dist < -radius
        })
    }
}
