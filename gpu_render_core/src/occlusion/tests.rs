use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat4, Vec3};

use super::hiz::{self, project_to_screen, HiZPyramid};
use super::*;
use crate::layout::SceneCommand;

fn forward_z_camera() -> Camera {
    Camera {
        world_matrix: Mat4::from_rotation_y(PI),
        projection_matrix: Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0),
        frustum_planes: [[0.0, 0.0, 0.0, 1.0]; 6], // accepts everything
        near: 0.1,
        far: 100.0,
        is_reversed_depth: false,
    }
}

fn command_with_sphere(sphere: [f32; 4], reserved1: u32) -> SceneCommand {
    let mut c = SceneCommand::default();
    c.bounding_sphere = sphere;
    c.reserved1 = reserved1;
    c
}

#[test]
fn scenario_s6_near_sphere_occludes_far_sphere() {
    let camera = forward_z_camera();
    let width = 64u32;
    let height = 64u32;

    let near = command_with_sphere([0.0, 0.0, 20.0, 5.0], 0);
    let far = command_with_sphere([0.0, 0.0, 40.0, 5.0], 1);
    let commands = vec![near, far];
    let candidates = vec![0u32, 1];

    let (_, _, near_depth, _) = project_to_screen(&camera, width, height, Vec3::new(0.0, 0.0, 20.0)).unwrap();
    let (_, _, far_depth, _) = project_to_screen(&camera, width, height, Vec3::new(0.0, 0.0, 40.0)).unwrap();
    assert!(far_depth > near_depth, "farther sphere must report a larger normal-Z depth");

    // A screen-filling occluder at the near sphere's depth.
    let depth = vec![near_depth; (width * height) as usize];
    let pyramid = HiZPyramid::build(&depth, width, height, false);

    let survivors = hiz::refine(&pyramid, &camera, width, height, &commands, &candidates);
    assert_eq!(survivors, vec![0]);
}

#[test]
fn effective_mode_disables_for_shadow_pass() {
    let mode = OcclusionEngine::effective_mode(GpuOcclusionMode::GpuHiZ, true, false);
    assert_eq!(mode, GpuOcclusionMode::Disabled);
}

#[test]
fn effective_mode_disables_when_passthrough_forced() {
    let mode = OcclusionEngine::effective_mode(GpuOcclusionMode::CpuQueryAsync, false, true);
    assert_eq!(mode, GpuOcclusionMode::Disabled);
}

#[test]
fn effective_mode_passes_through_configured_mode_otherwise() {
    let mode = OcclusionEngine::effective_mode(GpuOcclusionMode::GpuHiZ, false, false);
    assert_eq!(mode, GpuOcclusionMode::GpuHiZ);
}

#[test]
fn disabled_mode_is_passthrough() {
    let mut engine = OcclusionEngine::new();
    let camera = forward_z_camera();
    let commands = vec![command_with_sphere([0.0, 0.0, 20.0, 5.0], 0)];
    let (survivors, stats) = engine.apply(GpuOcclusionMode::Disabled, &camera, &commands, &[0], None);
    assert_eq!(survivors, vec![0]);
    assert_eq!(stats.accepted, 1);
}
