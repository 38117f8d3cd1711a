use std::f32::consts::FRAC_PI_2;

use super::*;
use crate::gpu_api::CpuGraphicsDevice;
use crate::mesh_atlas::{MeshGeometry, Topology};
use crate::scene::{build_scene_command, MaterialRef, MeshRef, RenderableMeshCommand};

fn camera_accepting_everything() -> Camera {
    Camera {
        world_matrix: glam::Mat4::IDENTITY,
        projection_matrix: glam::Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0),
        frustum_planes: [[0.0, 0.0, 0.0, f32::INFINITY]; 6],
        near: 0.1,
        far: 100.0,
        is_reversed_depth: false,
    }
}

fn triangle_geometry() -> MeshGeometry<'static> {
    MeshGeometry {
        positions: &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: &[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
        tangents: &[[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
        uv0: &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        indices: &[0, 1, 2],
        topology: Topology::TriangleList,
    }
}

fn scene_with_one_triangle(render_pass: u32) -> SceneStore {
    let scene = SceneStore::new();
    scene
        .register_mesh(MeshRef(1), &triangle_geometry(), [0.0, 0.0, 0.0, 1.0])
        .expect("register_mesh");
    let cmd = RenderableMeshCommand {
        mesh: MeshRef(1),
        material_override: Some(MaterialRef(10)),
        world_matrix: glam::Mat4::IDENTITY,
        world_matrix_is_model: true,
        instances: 1,
        render_pass,
        render_distance: 0.0,
        layer: 0,
        casts_shadow: true,
        receives_shadows: true,
        gpu_command_index: 0,
    };
    scene.add(1, &[cmd]).expect("add");
    scene.swap();
    let mut device = CpuGraphicsDevice::new();
    scene.rebuild_atlas_if_dirty(&mut device);
    scene
}

#[test]
fn single_triangle_single_pass_produces_one_draw() {
    let scene = scene_with_one_triangle(0);
    let mut pass = RenderPass::new(0);
    let mut device = CpuGraphicsDevice::new();
    pass.pre_render_initialize(&mut device);
    pass.ensure_atlas_synced(&scene, &mut device);

    let camera = camera_accepting_everything();
    let settings = RenderingSettings::default();
    let debug = IndirectDebug::default();

    let result = pass
        .run_frame(&mut device, &scene, &camera, &settings, &debug, false, false, 0, None, |_| false)
        .expect("run_frame");

    assert_eq!(result.draw_count, 1);
    assert_eq!(result.stats.input_count, 1);
    assert_eq!(result.stats.drawn_count, 1);
    assert!(result.draw_call.is_some());
}

#[test]
fn run_frame_before_initialize_is_rejected() {
    let scene = scene_with_one_triangle(0);
    let mut pass = RenderPass::new(0);
    let mut device = CpuGraphicsDevice::new();
    let camera = camera_accepting_everything();
    let settings = RenderingSettings::default();
    let debug = IndirectDebug::default();

    let result = pass.run_frame(&mut device, &scene, &camera, &settings, &debug, false, false, 0, None, |_| false);
    assert!(matches!(result, Err(crate::error::RenderPassError::NotInitialized)));
}

#[test]
fn commands_in_a_different_pass_are_not_drawn() {
    let scene = scene_with_one_triangle(1);
    let mut pass = RenderPass::new(0);
    let mut device = CpuGraphicsDevice::new();
    pass.pre_render_initialize(&mut device);
    pass.ensure_atlas_synced(&scene, &mut device);

    let camera = camera_accepting_everything();
    let settings = RenderingSettings::default();
    let debug = IndirectDebug::default();

    let result = pass
        .run_frame(&mut device, &scene, &camera, &settings, &debug, false, false, 0, None, |_| false)
        .expect("run_frame");

    assert_eq!(result.draw_count, 0);
}

#[test]
fn shadow_pass_disables_occlusion_even_when_configured() {
    let scene = scene_with_one_triangle(0);
    let mut pass = RenderPass::new(0);
    let mut device = CpuGraphicsDevice::new();
    pass.pre_render_initialize(&mut device);
    pass.ensure_atlas_synced(&scene, &mut device);

    let camera = camera_accepting_everything();
    let mut settings = RenderingSettings::default();
    settings.gpu_occlusion_mode = crate::config::GpuOcclusionMode::GpuHiZ;
    let debug = IndirectDebug::default();

    // No occlusion input supplied, and is_shadow_pass=true forces Disabled,
    // so this must not hit the "mode selected without matching input" branch.
    let result = pass
        .run_frame(&mut device, &scene, &camera, &settings, &debug, false, true, 0, None, |_| false)
        .expect("run_frame");

    assert_eq!(result.draw_count, 1);
}

#[test]
fn build_scene_command_round_trips_through_run_frame() {
    let local = [0.0, 0.0, 0.0, 1.0];
    let cmd = RenderableMeshCommand {
        mesh: MeshRef(1),
        material_override: Some(MaterialRef(10)),
        world_matrix: glam::Mat4::IDENTITY,
        world_matrix_is_model: true,
        instances: 1,
        render_pass: 0,
        render_distance: 0.0,
        layer: 0,
        casts_shadow: true,
        receives_shadows: true,
        gpu_command_index: 0,
    };
    let scene_cmd = build_scene_command(&cmd, 1, 10, 0, 0, glam::Mat4::IDENTITY, local);
    assert_eq!(scene_cmd.mesh_id, 1);
    assert_eq!(scene_cmd.material_id, 10);
}
