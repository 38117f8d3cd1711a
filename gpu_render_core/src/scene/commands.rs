//! The scene-graph collaborator's input record and its conversion into a
//! GPU-shared [`SceneCommand`].

use glam::{Mat4, Vec3};

use crate::layout::SceneCommand;

/// Opaque external handle to a mesh already registered with
/// [`super::SceneStore::register_mesh`]. The scene graph owns the identity;
/// this crate only ever sees the bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshRef(pub u64);

/// Opaque external handle to a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialRef(pub u64);

bitflags::bitflags! {
    /// Flags carried on [`SceneCommand.flags`], set from the corresponding
    /// `RenderableMeshCommand` fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        const CASTS_SHADOW = 1 << 0;
        const RECEIVES_SHADOWS = 1 << 1;
        const WORLD_MATRIX_IS_MODEL = 1 << 2;
    }
}

/// One renderable submesh, as produced by the scene graph and component
/// system collaborator.
#[derive(Debug, Clone, Copy)]
pub struct RenderableMeshCommand {
    pub mesh: MeshRef,
    pub material_override: Option<MaterialRef>,
    pub world_matrix: Mat4,
    pub world_matrix_is_model: bool,
    pub instances: u32,
    pub render_pass: u32,
    pub render_distance: f32,
    pub layer: u8,
    pub casts_shadow: bool,
    pub receives_shadows: bool,
    pub gpu_command_index: u32,
}

/// Builds a GPU-shared `SceneCommand` from a resolved submesh. `prev_world`
/// is the previous frame's world matrix (zero on first insertion), and
/// `local_bounding_sphere` is the mesh's object-space bounding sphere as
/// recorded at `register_mesh` time.
pub fn build_scene_command(
    cmd: &RenderableMeshCommand,
    mesh_id: u32,
    material_id: u32,
    submesh_id: u32,
    shader_program_id: u32,
    prev_world: Mat4,
    local_bounding_sphere: [f32; 4],
) -> SceneCommand {
    let mut flags = CommandFlags::empty();
    if cmd.casts_shadow {
        flags |= CommandFlags::CASTS_SHADOW;
    }
    if cmd.receives_shadows {
        flags |= CommandFlags::RECEIVES_SHADOWS;
    }
    if cmd.world_matrix_is_model {
        flags |= CommandFlags::WORLD_MATRIX_IS_MODEL;
    }

    SceneCommand {
        mesh_id,
        submesh_id,
        material_id,
        render_pass: cmd.render_pass,
        instance_count: cmd.instances.max(1),
        layer_mask: 1u32 << (cmd.layer as u32 % 32),
        render_distance: cmd.render_distance,
        world_matrix: cmd.world_matrix.to_cols_array(),
        prev_world_matrix: prev_world.to_cols_array(),
        flags: flags.bits(),
        lod: 0,
        shader_program_id,
        bounding_sphere: transform_bounding_sphere(cmd.world_matrix, local_bounding_sphere),
        reserved0: 0,
        reserved1: 0,
    }
}

/// Transforms a local-space bounding sphere by the world matrix's
/// translation and max-axis scale, per spec §4.3.
pub fn transform_bounding_sphere(world: Mat4, local: [f32; 4]) -> [f32; 4] {
    let (scale, _, translation) = world.to_scale_rotation_translation();
    let max_scale = scale.x.abs().max(scale.y.abs()).max(scale.z.abs());
    let center = world.transform_point3(Vec3::new(local[0], local[1], local[2]));
    let _ = translation;
    [center.x, center.y, center.z, local[3] * max_scale]
}
