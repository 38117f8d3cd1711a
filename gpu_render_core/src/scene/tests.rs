use super::*;
use crate::mesh_atlas::Topology;

fn triangle_geometry() -> ([[f32; 3]; 3], [[f32; 3]; 3], [[f32; 4]; 3], [[f32; 2]; 3], [u32; 3]) {
    (
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        [[0.0, 0.0, 1.0]; 3],
        [[1.0, 0.0, 0.0, 1.0]; 3],
        [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        [0, 1, 2],
    )
}

fn renderable(mesh: MeshRef, material: MaterialRef, render_pass: u32) -> RenderableMeshCommand {
    RenderableMeshCommand {
        mesh,
        material_override: Some(material),
        world_matrix: glam::Mat4::IDENTITY,
        world_matrix_is_model: false,
        instances: 1,
        render_pass,
        render_distance: 10.0,
        layer: 0,
        casts_shadow: true,
        receives_shadows: true,
        gpu_command_index: 0,
    }
}

#[test]
fn round_trip_preserves_fields_and_reserved1() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    let cmd = renderable(MeshRef(1), MaterialRef(10), 0);
    let indices = store.add(1, &[cmd]).unwrap();
    store.swap();

    store.with_loaded(|commands| {
        let c = commands[indices[0] as usize];
        assert_eq!(c.material_id, 1);
        assert_eq!(c.render_pass, 0);
        assert_eq!(c.instance_count, 1);
        assert_eq!(c.reserved1, indices[0]);
    });
}

#[test]
fn swap_remove_invariant_holds_after_remove() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    store.add(1, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(2, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(3, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.swap();
    assert_eq!(store.total_command_count(), 3);

    store.remove(2);
    store.swap();
    assert_eq!(store.total_command_count(), 2);

    store.with_loaded(|commands| {
        for (idx, c) in commands.iter().enumerate() {
            assert_eq!(c.reserved1, idx as u32);
        }
    });
}

#[test]
fn atlas_refcount_tracks_live_commands() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    let mesh_id = store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    store.add(1, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(2, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    assert_eq!(store.mesh_refcount(mesh_id), 2);
    assert!(store.is_mesh_resident(mesh_id));

    store.remove(1);
    assert_eq!(store.mesh_refcount(mesh_id), 1);
    assert!(store.is_mesh_resident(mesh_id));

    store.remove(2);
    assert_eq!(store.mesh_refcount(mesh_id), 0);
    assert!(!store.is_mesh_resident(mesh_id));
}

#[test]
fn scenario_s5_add_swap_render_remove() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    store.add(1, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(2, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(3, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.swap();
    assert_eq!(store.total_command_count(), 3);

    store.remove(2);
    store.swap();
    assert_eq!(store.total_command_count(), 2);

    // Renderable 3 formerly at index 2 should now be at index 1.
    let slots = store.inner.lock().renderable_slots.get(&3).cloned().unwrap();
    assert_eq!(slots, vec![1]);
    store.with_loaded(|commands| {
        assert_eq!(commands[1].reserved1, 1);
    });
}

#[test]
fn material_missing_is_rejected() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    let mut cmd = renderable(MeshRef(1), MaterialRef(10), 0);
    cmd.material_override = None;
    assert_eq!(store.add(1, &[cmd]).unwrap_err(), SceneStoreError::MaterialMissing);
}

#[test]
fn unregistered_mesh_refuses_atlas_registration() {
    let store = SceneStore::new();
    let cmd = renderable(MeshRef(99), MaterialRef(10), 0);
    assert_eq!(store.add(1, &[cmd]).unwrap_err(), SceneStoreError::AtlasRegistrationFailed);
}

#[test]
fn update_preserves_slot_and_carries_prev_world() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    let first = glam::Mat4::from_translation(glam::Vec3::new(1.0, 0.0, 0.0));
    let mut cmd = renderable(MeshRef(1), MaterialRef(10), 0);
    cmd.world_matrix = first;
    let slots = store.add(1, &[cmd]).unwrap();
    store.swap();

    let second = glam::Mat4::from_translation(glam::Vec3::new(2.0, 0.0, 0.0));
    let mut updated_cmd = renderable(MeshRef(1), MaterialRef(10), 0);
    updated_cmd.world_matrix = second;
    let updated_slots = store.update(1, &[updated_cmd]).unwrap();
    assert_eq!(updated_slots, slots);
    store.swap();

    store.with_loaded(|commands| {
        let c = commands[slots[0] as usize];
        assert_eq!(c.world_matrix, second.to_cols_array());
        assert_eq!(c.prev_world_matrix, first.to_cols_array());
        assert_eq!(c.reserved1, slots[0]);
    });
}

#[test]
fn update_with_mismatched_submesh_count_falls_back_to_remove_and_add() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    store.add(1, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.add(2, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    store.swap();
    assert_eq!(store.total_command_count(), 2);

    let two_submeshes = [renderable(MeshRef(1), MaterialRef(10), 0), renderable(MeshRef(1), MaterialRef(10), 0)];
    store.update(1, &two_submeshes).unwrap();
    store.swap();
    assert_eq!(store.total_command_count(), 3);
}

#[test]
fn update_changing_mesh_adjusts_refcounts() {
    let store = SceneStore::new();
    let (p, n, t, u, i) = triangle_geometry();
    let geom = MeshGeometry { positions: &p, normals: &n, tangents: &t, uv0: &u, indices: &i, topology: Topology::TriangleList };
    let mesh_a = store.register_mesh(MeshRef(1), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();
    let mesh_b = store.register_mesh(MeshRef(2), &geom, [0.0, 0.0, 0.0, 1.0]).unwrap();

    store.add(1, &[renderable(MeshRef(1), MaterialRef(10), 0)]).unwrap();
    assert_eq!(store.mesh_refcount(mesh_a), 1);
    assert_eq!(store.mesh_refcount(mesh_b), 0);

    store.update(1, &[renderable(MeshRef(2), MaterialRef(10), 0)]).unwrap();
    assert_eq!(store.mesh_refcount(mesh_a), 0);
    assert_eq!(store.mesh_refcount(mesh_b), 1);
    assert!(!store.is_mesh_resident(mesh_a));
}
