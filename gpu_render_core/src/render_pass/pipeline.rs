//! CPU reference implementations of the per-pass compute stages in spec
//! §4.4. Each function here mirrors one WGSL compute shader byte-for-byte
//! on its input/output layouts, per the compute-dispatch-boundary note in
//! §4.7: the real path runs the shader, the debug/test path runs this.

use crate::camera::Camera;
use crate::layout::{BatchRangeEntry, IndirectDraw, MeshDataEntry, SceneCommand, SortKeyRaw};

/// Result of the `Cull` stage.
#[derive(Debug, Clone)]
pub struct CullOutput {
    pub culled_indices: Vec<u32>,
    pub rejected_frustum: u32,
    pub rejected_distance: u32,
    pub overflow: bool,
}

/// Compacts `commands` to the subset visible to `camera` in `render_pass`,
/// respecting `layer_mask` (0 = accept all layers) and `capacity`. When
/// `force_passthrough` is set, every command in `render_pass` is emitted
/// verbatim in source order, truncated at `capacity` with `overflow` set if
/// it doesn't fit — no frustum or distance test runs.
pub fn cull(
    commands: &[SceneCommand],
    camera: &Camera,
    render_pass: u32,
    layer_mask: u32,
    capacity: usize,
    force_passthrough: bool,
) -> CullOutput {
    if force_passthrough {
        let indices: Vec<u32> = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.render_pass == render_pass)
            .map(|(i, _)| i as u32)
            .collect();
        let overflow = indices.len() > capacity;
        let culled_indices = if overflow { indices[..capacity].to_vec() } else { indices };
        return CullOutput { culled_indices, rejected_frustum: 0, rejected_distance: 0, overflow };
    }

    let camera_position = camera.position();
    let mut culled_indices = Vec::new();
    let mut rejected_frustum = 0u32;
    let mut rejected_distance = 0u32;
    let mut overflow = false;

    for (i, cmd) in commands.iter().enumerate() {
        if cmd.render_pass != render_pass {
            continue;
        }
        if layer_mask != 0 && cmd.layer_mask & layer_mask == 0 {
            continue;
        }

        let sphere = cmd.bounding_sphere;
        let center = [sphere[0], sphere[1], sphere[2]];
        let radius = sphere[3];

        if camera.sphere_outside_frustum(center, radius) {
            rejected_frustum += 1;
            continue;
        }

        if cmd.render_distance > 0.0 {
            let dx = center[0] - camera_position.x;
            let dy = center[1] - camera_position.y;
            let dz = center[2] - camera_position.z;
            let distance = (dx * dx + dy * dy + dz * dz).sqrt();
            if distance > cmd.render_distance {
                rejected_distance += 1;
                continue;
            }
        }

        if culled_indices.len() >= capacity {
            overflow = true;
            break;
        }
        culled_indices.push(i as u32);
    }

    CullOutput { culled_indices, rejected_frustum, rejected_distance, overflow }
}

/// Writes one sort key per surviving command, in the order it was compacted.
pub fn build_keys(commands: &[SceneCommand], surviving_indices: &[u32]) -> Vec<SortKeyRaw> {
    surviving_indices
        .iter()
        .map(|&idx| {
            let cmd = &commands[idx as usize];
            SortKeyRaw {
                pass_pipeline_state: (cmd.render_pass << 24) | (cmd.shader_program_id << 8),
                material_id: cmd.material_id,
                mesh_id: cmd.mesh_id,
                source_index: cmd.reserved1,
            }
        })
        .collect()
}

/// Stable-sorts keys by `(pass_pipeline_state, material_id)`, the CPU
/// reorder routine gated behind `enable_cpu_material_sort`. Callers must run
/// this strictly between `build_keys` and `build_batches` — see the Open
/// Question decision on reorder ownership.
pub fn sort_by_material(keys: &mut [SortKeyRaw]) {
    keys.sort_by_key(|k| (k.pass_pipeline_state, k.material_id));
}

/// Result of the `BuildBatches` stage.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub draws: Vec<IndirectDraw>,
    pub ranges: Vec<BatchRangeEntry>,
    pub instance_transforms: Vec<[f32; 16]>,
    pub instance_source_indices: Vec<u32>,
    pub overflow: bool,
    pub truncated: bool,
}

/// Emits one `BatchRangeEntry` per contiguous run of same-material keys and
/// one `IndirectDraw` per draw (or per aggregated instance group). Since
/// `SceneCommand.reserved1` always equals the command's own index in the
/// loaded buffer (the swap-remove invariant), `key.source_index` can be used
/// directly as the index into `commands`.
pub fn build_batches(
    commands: &[SceneCommand],
    mesh_data: impl Fn(u32) -> MeshDataEntry,
    keys: &[SortKeyRaw],
    capacity: usize,
    instancing_enabled: bool,
    material_allows_aggregation: impl Fn(u32) -> bool,
) -> BatchOutput {
    let mut out = BatchOutput::default();
    let mut current_material: Option<u32> = None;
    let mut range_start = 0u32;
    let mut i = 0usize;

    while i < keys.len() {
        if out.draws.len() >= capacity {
            out.overflow = true;
            out.truncated = true;
            break;
        }

        let key = &keys[i];
        if current_material != Some(key.material_id) {
            if let Some(material_id) = current_material {
                out.ranges.push(BatchRangeEntry {
                    draw_offset: range_start,
                    draw_count: out.draws.len() as u32 - range_start,
                    material_id,
                });
            }
            current_material = Some(key.material_id);
            range_start = out.draws.len() as u32;
        }

        let cmd = &commands[key.source_index as usize];
        let entry = mesh_data(key.mesh_id);
        let base_instance = out.instance_source_indices.len() as u32;
        let mut instance_count = cmd.instance_count.max(1);

        let mut j = i + 1;
        if instancing_enabled && material_allows_aggregation(key.material_id) {
            out.instance_transforms.push(cmd.world_matrix);
            out.instance_source_indices.push(key.source_index);
            while j < keys.len() && keys[j].material_id == key.material_id && keys[j].mesh_id == key.mesh_id {
                let other = &commands[keys[j].source_index as usize];
                out.instance_transforms.push(other.world_matrix);
                out.instance_source_indices.push(keys[j].source_index);
                instance_count += other.instance_count.max(1);
                j += 1;
            }
        }

        out.draws.push(IndirectDraw {
            index_count: entry.index_count,
            instance_count,
            first_index: entry.first_index,
            base_vertex: entry.first_vertex,
            base_instance,
        });

        i = j;
    }

    if let Some(material_id) = current_material {
        out.ranges.push(BatchRangeEntry {
            draw_offset: range_start,
            draw_count: out.draws.len() as u32 - range_start,
            material_id,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn passthrough_camera() -> Camera {
        Camera {
            world_matrix: glam::Mat4::IDENTITY,
            projection_matrix: glam::Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0),
            frustum_planes: [[0.0, 0.0, 0.0, f32::INFINITY]; 6],
            near: 0.1,
            far: 100.0,
            is_reversed_depth: false,
        }
    }

    fn command(material_id: u32, mesh_id: u32, reserved1: u32) -> SceneCommand {
        let mut c = SceneCommand::default();
        c.material_id = material_id;
        c.mesh_id = mesh_id;
        c.reserved1 = reserved1;
        c.instance_count = 1;
        c
    }

    #[test]
    fn cull_rejects_backface_sphere_outside_frustum() {
        let camera = Camera {
            world_matrix: glam::Mat4::IDENTITY,
            projection_matrix: glam::Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0),
            // A single "inside" plane requiring z >= 0, simulating a forward-only frustum.
            frustum_planes: [[0.0, 0.0, 1.0, 0.0]; 6],
            near: 0.1,
            far: 100.0,
            is_reversed_depth: false,
        };
        let mut cmd = command(1, 1, 0);
        cmd.bounding_sphere = [0.0, 0.0, -10.0, 1.0];
        let commands = vec![cmd];

        let out = cull(&commands, &camera, 0, 0, 64, false);
        assert!(out.culled_indices.is_empty());
        assert_eq!(out.rejected_frustum, 1);
    }

    #[test]
    fn batches_split_on_material_change() {
        let camera = passthrough_camera();
        let _ = camera;
        let commands = vec![command(1, 1, 0), command(2, 1, 1), command(1, 1, 2)];
        let keys = build_keys(&commands, &[0, 1, 2]);
        let out = build_batches(&commands, |_| MeshDataEntry { index_count: 3, first_index: 0, first_vertex: 0, base_instance: 0 }, &keys, 64, false, |_| false);

        assert_eq!(out.ranges.len(), 3);
        assert_eq!(out.draws.len(), 3);
        assert_eq!(out.ranges[0].material_id, 1);
        assert_eq!(out.ranges[1].material_id, 2);
        assert_eq!(out.ranges[2].material_id, 1);
    }

    #[test]
    fn cpu_material_sort_merges_same_material_batches() {
        let commands = vec![command(1, 1, 0), command(2, 1, 1), command(1, 1, 2)];
        let mut keys = build_keys(&commands, &[0, 1, 2]);
        sort_by_material(&mut keys);
        let out = build_batches(&commands, |_| MeshDataEntry { index_count: 3, first_index: 0, first_vertex: 0, base_instance: 0 }, &keys, 64, false, |_| false);

        assert_eq!(out.ranges.len(), 2);
        assert_eq!(out.ranges[0].material_id, 1);
        assert_eq!(out.ranges[0].draw_count, 2);
        assert_eq!(out.ranges[1].material_id, 2);
        assert_eq!(out.ranges[1].draw_count, 1);
    }

    #[test]
    fn instance_aggregation_collapses_consecutive_same_mesh_material() {
        let commands = vec![command(1, 1, 0), command(1, 1, 1)];
        let keys = build_keys(&commands, &[0, 1]);
        let out = build_batches(&commands, |_| MeshDataEntry { index_count: 3, first_index: 0, first_vertex: 0, base_instance: 0 }, &keys, 64, true, |_| true);

        assert_eq!(out.draws.len(), 1);
        assert_eq!(out.draws[0].instance_count, 2);
        assert_eq!(out.draws[0].base_instance, 0);
        assert_eq!(out.instance_transforms.len(), 2);
        assert_eq!(out.instance_source_indices, vec![0, 1]);
    }

    #[test]
    fn batch_ranges_are_contiguous_and_cover_all_draws() {
        let commands = vec![command(1, 1, 0), command(2, 1, 1), command(1, 1, 2), command(1, 1, 3)];
        let keys = build_keys(&commands, &[0, 1, 2, 3]);
        let out = build_batches(&commands, |_| MeshDataEntry { index_count: 3, first_index: 0, first_vertex: 0, base_instance: 0 }, &keys, 64, false, |_| false);

        let mut expected_offset = 0u32;
        for range in &out.ranges {
            assert_eq!(range.draw_offset, expected_offset);
            expected_offset += range.draw_count;
        }
        assert_eq!(expected_offset, out.draws.len() as u32);
    }

    #[test]
    fn build_batches_sets_overflow_and_truncates_at_capacity() {
        let commands: Vec<SceneCommand> = (0..12).map(|i| command(1, 1, i)).collect();
        let keys = build_keys(&commands, &(0..12).collect::<Vec<u32>>());
        let out = build_batches(&commands, |_| MeshDataEntry { index_count: 3, first_index: 0, first_vertex: 0, base_instance: 0 }, &keys, 8, false, |_| false);

        assert!(out.overflow);
        assert!(out.truncated);
        assert!(out.draws.len() <= 8);
    }
}
