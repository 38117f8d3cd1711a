//! Crate entry point: the embedder-facing handle that owns settings, the
//! scene store, the mesh atlas, named render passes, and (when enabled) the
//! once-per-frame shared Hi-Z pyramid. Deliberately the only place any of
//! this lives — spec §9's anti-global-state note rules out statics, so an
//! embedder running multiple independent renderers (e.g. split-screen, or a
//! test harness) gets one `GpuRenderContext` per renderer.

use hashbrown::HashMap;

use crate::camera::Camera;
use crate::config::{GpuOcclusionMode, IndirectDebug, RenderingSettings};
use crate::error::{LayoutError, RenderPassError};
use crate::gpu_api::GraphicsDevice;
use crate::mesh_atlas::MeshGeometry;
use crate::occlusion::{HiZPyramid, OcclusionInput};
use crate::render_pass::{FramePassResult, RenderPass};
use crate::scene::{MeshRef, RenderableMeshCommand, SceneStore};
use crate::view_set::ViewSet;

/// Depth source for one frame's Hi-Z builds, supplied by the embedder (the
/// compute/graphics backend owns the actual depth attachment).
#[derive(Debug, Clone, Copy)]
pub struct FrameDepthSource<'a> {
    pub depth: &'a [f32],
    pub width: u32,
    pub height: u32,
}

/// Owns every piece of mutable state this crate needs across a frame:
/// settings, debug toggles, the scene, named render passes, and views.
/// `force_passthrough_culling` is a first-class toggle (not one of
/// `IndirectDebug`'s enumerated fields) because it changes the *meaning* of
/// a frame rather than adding an inspection hook: it disables both culling
/// and occlusion for every pass, the same override path a "debug camera
/// frozen, render everything" tool would need.
pub struct GpuRenderContext {
    pub settings: RenderingSettings,
    pub debug: IndirectDebug,
    pub force_passthrough_culling: bool,

    scene: SceneStore,
    passes: HashMap<u32, RenderPass>,
    views: ViewSet,
    shared_hiz: Option<HiZPyramid>,
    shared_hiz_frame: u64,
    frame_counter: u64,
}

impl GpuRenderContext {
    /// Verifies every GPU-shared record's byte layout before constructing
    /// anything else, per spec §3's fail-fast-at-startup requirement.
    pub fn new(settings: RenderingSettings) -> Result<Self, LayoutError> {
        crate::layout::LayoutRegistry::verify()?;
        Ok(Self {
            settings,
            debug: IndirectDebug::default(),
            force_passthrough_culling: false,
            scene: SceneStore::new(),
            passes: HashMap::new(),
            views: ViewSet::new(),
            shared_hiz: None,
            shared_hiz_frame: 0,
            frame_counter: 0,
        })
    }

    pub fn scene(&self) -> &SceneStore {
        &self.scene
    }

    pub fn views_mut(&mut self) -> &mut ViewSet {
        &mut self.views
    }

    pub fn views(&self) -> &ViewSet {
        &self.views
    }

    pub fn register_mesh(
        &self,
        mesh: MeshRef,
        geometry: &MeshGeometry<'_>,
        local_bounding_sphere: [f32; 4],
    ) -> Result<u32, crate::error::SceneStoreError> {
        self.scene.register_mesh(mesh, geometry, local_bounding_sphere)
    }

    pub fn add_renderable(
        &self,
        renderable: u64,
        submeshes: &[RenderableMeshCommand],
    ) -> Result<Vec<u32>, crate::error::SceneStoreError> {
        self.scene.add(renderable, submeshes)
    }

    pub fn remove_renderable(&self, renderable: u64) {
        self.scene.remove(renderable);
    }

    pub fn update_renderable(
        &self,
        renderable: u64,
        submeshes: &[RenderableMeshCommand],
    ) -> Result<Vec<u32>, crate::error::SceneStoreError> {
        self.scene.update(renderable, submeshes)
    }

    /// Gets or creates the named render pass. Passes persist across frames;
    /// callers typically hold onto the `render_pass_id`s they use rather than
    /// re-deriving them every frame.
    pub fn pass_mut(&mut self, render_pass_id: u32, device: &mut impl GraphicsDevice) -> &mut RenderPass {
        let pass = self.passes.entry(render_pass_id).or_insert_with(|| RenderPass::new(render_pass_id));
        pass.pre_render_initialize(device);
        pass
    }

    pub fn dispose_pass(&mut self, render_pass_id: u32) {
        if let Some(mut pass) = self.passes.remove(&render_pass_id) {
            pass.dispose();
        }
    }

    /// Exchanges the scene store's `updating` buffer into `loaded`. Call once
    /// per frame after all `add_renderable`/`remove_renderable` calls for
    /// that frame have landed, before any `run_pass`.
    pub fn swap_scene(&mut self) {
        self.scene.swap();
        self.frame_counter += 1;
    }

    /// Runs one render pass's frame pipeline. `is_shadow_pass` and
    /// `material_allows_aggregation` are per-call because they vary by pass
    /// and by material table, not by context.
    #[allow(clippy::too_many_arguments)]
    pub fn run_pass(
        &mut self,
        render_pass_id: u32,
        device: &mut impl GraphicsDevice,
        camera: &Camera,
        is_shadow_pass: bool,
        layer_mask: u32,
        depth: Option<FrameDepthSource<'_>>,
        cpu_query_results: Option<&HashMap<u32, u32>>,
        material_allows_aggregation: impl Fn(u32) -> bool,
    ) -> Result<FramePassResult, RenderPassError> {
        self.scene.rebuild_atlas_if_dirty(device);

        let occlusion_input = match (self.settings.gpu_occlusion_mode, depth, cpu_query_results) {
            (GpuOcclusionMode::GpuHiZ, Some(d), _) => {
                if self.settings.cache_gpu_hiz_once_per_frame {
                    self.refresh_shared_hiz(d, camera.is_reversed_depth);
                } else {
                    self.shared_hiz = Some(HiZPyramid::build(d.depth, d.width, d.height, camera.is_reversed_depth));
                }
                Some(OcclusionInput::HiZ { depth: d.depth, width: d.width, height: d.height })
            }
            (GpuOcclusionMode::CpuQueryAsync, _, Some(results)) => Some(OcclusionInput::CpuQuery { results }),
            _ => None,
        };

        let pass = self.passes.entry(render_pass_id).or_insert_with(|| RenderPass::new(render_pass_id));
        pass.pre_render_initialize(device);
        pass.ensure_atlas_synced(&self.scene, device);
        pass.run_frame(
            device,
            &self.scene,
            camera,
            &self.settings,
            &self.debug,
            self.force_passthrough_culling,
            is_shadow_pass,
            layer_mask,
            occlusion_input,
            material_allows_aggregation,
        )
    }

    /// Rebuilds the shared Hi-Z pyramid at most once per frame, memoized by
    /// `frame_counter` so multiple passes in the same frame reuse it instead
    /// of each re-reducing the depth buffer.
    fn refresh_shared_hiz(&mut self, depth: FrameDepthSource<'_>, reversed_z: bool) {
        if self.shared_hiz.is_some() && self.shared_hiz_frame == self.frame_counter {
            return;
        }
        self.shared_hiz = Some(HiZPyramid::build(depth.depth, depth.width, depth.height, reversed_z));
        self.shared_hiz_frame = self.frame_counter;
    }
}
