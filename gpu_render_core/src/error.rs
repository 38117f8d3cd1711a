//! Error taxonomy for the GPU-driven rendering core.
//!
//! One `thiserror` enum per fallible boundary, matching `AnalysisError` in
//! the rest of this codebase: a derive, one `#[error("...")]` variant per
//! failure mode, nothing more.

/// Fatal at process start: a GPU-shared record does not have the byte size
/// the compute shaders assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{name} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failures from [`crate::mesh_atlas::MeshAtlas::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MeshAtlasError {
    #[error("mesh is already resident in the atlas")]
    AlreadyResident,
    #[error("mesh has no vertices")]
    EmptyVertices,
    #[error("mesh has no indices")]
    NoIndices,
    #[error("mesh topology is not a triangle list")]
    UnsupportedTopology,
    #[error("index count {0} is not a multiple of three, truncating")]
    IndexCountNotMultipleOfThree(u32),
}

/// Failures from [`crate::scene::SceneStore`] operations. These are cached
/// per-mesh so repeated `add` calls for the same offending mesh are silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SceneStoreError {
    #[error("mesh is marked unsupported: {0}")]
    MeshUnsupported(MeshAtlasError),
    #[error("material id was not found")]
    MaterialMissing,
    #[error("scene command capacity overflow (u32::MAX reached)")]
    CapacityOverflow,
    #[error("atlas registration failed, mesh marked unsupported")]
    AtlasRegistrationFailed,
}

/// Failures from [`crate::render_pass::RenderPass::run_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RenderPassError {
    #[error("render pass was not initialized before run_frame")]
    NotInitialized,
}
