//! GPU-driven indirect rendering core.
//!
//! Owns the scene command store, the bindless mesh atlas, per-pass compute
//! culling/occlusion/batching, and `MultiDrawIndirectCount` submission for a
//! realtime 3D engine. Every stage above the [`gpu_api::GraphicsDevice`]
//! boundary is backend-agnostic: it runs identically against a real
//! `wgpu::Device` or against the in-memory [`gpu_api::CpuGraphicsDevice`]
//! used by this crate's own test suite and by the `IndirectDebug`
//! CPU-fallback toggles.
//!
//! Start at [`context::GpuRenderContext`].

pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod gpu_api;
pub mod layout;
pub mod mesh_atlas;
pub mod occlusion;
pub mod render_pass;
pub mod scene;
pub mod shaders;
pub mod view_set;
