//! # Device — The GPU Seam
//!
//! [`Renderer2D`](super::Renderer2D) never talks to a graphics API directly.
//! It drives a [`RenderDevice`], a deliberately narrow trait covering exactly
//! what a batch renderer does: create and fill buffers, create and bind
//! textures, set the camera, and draw.
//!
//! ```text
//! Renderer2D<D: RenderDevice>
//!   ├─ create_vertex_buffer / create_index_buffer   (once, at startup)
//!   ├─ create_texture / release_texture             (white texture, assets)
//!   ├─ set_view_projection                          (begin_scene)
//!   ├─ write_buffer + bind_texture + draw_*         (every flush)
//!   └─ release_buffer                               (dispose)
//! ```
//!
//! Handles are plain integers. A device owns the resources behind them and
//! must reject a handle after it has been released.

use crate::math::Mat4;

/// Opaque id of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque id of a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// The primitive kinds the 2D renderer batches separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Quad,
    Circle,
    Line,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Quad => "quad",
            PrimitiveKind::Circle => "circle",
            PrimitiveKind::Line => "line",
        }
    }

    /// Vertices emitted per primitive.
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            PrimitiveKind::Quad | PrimitiveKind::Circle => 4,
            PrimitiveKind::Line => 2,
        }
    }

    /// Indices drawn per primitive (lines are drawn unindexed).
    pub fn indices_per_primitive(self) -> usize {
        match self {
            PrimitiveKind::Quad | PrimitiveKind::Circle => 6,
            PrimitiveKind::Line => 0,
        }
    }
}

/// Everything the batch renderer needs from a graphics backend.
///
/// Implementations may panic on contract violations (unknown or released
/// handles, out-of-range writes); those are renderer bugs, not runtime
/// conditions.
pub trait RenderDevice {
    /// Number of texture units a single draw can sample from.
    fn max_texture_units(&self) -> u32;

    /// A vertex buffer of `size` bytes for primitives of `kind`.
    fn create_vertex_buffer(&mut self, kind: PrimitiveKind, size: u64) -> BufferHandle;

    /// An immutable index buffer holding `indices`.
    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle;

    /// Overwrite the start of `buffer` with `data`.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]);

    fn release_buffer(&mut self, buffer: BufferHandle);

    /// A `width` × `height` RGBA8 texture. `rgba.len()` is `width * height * 4`.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle;

    fn release_texture(&mut self, texture: TextureHandle);

    /// Make `texture` visible to shaders on `unit`.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn set_view_projection(&mut self, view_proj: Mat4);

    /// Draw `index_count` indices of triangles from `vertices` with the
    /// pipeline for `kind`.
    fn draw_indexed(
        &mut self,
        kind: PrimitiveKind,
        vertices: BufferHandle,
        indices: BufferHandle,
        index_count: u32,
    );

    /// Draw `vertex_count` vertices from `vertices` as a line list.
    fn draw_lines(&mut self, vertices: BufferHandle, vertex_count: u32, width: f32);
}
