//! # Vertex — Per-Corner Data Sent to the GPU
//!
//! Each primitive kind has its own vertex format. All positions are already in
//! world space (the model matrix is applied on the CPU), so the shaders only
//! multiply by the camera view-projection.
//!
//! ## Memory Layout
//!
//! `#[repr(C)]` plus bytemuck's `Pod` lets a `&[QuadVertex]` be uploaded as
//! `&[u8]` without copying.
//!
//! ```text
//! QuadVertex (48 bytes)
//! ┌────────────┬────────────┬──────────┬───────────┬────────┬───────────┐
//! │ position   │ color      │ tex_coord│ tex_index │ tiling │ entity_id │
//! │ [f32; 3]   │ [f32; 4]   │ [f32; 2] │ i32       │ f32    │ i32       │
//! │ offset 0   │ offset 12  │ offset 28│ offset 36 │ off 40 │ offset 44 │
//! └────────────┴────────────┴──────────┴───────────┴────────┴───────────┘
//!
//! CircleVertex (52 bytes)
//! ┌────────────────┬────────────────┬──────────┬───────────┬───────┬───────────┐
//! │ world_position │ local_position │ color    │ thickness │ fade  │ entity_id │
//! │ [f32; 3]       │ [f32; 3]       │ [f32; 4] │ f32       │ f32   │ i32       │
//! │ offset 0       │ offset 12      │ off 24   │ offset 40 │ off 44│ offset 48 │
//! └────────────────┴────────────────┴──────────┴───────────┴───────┴───────────┘
//!
//! LineVertex (32 bytes)
//! ┌────────────┬────────────┬───────────┐
//! │ position   │ color      │ entity_id │
//! │ offset 0   │ offset 12  │ offset 28 │
//! └────────────┴────────────┴───────────┘
//! ```
//!
//! `tex_index` picks one of the bound texture slots in the fragment shader;
//! `entity_id` is written to the integer picking attachment (`-1` = none).
//! Circles are quads whose fragment shader discards outside the unit circle
//! described by `local_position` (−1..1 across the quad).

use bytemuck::{Pod, Zeroable};

/// Quad corners in local space, counter-clockwise from bottom-left.
pub const QUAD_CORNERS: [[f32; 4]; 4] = [
    [-0.5, -0.5, 0.0, 1.0],
    [0.5, -0.5, 0.0, 1.0],
    [0.5, 0.5, 0.0, 1.0],
    [-0.5, 0.5, 0.0, 1.0],
];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coord: [f32; 2],
    pub tex_index: i32,
    pub tiling: f32,
    pub entity_id: i32,
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x4,
        2 => Float32x2,
        3 => Sint32,
        4 => Float32,
        5 => Sint32,
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CircleVertex {
    pub world_position: [f32; 3],
    pub local_position: [f32; 3],
    pub color: [f32; 4],
    pub thickness: f32,
    pub fade: f32,
    pub entity_id: i32,
}

impl CircleVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x4,
        3 => Float32,
        4 => Float32,
        5 => Sint32,
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<CircleVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub entity_id: i32,
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x4,
        2 => Sint32,
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };
}

/// Camera view-projection matrix uploaded as a uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// The shared index pattern for `quad_count` quads: two triangles per quad,
/// `0 1 2 2 3 0` offset by 4 each time.
pub fn quad_indices(quad_count: usize) -> Vec<u32> {
    (0..quad_count as u32)
        .flat_map(|quad| {
            let base = quad * 4;
            [base, base + 1, base + 2, base + 2, base + 3, base]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_shader_layouts() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 48);
        assert_eq!(std::mem::size_of::<CircleVertex>(), 52);
        assert_eq!(std::mem::size_of::<LineVertex>(), 32);
        assert_eq!(QuadVertex::LAYOUT.attributes[5].offset, 44);
        assert_eq!(CircleVertex::LAYOUT.attributes[2].offset, 24);
    }

    #[test]
    fn index_pattern() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    }
}
