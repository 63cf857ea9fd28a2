//! # Render2d — Batched Quads, Circles and Lines
//!
//! The 2D renderer turns a stream of primitive submissions into as few GPU
//! draw calls as possible. Every quad, circle and line is transformed into
//! world space on the CPU and appended to a per-kind vertex array; many
//! logically distinct sprites then share one buffer upload and one draw.
//!
//! ## Architecture
//!
//! ```text
//!   Context (entities)              SceneCamera + Transform
//!        │                                   │
//!        ▼                                   ▼
//!   ┌──────────────┐  draw_quad/...   ┌────────────────────┐
//!   │ RenderSystem │ ───────────────► │ Renderer2D         │
//!   │ (draw.rs)    │                  │  begin_scene(vp)   │
//!   └──────────────┘                  │  PrimitiveBatch ×3 │
//!                                     │  TextureSlots      │
//!                                     │  end_scene()       │
//!                                     └─────────┬──────────┘
//!                                               │ write_buffer / bind_texture
//!                                               │ draw_indexed / draw_lines
//!                                               ▼
//!                                     ┌────────────────────┐
//!                                     │ dyn RenderDevice   │
//!                                     │  HeadlessDevice    │ (tests, capture)
//!                                     │  WgpuDevice        │ (offscreen GPU)
//!                                     └────────────────────┘
//! ```
//!
//! ## Flush Boundaries
//!
//! A batch is flushed (uploaded, drawn, emptied) when:
//!
//! - the next primitive would overflow the kind's vertex capacity,
//! - a quad needs a texture and every texture slot is taken,
//! - the scene ends (quads, then lines, then circles).
//!
//! None of these is an error. Capacities and the slot count come from
//! [`RendererConfig`](crate::config::RendererConfig).
//!
//! ## Comparison
//!
//! - **Love2D / Hazel-style batchers**: the same CPU-side world-space batching
//!   with a texture-slot array sampled by index in the fragment shader.
//! - **Bevy** (`bevy_sprite`): instanced rendering, one batch per texture.
//!   Fewer CPU transforms, more draw calls when textures alternate.

pub mod batch;
pub mod buffer;
pub mod device;
pub mod draw;
pub mod headless;
pub mod renderer;
pub mod texture;
pub mod vertex;
pub mod wgpu_device;

pub use device::{BufferHandle, PrimitiveKind, RenderDevice, TextureHandle};
pub use draw::{CircleSystem, LineSystem, RenderSchedule, RenderSystem, SpriteSystem, render_scene};
pub use headless::{DeviceCall, HeadlessDevice};
pub use renderer::{FlushReason, RenderStats, Renderer2D, RendererError};
pub use texture::{Texture2D, TextureCache, TextureError};
pub use wgpu_device::{DeviceError, WgpuDevice};

/// An RGBA color with floating-point components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const RED: Self = Self::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// Create a color from RGB (alpha = 1).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
