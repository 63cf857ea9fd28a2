//! Renderable component records.
//!
//! Plain data, paired with a [`Transform`](crate::math::Transform) on the same
//! entity. The render systems in [`render2d::draw`](crate::render2d::draw)
//! read them each frame; nothing here talks to the renderer.

use std::rc::Rc;

use crate::math::{Rect, Vec3};
use crate::render2d::{Color, Texture2D};

/// A textured or solid-colored quad.
///
/// Without a texture the quad samples the white texture, so `color` alone
/// decides what it looks like.
#[derive(Debug, Clone)]
pub struct SpriteRenderer {
    /// Tint multiplied with the texture sample.
    pub color: Color,
    pub texture: Option<Rc<Texture2D>>,
    /// UV sub-region to sample; use [`Rect::from_cell`] for atlas sprites.
    pub tex_rect: Rect,
    /// How many times the texture repeats across the quad.
    pub tiling_factor: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Draw-order layer; lower layers draw first. Within a layer, lower
    /// `translation.z` draws first.
    pub layer: i32,
}

impl Default for SpriteRenderer {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            texture: None,
            tex_rect: Rect::FULL,
            tiling_factor: 1.0,
            flip_x: false,
            flip_y: false,
            layer: 0,
        }
    }
}

impl SpriteRenderer {
    pub fn from_color(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn from_texture(texture: Rc<Texture2D>) -> Self {
        Self {
            texture: Some(texture),
            ..Self::default()
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.tex_rect = rect;
        self
    }

    pub fn tiling(mut self, factor: f32) -> Self {
        self.tiling_factor = factor;
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }
}

/// A disc or ring inscribed in the entity's unit quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleRenderer {
    pub color: Color,
    /// 1.0 fills the disc; smaller values leave a ring of that relative width.
    pub thickness: f32,
    /// Edge softness in local units.
    pub fade: f32,
}

impl Default for CircleRenderer {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            thickness: 1.0,
            fade: 0.005,
        }
    }
}

/// A line segment between two points in the entity's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineRenderer {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Color,
}

impl LineRenderer {
    pub fn new(start: Vec3, end: Vec3, color: Color) -> Self {
        Self { start, end, color }
    }
}
