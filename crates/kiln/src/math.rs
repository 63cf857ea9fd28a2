//! Math types and glam re-exports.
//!
//! Users get [glam](https://docs.rs/glam) through this module so they don't
//! need to depend on it directly. [`Transform`] places an entity in the world;
//! [`Rect`] selects a sub-region of a texture.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Position, rotation and scale of an entity.
///
/// 2D content rotates about Z and uses `translation.z` for depth ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vec3::new(x, y, z),
            ..Self::IDENTITY
        }
    }

    /// A transform at the given 2D position (z = 0).
    pub fn from_xy(x: f32, y: f32) -> Self {
        Self::from_xyz(x, y, 0.0)
    }

    /// Return a copy rotated by `radians` about Z.
    pub fn with_rotation_z(mut self, radians: f32) -> Self {
        self.rotation = Quat::from_rotation_z(radians);
        self
    }

    /// Return a copy with uniform scale applied.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Return a copy sized `width` × `height` in the XY plane.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.scale = Vec3::new(width, height, 1.0);
        self
    }

    /// The 4x4 model matrix (scale, then rotate, then translate).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Depth used for 2D draw ordering.
    pub fn z(&self) -> f32 {
        self.translation.z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A normalized rectangle within a texture (UV space, 0.0–1.0).
///
/// (0,0) is the top-left corner of the image and (1,1) the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// The full texture (0,0) to (1,1).
    pub const FULL: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Build from pixel coordinates and texture dimensions.
    pub fn from_pixels(x: f32, y: f32, w: f32, h: f32, tex_w: f32, tex_h: f32) -> Self {
        Self {
            min: Vec2::new(x / tex_w, y / tex_h),
            max: Vec2::new((x + w) / tex_w, (y + h) / tex_h),
        }
    }

    /// One cell of a sprite atlas.
    ///
    /// `coords` counts cells from the atlas's top-left corner, `cell` is the
    /// cell size in pixels, and `span` the number of cells covered (`(1, 1)`
    /// for a single sprite). `atlas` is the texture size in pixels.
    pub fn from_cell(coords: Vec2, cell: Vec2, span: Vec2, atlas: Vec2) -> Self {
        let min = coords * cell;
        let max = (coords + span) * cell;
        Self {
            min: min / atlas,
            max: max / atlas,
        }
    }

    /// The four corner UVs in quad corner order: bottom-left, bottom-right,
    /// top-right, top-left (image rows grow downward, so "bottom" is `max.y`).
    pub fn corners(&self, flip_x: bool, flip_y: bool) -> [[f32; 2]; 4] {
        let (left, right) = if flip_x {
            (self.max.x, self.min.x)
        } else {
            (self.min.x, self.max.x)
        };
        let (bottom, top) = if flip_y {
            (self.min.y, self.max.y)
        } else {
            (self.max.y, self.min.y)
        };
        [[left, bottom], [right, bottom], [right, top], [left, top]]
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_applies_scale_rotation_translation() {
        let t = Transform::from_xy(10.0, 0.0)
            .with_size(2.0, 4.0)
            .with_rotation_z(std::f32::consts::FRAC_PI_2);
        let p = t.matrix().transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn atlas_cell_uvs() {
        let r = Rect::from_cell(
            Vec2::new(2.0, 1.0),
            Vec2::new(16.0, 16.0),
            Vec2::ONE,
            Vec2::new(128.0, 64.0),
        );
        assert_eq!(r.min, Vec2::new(0.25, 0.25));
        assert_eq!(r.max, Vec2::new(0.375, 0.5));
    }

    #[test]
    fn flipped_corners() {
        let plain = Rect::FULL.corners(false, false);
        assert_eq!(plain, [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
        let flipped = Rect::FULL.corners(true, false);
        assert_eq!(flipped[0], [1.0, 1.0]);
        assert_eq!(flipped[1], [0.0, 1.0]);
    }
}
