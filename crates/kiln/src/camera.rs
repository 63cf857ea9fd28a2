//! # Camera — Lazy Projection and the Primary Camera
//!
//! A [`SceneCamera`] turns a handful of parameters into a projection matrix:
//!
//! ```text
//! Orthographic                         Perspective
//!   size   = half the visible height     fov_y  = vertical field of view
//!   aspect = width / height              aspect = width / height
//!   near, far                            near, far
//!
//!   left/right = ±size·aspect
//!   bottom/top = ±size
//! ```
//!
//! Both use glam's right-handed constructors with a `[0, 1]` depth range, which
//! is what wgpu's clip space expects.
//!
//! ## Dirty Flag
//!
//! Setters only mark the projection dirty. The matrix is rebuilt the next time
//! someone reads it, and the flag is cleared at that point. Setting size, near
//! and far in a row costs one rebuild, not three. Reads go through `&self`, so
//! the cache lives in `Cell`s.
//!
//! ## Primary Camera
//!
//! A scene may hold several [`CameraComponent`]s; exactly one is flagged
//! `primary` and supplies the view-projection for rendering. The free
//! functions at the bottom of this module find it, switch it, and propagate
//! viewport resizes.

use std::cell::Cell;

use crate::ecs::{Context, Entity, EntityId};
use crate::math::{Mat4, Transform};

/// Which projection a [`SceneCamera`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionKind {
    #[default]
    Orthographic,
    Perspective,
}

/// Projection parameters plus a lazily rebuilt matrix.
#[derive(Debug, Clone)]
pub struct SceneCamera {
    kind: ProjectionKind,
    ortho_size: f32,
    ortho_near: f32,
    ortho_far: f32,
    fov_y: f32,
    persp_near: f32,
    persp_far: f32,
    aspect: f32,
    fixed_aspect_ratio: bool,

    projection: Cell<Mat4>,
    dirty: Cell<bool>,
    recalculations: Cell<u32>,
}

impl Default for SceneCamera {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Orthographic,
            ortho_size: 10.0,
            ortho_near: -1.0,
            ortho_far: 1.0,
            fov_y: 45f32.to_radians(),
            persp_near: 0.01,
            persp_far: 1000.0,
            aspect: 1.0,
            fixed_aspect_ratio: false,
            projection: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(true),
            recalculations: Cell::new(0),
        }
    }
}

impl SceneCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// An orthographic camera showing `size` world units above and below
    /// the center.
    pub fn orthographic(size: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.set_orthographic(size, near, far);
        camera
    }

    /// A perspective camera; `fov_y` is in radians.
    pub fn perspective(fov_y: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.set_perspective(fov_y, near, far);
        camera
    }

    /// Switch to orthographic and set its parameters in one step.
    pub fn set_orthographic(&mut self, size: f32, near: f32, far: f32) {
        self.kind = ProjectionKind::Orthographic;
        self.ortho_size = size;
        self.ortho_near = near;
        self.ortho_far = far;
        self.mark_dirty();
    }

    /// Switch to perspective and set its parameters in one step.
    pub fn set_perspective(&mut self, fov_y: f32, near: f32, far: f32) {
        self.kind = ProjectionKind::Perspective;
        self.fov_y = fov_y;
        self.persp_near = near;
        self.persp_far = far;
        self.mark_dirty();
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ProjectionKind) {
        self.kind = kind;
        self.mark_dirty();
    }

    pub fn orthographic_size(&self) -> f32 {
        self.ortho_size
    }

    pub fn set_orthographic_size(&mut self, size: f32) {
        self.ortho_size = size;
        self.mark_dirty();
    }

    pub fn orthographic_near(&self) -> f32 {
        self.ortho_near
    }

    pub fn set_orthographic_near(&mut self, near: f32) {
        self.ortho_near = near;
        self.mark_dirty();
    }

    pub fn orthographic_far(&self) -> f32 {
        self.ortho_far
    }

    pub fn set_orthographic_far(&mut self, far: f32) {
        self.ortho_far = far;
        self.mark_dirty();
    }

    pub fn perspective_fov(&self) -> f32 {
        self.fov_y
    }

    pub fn set_perspective_fov(&mut self, fov_y: f32) {
        self.fov_y = fov_y;
        self.mark_dirty();
    }

    pub fn perspective_near(&self) -> f32 {
        self.persp_near
    }

    pub fn set_perspective_near(&mut self, near: f32) {
        self.persp_near = near;
        self.mark_dirty();
    }

    pub fn perspective_far(&self) -> f32 {
        self.persp_far
    }

    pub fn set_perspective_far(&mut self, far: f32) {
        self.persp_far = far;
        self.mark_dirty();
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.mark_dirty();
    }

    pub fn fixed_aspect_ratio(&self) -> bool {
        self.fixed_aspect_ratio
    }

    /// A fixed-aspect camera ignores [`set_viewport_size`](Self::set_viewport_size).
    pub fn set_fixed_aspect_ratio(&mut self, fixed: bool) {
        self.fixed_aspect_ratio = fixed;
    }

    /// Adopt the aspect ratio of a `width` × `height` viewport.
    ///
    /// No-op for fixed-aspect cameras and for zero-sized viewports (a
    /// minimized window).
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if self.fixed_aspect_ratio || width == 0 || height == 0 {
            return;
        }
        self.set_aspect_ratio(width as f32 / height as f32);
    }

    /// The projection matrix, rebuilt first if any parameter changed since
    /// the last read.
    pub fn projection(&self) -> Mat4 {
        if self.dirty.get() {
            self.projection.set(self.compute_projection());
            self.dirty.set(false);
            self.recalculations.set(self.recalculations.get() + 1);
        }
        self.projection.get()
    }

    /// Projection times the inverse of the camera's world transform.
    pub fn view_projection(&self, transform: &Transform) -> Mat4 {
        self.projection() * transform.matrix().inverse()
    }

    /// True if the next [`projection`](Self::projection) call will rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// How many times the projection has been rebuilt.
    pub fn recalculation_count(&self) -> u32 {
        self.recalculations.get()
    }

    fn mark_dirty(&mut self) {
        self.dirty.set(true);
    }

    fn compute_projection(&self) -> Mat4 {
        match self.kind {
            ProjectionKind::Orthographic => {
                let half_h = self.ortho_size;
                let half_w = self.ortho_size * self.aspect;
                Mat4::orthographic_rh(
                    -half_w,
                    half_w,
                    -half_h,
                    half_h,
                    self.ortho_near,
                    self.ortho_far,
                )
            }
            ProjectionKind::Perspective => {
                Mat4::perspective_rh(self.fov_y, self.aspect, self.persp_near, self.persp_far)
            }
        }
    }
}

/// A camera attached to an entity. Pair with [`Transform`].
#[derive(Debug, Clone, Default)]
pub struct CameraComponent {
    pub camera: SceneCamera,
    /// Whether this camera renders the scene. Keep exactly one set; see
    /// [`set_primary_camera`].
    pub primary: bool,
}

impl CameraComponent {
    pub fn new(camera: SceneCamera) -> Self {
        Self {
            camera,
            primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// The first primary camera in registry order, with its transform.
pub fn primary_camera(ctx: &Context) -> Option<(&Entity, &CameraComponent, &Transform)> {
    ctx.view::<(CameraComponent, Transform)>()
        .find(|(_, (camera, _))| camera.primary)
        .map(|(entity, (camera, transform))| (entity, camera, transform))
}

/// Make `id` the only primary camera. Returns `false` (and changes nothing)
/// if `id` has no [`CameraComponent`].
pub fn set_primary_camera(ctx: &mut Context, id: EntityId) -> bool {
    if !ctx.get(id).is_some_and(|e| e.has::<CameraComponent>()) {
        log::warn!("set_primary_camera: entity {id} has no camera");
        return false;
    }
    ctx.view_mut::<(CameraComponent,)>(|entity, (camera,)| {
        camera.primary = entity == id;
    });
    true
}

/// Forward a viewport resize to every camera without a fixed aspect ratio.
pub fn resize_viewport(ctx: &mut Context, width: u32, height: u32) {
    ctx.view_mut::<(CameraComponent,)>(|_, (camera,)| {
        camera.camera.set_viewport_size(width, height);
    });
}
