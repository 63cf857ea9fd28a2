//! Convenience re-exports — `use kiln::prelude::*` for the common items.

pub use crate::camera::{
    CameraComponent, ProjectionKind, SceneCamera, primary_camera, resize_viewport,
    set_primary_camera,
};
pub use crate::components::{CircleRenderer, LineRenderer, SpriteRenderer};
pub use crate::config::{RendererConfig, SlotRetention};
pub use crate::ecs::{Component, Context, Entity, EntityId};
pub use crate::math::{Mat4, Quat, Rect, Transform, Vec2, Vec3, Vec4};
pub use crate::render2d::{
    Color, HeadlessDevice, RenderDevice, RenderSchedule, Renderer2D, Texture2D, TextureCache,
    WgpuDevice, render_scene,
};
