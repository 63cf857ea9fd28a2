//! # Kiln — ECS Core and Batching 2D Renderer
//!
//! An entity registry with typed component views, a scene camera with a lazy
//! projection, and a 2D renderer that batches quads, circles and lines into
//! as few draw calls as the texture slots allow.
//!
//! The renderer drives any [`RenderDevice`](render2d::RenderDevice): the
//! recording [`HeadlessDevice`](render2d::HeadlessDevice) for tests and frame
//! capture, or the offscreen [`WgpuDevice`](render2d::WgpuDevice).
//!
//! Start with `use kiln::prelude::*`.

pub mod camera;
pub mod components;
pub mod config;
pub mod ecs;
pub mod math;
pub mod prelude;
pub mod render2d;
