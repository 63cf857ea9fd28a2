//! # Draw — Render Systems
//!
//! A render system reads components from the [`Context`] and submits
//! primitives to the [`Renderer2D`]. Systems run in the order they were added
//! to a [`RenderSchedule`]; the renderer itself never sorts.
//!
//! ```text
//! render_scene(ctx, renderer, schedule)
//!   ├─ find the primary camera   (none → nothing drawn)
//!   ├─ renderer.begin_scene(camera view-projection)
//!   ├─ SpriteSystem   view<(Transform, SpriteRenderer)>, sorted by (layer, z)
//!   ├─ CircleSystem   view<(Transform, CircleRenderer)>
//!   ├─ LineSystem     view<(Transform, LineRenderer)>
//!   └─ renderer.end_scene()
//! ```
//!
//! Sprites are sorted with a stable sort, so sprites sharing a layer and depth
//! keep registry order and repeated frames draw identically.
//!
//! ## Comparison
//!
//! - **bevy**: render systems extract into a render world and sort phase items.
//! - **kiln**: systems are closures or small structs over `&Context`; ordering
//!   is explicit in the schedule.

use super::device::RenderDevice;
use super::renderer::Renderer2D;
use crate::camera::primary_camera;
use crate::components::{CircleRenderer, LineRenderer, SpriteRenderer};
use crate::ecs::Context;
use crate::math::Transform;

/// Something that submits primitives for a frame.
///
/// Any `FnMut(&Context, &mut Renderer2D<D>)` is a render system.
pub trait RenderSystem<D: RenderDevice> {
    fn render(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>);
}

impl<D: RenderDevice, F: FnMut(&Context, &mut Renderer2D<D>)> RenderSystem<D> for F {
    fn render(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>) {
        (self)(ctx, renderer);
    }
}

/// Draws every `(Transform, SpriteRenderer)` entity, back layers first.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpriteSystem;

impl<D: RenderDevice> RenderSystem<D> for SpriteSystem {
    fn render(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>) {
        let mut sprites: Vec<_> = ctx.view::<(Transform, SpriteRenderer)>().collect();
        sprites.sort_by(|(_, (ta, sa)), (_, (tb, sb))| {
            sa.layer.cmp(&sb.layer).then(ta.z().total_cmp(&tb.z()))
        });
        for (entity, (transform, sprite)) in sprites {
            renderer.draw_sprite(&transform.matrix(), sprite, entity.id());
        }
    }
}

/// Draws every `(Transform, CircleRenderer)` entity in registry order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CircleSystem;

impl<D: RenderDevice> RenderSystem<D> for CircleSystem {
    fn render(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>) {
        for (entity, (transform, circle)) in ctx.view::<(Transform, CircleRenderer)>() {
            renderer.draw_circle(
                &transform.matrix(),
                circle.color,
                circle.thickness,
                circle.fade,
                entity.id().pick_id(),
            );
        }
    }
}

/// Draws every `(Transform, LineRenderer)` entity in registry order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineSystem;

impl<D: RenderDevice> RenderSystem<D> for LineSystem {
    fn render(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>) {
        for (entity, (transform, line)) in ctx.view::<(Transform, LineRenderer)>() {
            let matrix = transform.matrix();
            renderer.draw_line(
                matrix.transform_point3(line.start),
                matrix.transform_point3(line.end),
                line.color,
                entity.id().pick_id(),
            );
        }
    }
}

struct NamedSystem<D: RenderDevice> {
    name: String,
    system: Box<dyn RenderSystem<D>>,
}

/// An ordered list of render systems.
pub struct RenderSchedule<D: RenderDevice> {
    systems: Vec<NamedSystem<D>>,
}

impl<D: RenderDevice> RenderSchedule<D> {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Sprites, then circles, then lines.
    pub fn standard() -> Self {
        let mut schedule = Self::new();
        schedule.add_system(SpriteSystem);
        schedule.add_system(CircleSystem);
        schedule.add_system(LineSystem);
        schedule
    }

    /// Add a system to the end of the schedule.
    pub fn add_system<S: RenderSystem<D> + 'static>(&mut self, system: S) {
        self.systems.push(NamedSystem {
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
    }

    /// Run every system in order. The caller brackets this with
    /// `begin_scene` / `end_scene`; see [`render_scene`].
    pub fn run(&mut self, ctx: &Context, renderer: &mut Renderer2D<D>) {
        for named in &mut self.systems {
            named.system.render(ctx, renderer);
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Short system names, in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.iter().map(|s| s.name.as_str())
    }
}

impl<D: RenderDevice> Default for RenderSchedule<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the module path from a type name (`kiln::render2d::draw::SpriteSystem`
/// → `SpriteSystem`; closures → `<closure>`).
fn short_system_name(full: &str) -> String {
    let name = full.rsplit("::").next().unwrap_or(full);
    if name.contains("closure") {
        "<closure>".to_string()
    } else {
        name.to_string()
    }
}

/// Render one frame of `ctx` through its primary camera.
///
/// Returns `false` (and draws nothing) if no entity holds a primary
/// [`CameraComponent`](crate::camera::CameraComponent) with a [`Transform`].
pub fn render_scene<D: RenderDevice>(
    ctx: &Context,
    renderer: &mut Renderer2D<D>,
    schedule: &mut RenderSchedule<D>,
) -> bool {
    let Some((entity, camera, transform)) = primary_camera(ctx) else {
        log::debug!("render_scene: no primary camera, nothing drawn");
        return false;
    };
    log::trace!("render_scene: camera {} ({})", entity.id(), entity.name());
    renderer.begin_scene_with_camera(&camera.camera, transform);
    schedule.run(ctx, renderer);
    renderer.end_scene();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraComponent;
    use crate::config::RendererConfig;
    use crate::math::Vec3;
    use crate::render2d::vertex::QuadVertex;
    use crate::render2d::{Color, HeadlessDevice, PrimitiveKind};

    fn renderer() -> Renderer2D<HeadlessDevice> {
        Renderer2D::new(HeadlessDevice::new(), RendererConfig::default()).unwrap()
    }

    fn with_camera() -> Context {
        let mut ctx = Context::new();
        ctx.spawn("camera")
            .insert(Transform::IDENTITY)
            .insert(CameraComponent::default().primary());
        ctx
    }

    fn quad_entity_ids(renderer: &Renderer2D<HeadlessDevice>) -> Vec<i32> {
        let device = renderer.device();
        let buffer = device
            .calls()
            .iter()
            .find_map(|c| match c {
                crate::render2d::DeviceCall::DrawIndexed {
                    kind: PrimitiveKind::Quad,
                    vertices,
                    ..
                } => Some(*vertices),
                _ => None,
            })
            .unwrap();
        device
            .uploaded_vertices::<QuadVertex>(buffer)
            .chunks(4)
            .map(|quad| quad[0].entity_id)
            .collect()
    }

    #[test]
    fn sprites_sort_by_layer_then_depth_stably() {
        let mut ctx = with_camera();
        let front = ctx
            .spawn("front")
            .insert(Transform::from_xyz(0.0, 0.0, 0.5))
            .insert(SpriteRenderer::default().layer(1))
            .id();
        let back_far = ctx
            .spawn("back far")
            .insert(Transform::from_xyz(0.0, 0.0, -1.0))
            .insert(SpriteRenderer::default())
            .id();
        let back_a = ctx
            .spawn("back a")
            .insert(Transform::IDENTITY)
            .insert(SpriteRenderer::default())
            .id();
        let back_b = ctx
            .spawn("back b")
            .insert(Transform::IDENTITY)
            .insert(SpriteRenderer::default())
            .id();

        let mut renderer = renderer();
        assert!(render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard()));

        let expected: Vec<_> = [back_far, back_a, back_b, front]
            .iter()
            .map(|id| id.pick_id())
            .collect();
        assert_eq!(quad_entity_ids(&renderer), expected);
    }

    #[test]
    fn no_primary_camera_draws_nothing() {
        let mut ctx = Context::new();
        ctx.spawn("sprite")
            .insert(Transform::IDENTITY)
            .insert(SpriteRenderer::default());
        ctx.spawn("idle camera")
            .insert(Transform::IDENTITY)
            .insert(CameraComponent::default());

        let mut renderer = renderer();
        assert!(!render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard()));
        assert_eq!(renderer.device().draw_calls(), 0);
        assert!(!renderer.is_in_scene());
    }

    #[test]
    fn every_system_kind_draws() {
        let mut ctx = with_camera();
        ctx.spawn("sprite")
            .insert(Transform::IDENTITY)
            .insert(SpriteRenderer::from_color(Color::RED));
        ctx.spawn("circle")
            .insert(Transform::from_xy(2.0, 0.0))
            .insert(CircleRenderer::default());
        ctx.spawn("line")
            .insert(Transform::from_xy(0.0, 1.0))
            .insert(LineRenderer::new(Vec3::ZERO, Vec3::X, Color::GREEN));

        let mut renderer = renderer();
        render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard());

        let stats = renderer.stats();
        assert_eq!((stats.quads, stats.circles, stats.lines), (1, 1, 1));
        assert_eq!(stats.draw_calls, 3);
    }

    #[test]
    fn camera_view_projection_reaches_device() {
        let mut ctx = Context::new();
        ctx.spawn("camera")
            .insert(Transform::from_xy(3.0, 0.0))
            .insert(CameraComponent::default().primary());
        let mut renderer = renderer();
        render_scene(&ctx, &mut renderer, &mut RenderSchedule::new());

        let (_, camera, transform) = primary_camera(&ctx).unwrap();
        let expected = camera.camera.view_projection(transform);
        assert_eq!(renderer.device().view_projection(), expected);
    }

    #[test]
    fn closures_are_systems_and_names_are_short() {
        let mut schedule = RenderSchedule::<HeadlessDevice>::standard();
        schedule.add_system(|_: &Context, r: &mut Renderer2D<HeadlessDevice>| {
            r.draw_line(Vec3::ZERO, Vec3::Y, Color::WHITE, -1);
        });
        let names: Vec<_> = schedule.names().collect();
        assert_eq!(
            names,
            vec!["SpriteSystem", "CircleSystem", "LineSystem", "<closure>"]
        );

        let ctx = with_camera();
        let mut renderer = renderer();
        render_scene(&ctx, &mut renderer, &mut schedule);
        assert_eq!(renderer.stats().lines, 1);
    }
}
