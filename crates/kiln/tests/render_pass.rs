//! Whole-frame tests: registry → render systems → renderer → recording device.

use std::rc::Rc;

use kiln::prelude::*;
use kiln::render2d::vertex::QuadVertex;
use kiln::render2d::{DeviceCall, PrimitiveKind};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scene_with_camera() -> Context {
    let mut ctx = Context::new();
    ctx.spawn("main camera")
        .insert(Transform::IDENTITY)
        .insert(CameraComponent::default().primary());
    ctx
}

fn solid(renderer: &mut Renderer2D<HeadlessDevice>, rgba: [u8; 4]) -> Rc<Texture2D> {
    renderer.create_texture(1, 1, &rgba).unwrap()
}

fn quad_uploads(device: &HeadlessDevice) -> Vec<QuadVertex> {
    let buffer = device
        .calls()
        .iter()
        .find_map(|call| match call {
            DeviceCall::DrawIndexed {
                kind: PrimitiveKind::Quad,
                vertices,
                ..
            } => Some(*vertices),
            _ => None,
        })
        .expect("a quad draw");
    device.uploaded_vertices(buffer)
}

#[test]
fn three_sprites_two_textures_one_draw_call() {
    init_logging();
    let mut renderer = Renderer2D::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
    let a = solid(&mut renderer, [255, 0, 0, 255]);
    let b = solid(&mut renderer, [0, 0, 255, 255]);

    let mut ctx = scene_with_camera();
    let first = ctx
        .spawn("a1")
        .insert(Transform::from_xy(-2.0, 0.0))
        .insert(SpriteRenderer::from_texture(Rc::clone(&a)))
        .id();
    ctx.spawn("a2")
        .insert(Transform::from_xy(0.0, 0.0))
        .insert(SpriteRenderer::from_texture(Rc::clone(&a)));
    ctx.spawn("b")
        .insert(Transform::from_xy(2.0, 0.0))
        .insert(SpriteRenderer::from_texture(Rc::clone(&b)));

    assert!(render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard()));

    let device = renderer.device();
    assert_eq!(device.draw_calls(), 1);
    assert_eq!(device.indexed_draws(PrimitiveKind::Quad), vec![18]);
    assert_eq!(device.texture_binds(), 2);
    assert_eq!(device.bound_texture(1), Some(a.handle()));
    assert_eq!(device.bound_texture(2), Some(b.handle()));

    let vertices = quad_uploads(device);
    assert_eq!(vertices.len(), 12);
    let slots: Vec<_> = vertices.chunks(4).map(|q| q[0].tex_index).collect();
    assert_eq!(slots, vec![1, 1, 2]);
    assert_eq!(vertices[0].entity_id, first.pick_id());
    // bottom-left corner of the first sprite, unit quad at x = -2
    assert_eq!(vertices[0].position, [-2.5, -0.5, 0.0]);
}

#[test]
fn config_file_caps_the_quad_batch() {
    init_logging();
    let path = std::env::temp_dir().join(format!("kiln-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "max_quads": 2, "slot_retention": "reset" }"#).unwrap();
    let config = RendererConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(config.max_quads, 2);
    assert_eq!(config.slot_retention, SlotRetention::Reset);
    assert_eq!(config.max_circles, RendererConfig::default().max_circles);

    let mut renderer = Renderer2D::new(HeadlessDevice::new(), config).unwrap();
    let mut ctx = scene_with_camera();
    for i in 0..5 {
        ctx.spawn(format!("tile {i}"))
            .insert(Transform::from_xy(i as f32, 0.0))
            .insert(SpriteRenderer::from_color(Color::GREEN));
    }
    render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard());

    assert_eq!(
        renderer.device().indexed_draws(PrimitiveKind::Quad),
        vec![12, 12, 6]
    );
    assert_eq!(renderer.stats().capacity_flushes, 2);
}

#[test]
fn resized_viewport_reaches_the_projection() {
    init_logging();
    let mut renderer = Renderer2D::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
    let mut ctx = scene_with_camera();
    resize_viewport(&mut ctx, 800, 400);
    render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard());

    // orthographic size 10 is the half-height; aspect 2 doubles the half-width
    let vp = renderer.device().view_projection();
    let scale = Vec2::new(vp.x_axis.x, vp.y_axis.y);
    assert!(scale.abs_diff_eq(Vec2::new(0.05, 0.1), 1e-6));
}

#[test]
fn removed_sprite_texture_is_released_next_frame() {
    init_logging();
    let mut renderer = Renderer2D::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
    let texture = solid(&mut renderer, [9, 9, 9, 255]);
    let mut ctx = scene_with_camera();
    let sprite = ctx
        .spawn("sprite")
        .insert(Transform::IDENTITY)
        .insert(SpriteRenderer::from_texture(texture))
        .id();

    let mut schedule = RenderSchedule::standard();
    render_scene(&ctx, &mut renderer, &mut schedule);
    assert_eq!(renderer.device().live_textures(), 2);

    drop(ctx.unregister(sprite));
    render_scene(&ctx, &mut renderer, &mut schedule);
    assert_eq!(renderer.device().live_textures(), 1);

    let device = renderer.dispose();
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn circles_and_lines_follow_quads_at_end_of_scene() {
    init_logging();
    let mut renderer = Renderer2D::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
    let mut ctx = scene_with_camera();
    ctx.spawn("ring")
        .insert(Transform::IDENTITY)
        .insert(CircleRenderer {
            thickness: 0.2,
            ..CircleRenderer::default()
        });
    ctx.spawn("edge")
        .insert(Transform::from_xy(1.0, 1.0))
        .insert(LineRenderer::new(Vec3::ZERO, Vec3::X, Color::RED));
    ctx.spawn("floor")
        .insert(Transform::IDENTITY.with_size(4.0, 1.0))
        .insert(SpriteRenderer::default());

    render_scene(&ctx, &mut renderer, &mut RenderSchedule::standard());

    let kinds: Vec<_> = renderer
        .device()
        .calls()
        .iter()
        .filter_map(|call| match call {
            DeviceCall::DrawIndexed { kind, .. } => Some(*kind),
            DeviceCall::DrawLines { .. } => Some(PrimitiveKind::Line),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![PrimitiveKind::Quad, PrimitiveKind::Line, PrimitiveKind::Circle]
    );
}
