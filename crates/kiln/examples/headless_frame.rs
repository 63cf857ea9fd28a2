//! Headless Frame — One frame through the recording device.
//!
//! Builds a small scene (an atlas of tiles, a ring, a crosshair), renders it
//! with `HeadlessDevice`, and prints the device call log and frame stats.
//!
//! Run with `RUST_LOG=kiln=trace` to see every flush.

use kiln::prelude::*;

fn main() {
    env_logger::init();

    let config = RendererConfig {
        max_quads: 64,
        ..RendererConfig::default()
    };
    let mut renderer = match Renderer2D::new(HeadlessDevice::new(), config) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("{err}");
            return;
        }
    };

    // 4x4 checkerboard atlas, 2x2 cells of 2x2 pixels each
    let atlas_pixels: Vec<u8> = (0..16)
        .flat_map(|i| {
            let (x, y) = (i % 4, i / 4);
            if (x / 2 + y / 2) % 2 == 0 {
                [200, 200, 200, 255]
            } else {
                [60, 60, 60, 255]
            }
        })
        .collect();
    let atlas = match renderer.create_texture(4, 4, &atlas_pixels) {
        Ok(atlas) => atlas,
        Err(err) => {
            log::error!("{err}");
            return;
        }
    };

    let mut ctx = Context::new();
    ctx.spawn("camera")
        .insert(Transform::IDENTITY)
        .insert(CameraComponent::default().primary());
    resize_viewport(&mut ctx, 1280, 720);

    for y in 0..4 {
        for x in 0..8 {
            let cell = Rect::from_cell(
                Vec2::new((x % 2) as f32, (y % 2) as f32),
                Vec2::splat(2.0),
                Vec2::ONE,
                Vec2::splat(4.0),
            );
            ctx.spawn(format!("tile {x},{y}"))
                .insert(Transform::from_xy(x as f32 - 3.5, y as f32 - 1.5))
                .insert(SpriteRenderer::from_texture(atlas.clone()).rect(cell));
        }
    }
    ctx.spawn("ring")
        .insert(Transform::from_xyz(0.0, 0.0, 0.1).with_scale(3.0))
        .insert(CircleRenderer {
            color: Color::rgb(1.0, 0.6, 0.1),
            thickness: 0.15,
            ..CircleRenderer::default()
        });
    ctx.spawn("crosshair h")
        .insert(Transform::IDENTITY)
        .insert(LineRenderer::new(Vec3::new(-0.5, 0.0, 0.2), Vec3::new(0.5, 0.0, 0.2), Color::RED));
    ctx.spawn("crosshair v")
        .insert(Transform::IDENTITY)
        .insert(LineRenderer::new(Vec3::new(0.0, -0.5, 0.2), Vec3::new(0.0, 0.5, 0.2), Color::RED));

    let mut schedule = RenderSchedule::standard();
    if !render_scene(&ctx, &mut renderer, &mut schedule) {
        log::warn!("nothing rendered");
        return;
    }

    for call in renderer.device().calls() {
        println!("{call:?}");
    }
    let stats = renderer.stats();
    println!(
        "{} draw calls, {} quads, {} circles, {} lines, {} texture binds",
        stats.draw_calls, stats.quads, stats.circles, stats.lines, stats.texture_binds
    );

    drop(ctx);
    drop(atlas);
    let device = renderer.dispose();
    println!(
        "after dispose: {} buffers, {} textures live",
        device.live_buffers(),
        device.live_textures()
    );
}
