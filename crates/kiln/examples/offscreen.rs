//! Offscreen — The same renderer on a real GPU.
//!
//! Renders a few frames of spinning quads into `WgpuDevice`'s offscreen color
//! and entity-id targets. Needs a GPU adapter; exits with an error log
//! otherwise.

use kiln::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn main() {
    env_logger::init();

    let device = match WgpuDevice::new_headless(WIDTH, HEIGHT) {
        Ok(device) => device,
        Err(err) => {
            log::error!("{err}");
            return;
        }
    };
    let mut renderer = match Renderer2D::new(device, RendererConfig::default()) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("{err}");
            return;
        }
    };
    let mut cache = TextureCache::new();
    let missing = cache.load(&mut renderer, "assets/does-not-exist.png");
    log::info!("fallback texture: {missing:?}");

    let mut ctx = Context::new();
    ctx.spawn("camera")
        .insert(Transform::IDENTITY)
        .insert(CameraComponent::default().primary());
    resize_viewport(&mut ctx, WIDTH, HEIGHT);

    let spinners: Vec<EntityId> = (0..6)
        .map(|i| {
            let hue = i as f32 / 6.0;
            ctx.spawn(format!("spinner {i}"))
                .insert(Transform::from_xy(i as f32 * 2.5 - 6.25, 0.0).with_scale(1.5))
                .insert(SpriteRenderer::from_color(Color::rgb(hue, 1.0 - hue, 0.5)).layer(i % 2))
                .id()
        })
        .collect();
    ctx.spawn("halo")
        .insert(Transform::IDENTITY.with_scale(8.0))
        .insert(CircleRenderer {
            thickness: 0.05,
            ..CircleRenderer::default()
        });

    let mut schedule = RenderSchedule::standard();
    for frame in 0..3 {
        for &id in &spinners {
            if let Some(transform) = ctx
                .get_mut(id)
                .and_then(|entity| entity.get_mut::<Transform>())
            {
                transform.rotation = Quat::from_rotation_z(frame as f32 * 0.3);
            }
        }
        renderer.device_mut().clear(Color::rgb(0.05, 0.05, 0.08));
        renderer.reset_stats();
        render_scene(&ctx, &mut renderer, &mut schedule);
        log::info!("frame {frame}: {:?}", renderer.stats());
    }

    drop((ctx, cache, missing));
    let device = renderer.dispose();
    log::info!("submitted {} draws", device.draw_count());
}
