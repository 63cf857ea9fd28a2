//! # Renderer2D — The Scene State Machine
//!
//! [`Renderer2D`] owns three batches (quads, circles, lines), the device
//! buffers behind them, and the texture slot table. A frame looks like:
//!
//! ```text
//! begin_scene(view_proj)
//!   │  reclaim dropped textures, reset slots to [white],
//!   │  upload the camera matrix
//!   ▼
//! draw_quad / draw_sprite / draw_circle / draw_line ...   (any order)
//!   │  for each primitive:
//!   │   1. batch full?            → flush that kind (Capacity)
//!   │   2. quad texture slot?     → reuse / take next / flush (SlotsExhausted)
//!   │   3. transform corners to world space, append vertices
//!   ▼
//! end_scene()
//!      flush quads, then lines, then circles
//! ```
//!
//! ## Flush
//!
//! An empty batch flushes to nothing: no upload, no bind, no draw. Otherwise
//! the live span is written to the kind's vertex buffer, the texture slots the
//! batch sampled are bound (skipping units that already hold the right
//! texture), and one draw is issued.
//!
//! Slot assignments survive a capacity flush under
//! [`SlotRetention::Preserve`] and are cleared under
//! [`SlotRetention::Reset`]. A slot-exhaustion flush always clears them, and
//! the texture that didn't fit lands in slot 1 of the fresh batch.
//!
//! ## Programming Errors
//!
//! Nested `begin_scene`, `end_scene` without `begin_scene`, and drawing outside
//! a scene all panic. Running out of capacity or slots is never an error.

use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use super::Color;
use super::batch::{PrimitiveBatch, TextureSlots};
use super::buffer::GpuBuffer;
use super::device::{PrimitiveKind, RenderDevice, TextureHandle};
use super::texture::{self, ReclaimQueue, Texture2D, TextureError};
use super::vertex::{CircleVertex, LineVertex, QUAD_CORNERS, QuadVertex, quad_indices};
use crate::camera::SceneCamera;
use crate::components::SpriteRenderer;
use crate::config::{ConfigError, RendererConfig, SlotRetention};
use crate::ecs::EntityId;
use crate::math::{Mat4, Quat, Rect, Transform, Vec2, Vec3, Vec4};

/// Entity id written for primitives that don't belong to an entity.
pub const NO_ENTITY: i32 = -1;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The next primitive would not fit.
    Capacity,
    /// A quad needed a texture slot and none was free.
    SlotsExhausted,
    EndScene,
    /// [`Renderer2D::flush`] was called directly.
    Explicit,
}

/// Counters accumulated since creation or the last
/// [`reset_stats`](Renderer2D::reset_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub quads: u32,
    pub circles: u32,
    pub lines: u32,
    pub texture_binds: u32,
    pub capacity_flushes: u32,
    pub slot_flushes: u32,
    pub vertices: u64,
    pub indices: u64,
}

impl RenderStats {
    pub fn primitives(&self) -> u32 {
        self.quads + self.circles + self.lines
    }
}

/// Batching 2D renderer over a [`RenderDevice`].
pub struct Renderer2D<D: RenderDevice> {
    device: D,
    config: RendererConfig,

    quads: PrimitiveBatch<QuadVertex>,
    circles: PrimitiveBatch<CircleVertex>,
    lines: PrimitiveBatch<LineVertex>,

    quad_buffer: GpuBuffer,
    circle_buffer: GpuBuffer,
    line_buffer: GpuBuffer,
    index_buffer: GpuBuffer,

    slots: TextureSlots,
    white: Rc<Texture2D>,
    bound_units: Vec<Option<TextureHandle>>,
    reclaim: ReclaimQueue,

    in_scene: bool,
    stats: RenderStats,
}

impl<D: RenderDevice> Renderer2D<D> {
    /// Validate `config` against the device and allocate every buffer plus
    /// the white texture.
    pub fn new(mut device: D, config: RendererConfig) -> Result<Self, RendererError> {
        config.validate(device.max_texture_units())?;

        let quads = PrimitiveBatch::new(PrimitiveKind::Quad, config.max_quads);
        let circles = PrimitiveBatch::new(PrimitiveKind::Circle, config.max_circles);
        let lines = PrimitiveBatch::new(PrimitiveKind::Line, config.max_lines);

        let quad_buffer = GpuBuffer::vertex(
            &mut device,
            PrimitiveKind::Quad,
            quads.buffer_size(),
            "quad vertices",
        );
        let circle_buffer = GpuBuffer::vertex(
            &mut device,
            PrimitiveKind::Circle,
            circles.buffer_size(),
            "circle vertices",
        );
        let line_buffer = GpuBuffer::vertex(
            &mut device,
            PrimitiveKind::Line,
            lines.buffer_size(),
            "line vertices",
        );
        let index_buffer = GpuBuffer::index(
            &mut device,
            &quad_indices(config.max_quads.max(config.max_circles)),
            "quad indices",
        );

        let reclaim = ReclaimQueue::default();
        let white_handle = device.create_texture(1, 1, &[255, 255, 255, 255]);
        let white = Rc::new(Texture2D::new(white_handle, 1, 1, None, &reclaim));
        let slots = TextureSlots::new(Rc::clone(&white), config.max_texture_slots as usize);

        log::info!(
            "Renderer2D: {} quads, {} circles, {} lines per batch, {} texture slots",
            config.max_quads,
            config.max_circles,
            config.max_lines,
            config.max_texture_slots
        );

        Ok(Self {
            bound_units: vec![None; config.max_texture_slots as usize],
            device,
            config,
            quads,
            circles,
            lines,
            quad_buffer,
            circle_buffer,
            line_buffer,
            index_buffer,
            slots,
            white,
            reclaim,
            in_scene: false,
            stats: RenderStats::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    pub fn is_in_scene(&self) -> bool {
        self.in_scene
    }

    /// The 1x1 white texture occupying slot 0.
    pub fn white_texture(&self) -> Rc<Texture2D> {
        Rc::clone(&self.white)
    }

    pub fn line_width(&self) -> f32 {
        self.config.line_width
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.config.line_width = width;
    }

    // ── Textures ─────────────────────────────────────────────────────────

    /// Upload RGBA8 pixels as a new texture.
    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Rc<Texture2D>, TextureError> {
        self.create_texture_inner(width, height, rgba, None)
    }

    /// Decode an image file and upload it. Prefer
    /// [`TextureCache::load`](super::TextureCache::load), which deduplicates
    /// by path and never fails.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<Rc<Texture2D>, TextureError> {
        let path = path.as_ref();
        let (width, height, rgba) = texture::decode_rgba(path)?;
        self.create_texture_inner(width, height, &rgba, Some(path.to_path_buf()))
    }

    fn create_texture_inner(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        path: Option<std::path::PathBuf>,
    ) -> Result<Rc<Texture2D>, TextureError> {
        texture::check_rgba(width, height, rgba)?;
        let handle = self.device.create_texture(width, height, rgba);
        Ok(Rc::new(Texture2D::new(handle, width, height, path, &self.reclaim)))
    }

    /// Release the device textures of every dropped [`Texture2D`]. Returns how
    /// many were released.
    ///
    /// Outside a scene this also drops the slot table's references, so
    /// textures last used by the previous frame can go too.
    pub fn collect_garbage(&mut self) -> usize {
        if !self.in_scene {
            self.slots.reset();
        }
        self.reclaim_textures()
    }

    fn reclaim_textures(&mut self) -> usize {
        let handles: Vec<TextureHandle> = self.reclaim.borrow_mut().drain(..).collect();
        for &handle in &handles {
            self.device.release_texture(handle);
            for unit in self.bound_units.iter_mut() {
                if *unit == Some(handle) {
                    *unit = None;
                }
            }
        }
        if !handles.is_empty() {
            log::trace!("released {} dropped textures", handles.len());
        }
        handles.len()
    }

    // ── Scene ────────────────────────────────────────────────────────────

    /// Start a scene rendered with `view_proj`.
    ///
    /// # Panics
    ///
    /// Panics if a scene is already in progress.
    pub fn begin_scene(&mut self, view_proj: Mat4) {
        assert!(
            !self.in_scene,
            "begin_scene called while a scene is in progress; call end_scene first"
        );
        self.quads.clear();
        self.circles.clear();
        self.lines.clear();
        self.slots.reset();
        self.reclaim_textures();
        self.device.set_view_projection(view_proj);
        self.in_scene = true;
    }

    /// Start a scene seen through `camera` placed at `transform`.
    pub fn begin_scene_with_camera(&mut self, camera: &SceneCamera, transform: &Transform) {
        self.begin_scene(camera.view_projection(transform));
    }

    /// Flush everything pending (quads, lines, circles) and close the scene.
    ///
    /// # Panics
    ///
    /// Panics if no scene is in progress.
    pub fn end_scene(&mut self) {
        assert!(self.in_scene, "end_scene called without begin_scene");
        self.flush_all(FlushReason::EndScene);
        self.in_scene = false;
        log::debug!(
            "scene done: {} draw calls, {} primitives, {} texture binds",
            self.stats.draw_calls,
            self.stats.primitives(),
            self.stats.texture_binds
        );
    }

    /// Flush every pending batch now. A no-op for empty batches.
    pub fn flush(&mut self) {
        self.flush_all(FlushReason::Explicit);
    }

    fn flush_all(&mut self, reason: FlushReason) {
        self.flush_quads(reason);
        self.flush_lines(reason);
        self.flush_circles(reason);
    }

    fn flush_quads(&mut self, reason: FlushReason) {
        if !self.quads.is_empty() {
            self.quad_buffer.write(&mut self.device, self.quads.bytes());
            for (slot, texture) in self.slots.used() {
                let handle = texture.handle();
                if self.bound_units[slot] != Some(handle) {
                    self.device.bind_texture(slot as u32, handle);
                    self.bound_units[slot] = Some(handle);
                    self.stats.texture_binds += 1;
                }
            }
            let index_count = self.quads.index_count() as u32;
            self.device.draw_indexed(
                PrimitiveKind::Quad,
                self.quad_buffer.handle(),
                self.index_buffer.handle(),
                index_count,
            );
            self.record_draw(PrimitiveKind::Quad, self.quads.len(), reason);
            self.stats.vertices += self.quads.vertex_count() as u64;
            self.stats.indices += u64::from(index_count);
            self.quads.clear();
            self.slots.clear_used();
        }

        let reset = match reason {
            FlushReason::SlotsExhausted => true,
            FlushReason::Capacity => self.config.slot_retention == SlotRetention::Reset,
            FlushReason::EndScene | FlushReason::Explicit => false,
        };
        if reset {
            self.slots.reset();
        }
    }

    fn flush_circles(&mut self, reason: FlushReason) {
        if self.circles.is_empty() {
            return;
        }
        self.circle_buffer.write(&mut self.device, self.circles.bytes());
        let index_count = self.circles.index_count() as u32;
        self.device.draw_indexed(
            PrimitiveKind::Circle,
            self.circle_buffer.handle(),
            self.index_buffer.handle(),
            index_count,
        );
        self.record_draw(PrimitiveKind::Circle, self.circles.len(), reason);
        self.stats.vertices += self.circles.vertex_count() as u64;
        self.stats.indices += u64::from(index_count);
        self.circles.clear();
    }

    fn flush_lines(&mut self, reason: FlushReason) {
        if self.lines.is_empty() {
            return;
        }
        self.line_buffer.write(&mut self.device, self.lines.bytes());
        let vertex_count = self.lines.vertex_count() as u32;
        self.device.draw_lines(
            self.line_buffer.handle(),
            vertex_count,
            self.config.line_width,
        );
        self.record_draw(PrimitiveKind::Line, self.lines.len(), reason);
        self.stats.vertices += u64::from(vertex_count);
        self.lines.clear();
    }

    fn record_draw(&mut self, kind: PrimitiveKind, primitives: usize, reason: FlushReason) {
        self.stats.draw_calls += 1;
        match reason {
            FlushReason::Capacity => self.stats.capacity_flushes += 1,
            FlushReason::SlotsExhausted => self.stats.slot_flushes += 1,
            FlushReason::EndScene | FlushReason::Explicit => {}
        }
        log::trace!("flush {}: {primitives} primitives ({reason:?})", kind.name());
    }

    fn assert_in_scene(&self, op: &str) {
        assert!(self.in_scene, "{op} called outside begin_scene/end_scene");
    }

    // ── Quads ────────────────────────────────────────────────────────────

    /// An axis-aligned colored quad centered on `position`.
    pub fn draw_quad(&mut self, position: Vec3, size: Vec2, color: Color, entity_id: i32) {
        self.draw_quad_transform(&quad_matrix(position, size, 0.0), color, entity_id);
    }

    /// A colored quad rotated by `rotation` radians about its center.
    pub fn draw_rotated_quad(
        &mut self,
        position: Vec3,
        size: Vec2,
        rotation: f32,
        color: Color,
        entity_id: i32,
    ) {
        self.draw_quad_transform(&quad_matrix(position, size, rotation), color, entity_id);
    }

    /// An axis-aligned textured quad; `tiling` repeats the texture.
    pub fn draw_textured_quad(
        &mut self,
        position: Vec3,
        size: Vec2,
        texture: &Rc<Texture2D>,
        tiling: f32,
        tint: Color,
        entity_id: i32,
    ) {
        self.submit_quad(
            &quad_matrix(position, size, 0.0),
            Some(texture),
            Rect::FULL.corners(false, false),
            tiling,
            tint,
            entity_id,
        );
    }

    /// A textured quad rotated by `rotation` radians about its center.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_rotated_textured_quad(
        &mut self,
        position: Vec3,
        size: Vec2,
        rotation: f32,
        texture: &Rc<Texture2D>,
        tiling: f32,
        tint: Color,
        entity_id: i32,
    ) {
        self.submit_quad(
            &quad_matrix(position, size, rotation),
            Some(texture),
            Rect::FULL.corners(false, false),
            tiling,
            tint,
            entity_id,
        );
    }

    /// A colored unit quad transformed by `transform`.
    pub fn draw_quad_transform(&mut self, transform: &Mat4, color: Color, entity_id: i32) {
        self.submit_quad(
            transform,
            None,
            Rect::FULL.corners(false, false),
            1.0,
            color,
            entity_id,
        );
    }

    /// A textured unit quad transformed by `transform`, sampling `uv` of the
    /// texture. `None` or a missing texture draws with the white texture.
    pub fn draw_textured_quad_transform(
        &mut self,
        transform: &Mat4,
        texture: Option<&Rc<Texture2D>>,
        uv: Rect,
        tiling: f32,
        tint: Color,
        entity_id: i32,
    ) {
        self.submit_quad(
            transform,
            texture,
            uv.corners(false, false),
            tiling,
            tint,
            entity_id,
        );
    }

    /// A sprite component placed by `transform`.
    pub fn draw_sprite(&mut self, transform: &Mat4, sprite: &SpriteRenderer, entity: EntityId) {
        self.submit_quad(
            transform,
            sprite.texture.as_ref(),
            sprite.tex_rect.corners(sprite.flip_x, sprite.flip_y),
            sprite.tiling_factor,
            sprite.color,
            entity.pick_id(),
        );
    }

    fn submit_quad(
        &mut self,
        transform: &Mat4,
        texture: Option<&Rc<Texture2D>>,
        uvs: [[f32; 2]; 4],
        tiling: f32,
        tint: Color,
        entity_id: i32,
    ) {
        self.assert_in_scene("draw_quad");
        if self.quads.is_full() {
            self.flush_quads(FlushReason::Capacity);
        }
        let tex_index = self.texture_slot(texture) as i32;

        let color = tint.to_array();
        let vertices: [QuadVertex; 4] = std::array::from_fn(|i| QuadVertex {
            position: world_corner(transform, i),
            color,
            tex_coord: uvs[i],
            tex_index,
            tiling,
            entity_id,
        });
        self.quads.push(&vertices);
        self.stats.quads += 1;
    }

    fn texture_slot(&mut self, texture: Option<&Rc<Texture2D>>) -> usize {
        let slot = match texture {
            None => 0,
            Some(texture) => match self.slots.assign(texture) {
                Some(slot) => slot,
                None => {
                    self.flush_quads(FlushReason::SlotsExhausted);
                    self.slots.reset_with(texture)
                }
            },
        };
        self.slots.mark_used(slot);
        slot
    }

    // ── Circles ──────────────────────────────────────────────────────────

    /// A circle filling the unit quad transformed by `transform`.
    ///
    /// `thickness` is 1.0 for a filled disc and smaller for a ring; `fade`
    /// softens the edge.
    pub fn draw_circle(
        &mut self,
        transform: &Mat4,
        color: Color,
        thickness: f32,
        fade: f32,
        entity_id: i32,
    ) {
        self.assert_in_scene("draw_circle");
        if self.circles.is_full() {
            self.flush_circles(FlushReason::Capacity);
        }
        let color = color.to_array();
        let vertices: [CircleVertex; 4] = std::array::from_fn(|i| {
            let [x, y, z, _] = QUAD_CORNERS[i];
            CircleVertex {
                world_position: world_corner(transform, i),
                local_position: [x * 2.0, y * 2.0, z * 2.0],
                color,
                thickness,
                fade,
                entity_id,
            }
        });
        self.circles.push(&vertices);
        self.stats.circles += 1;
    }

    // ── Lines ────────────────────────────────────────────────────────────

    /// A world-space line segment.
    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color: Color, entity_id: i32) {
        self.assert_in_scene("draw_line");
        if self.lines.is_full() {
            self.flush_lines(FlushReason::Capacity);
        }
        let color = color.to_array();
        self.lines.push(&[
            LineVertex {
                position: from.to_array(),
                color,
                entity_id,
            },
            LineVertex {
                position: to.to_array(),
                color,
                entity_id,
            },
        ]);
        self.stats.lines += 1;
    }

    /// The outline of an axis-aligned rectangle centered on `position`.
    pub fn draw_rect(&mut self, position: Vec3, size: Vec2, color: Color, entity_id: i32) {
        self.draw_rect_transform(&quad_matrix(position, size, 0.0), color, entity_id);
    }

    /// The outline of the unit quad transformed by `transform`.
    pub fn draw_rect_transform(&mut self, transform: &Mat4, color: Color, entity_id: i32) {
        let corners: [Vec3; 4] = std::array::from_fn(|i| Vec3::from(world_corner(transform, i)));
        for i in 0..4 {
            self.draw_line(corners[i], corners[(i + 1) % 4], color, entity_id);
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Release every buffer and texture this renderer owns and return the
    /// device.
    ///
    /// Textures still held elsewhere (components, caches) can no longer be
    /// released once the renderer is gone; drop them first.
    pub fn dispose(self) -> D {
        let Self {
            mut device,
            quad_buffer,
            circle_buffer,
            line_buffer,
            index_buffer,
            slots,
            white,
            reclaim,
            in_scene,
            ..
        } = self;

        if in_scene {
            log::warn!("Renderer2D disposed inside a scene; pending primitives discarded");
        }
        drop(slots);
        drop(white);
        let dropped: Vec<TextureHandle> = reclaim.borrow_mut().drain(..).collect();
        for handle in dropped {
            device.release_texture(handle);
        }
        quad_buffer.release(&mut device);
        circle_buffer.release(&mut device);
        line_buffer.release(&mut device);
        index_buffer.release(&mut device);

        if Rc::weak_count(&reclaim) > 0 {
            log::warn!(
                "Renderer2D disposed while {} textures are still referenced",
                Rc::weak_count(&reclaim)
            );
        }
        device
    }
}

fn quad_matrix(position: Vec3, size: Vec2, rotation: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        size.extend(1.0),
        Quat::from_rotation_z(rotation),
        position,
    )
}

fn world_corner(transform: &Mat4, corner: usize) -> [f32; 3] {
    (*transform * Vec4::from_array(QUAD_CORNERS[corner]))
        .truncate()
        .to_array()
}
