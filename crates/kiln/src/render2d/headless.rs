//! # Headless — A Recording Device
//!
//! [`HeadlessDevice`] implements [`RenderDevice`] without a GPU. It keeps the
//! bytes written to each buffer, logs every call in order, and validates
//! handles the way a real driver's debug layer would:
//!
//! - using a released handle panics (`... used after release`),
//! - using a handle the device never created panics,
//! - writing past the end of a buffer panics,
//! - drawing from a buffer created for another primitive kind panics.
//!
//! Tests assert on the call log ([`calls`](HeadlessDevice::calls)) and the
//! counters derived from it; the `headless_frame` demo uses it to dump a
//! frame's worth of draw calls without opening a window.

use std::collections::{HashMap, HashSet};

use bytemuck::Pod;

use super::device::{BufferHandle, PrimitiveKind, RenderDevice, TextureHandle};
use crate::math::Mat4;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateVertexBuffer {
        buffer: BufferHandle,
        kind: PrimitiveKind,
        size: u64,
    },
    CreateIndexBuffer {
        buffer: BufferHandle,
        index_count: u32,
    },
    WriteBuffer {
        buffer: BufferHandle,
        bytes: usize,
    },
    ReleaseBuffer(BufferHandle),
    CreateTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    ReleaseTexture(TextureHandle),
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    SetViewProjection(Mat4),
    DrawIndexed {
        kind: PrimitiveKind,
        vertices: BufferHandle,
        index_count: u32,
    },
    DrawLines {
        vertices: BufferHandle,
        vertex_count: u32,
        width: f32,
    },
}

#[derive(Debug)]
enum BufferRole {
    Vertex(PrimitiveKind),
    Index(u32),
}

#[derive(Debug)]
struct BufferState {
    role: BufferRole,
    data: Vec<u8>,
    last_write: usize,
}

/// A [`RenderDevice`] that records instead of rendering.
#[derive(Debug)]
pub struct HeadlessDevice {
    max_texture_units: u32,
    next_handle: u32,
    buffers: HashMap<BufferHandle, BufferState>,
    textures: HashMap<TextureHandle, (u32, u32)>,
    released_buffers: HashSet<BufferHandle>,
    released_textures: HashSet<TextureHandle>,
    bound: HashMap<u32, TextureHandle>,
    view_proj: Mat4,
    calls: Vec<DeviceCall>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::with_texture_units(16)
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device reporting `units` texture units.
    pub fn with_texture_units(units: u32) -> Self {
        Self {
            max_texture_units: units,
            next_handle: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            released_buffers: HashSet::new(),
            released_textures: HashSet::new(),
            bound: HashMap::new(),
            view_proj: Mat4::IDENTITY,
            calls: Vec::new(),
        }
    }

    /// Every call since creation (or the last [`clear_calls`](Self::clear_calls)).
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Indexed and line draws.
    pub fn draw_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::DrawIndexed { .. } | DeviceCall::DrawLines { .. }))
            .count()
    }

    /// Index counts of each indexed draw of `kind`, in order.
    pub fn indexed_draws(&self, kind: PrimitiveKind) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed {
                    kind: k,
                    index_count,
                    ..
                } if *k == kind => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    pub fn texture_binds(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::BindTexture { .. }))
            .count()
    }

    /// Buffer writes, excluding buffer creation.
    pub fn uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::WriteBuffer { .. }))
            .count()
    }

    /// The vertices of the most recent write to `buffer`.
    pub fn uploaded_vertices<V: Pod>(&self, buffer: BufferHandle) -> Vec<V> {
        let state = self.buffer(buffer);
        state.data[..state.last_write]
            .chunks_exact(std::mem::size_of::<V>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// The texture bound to `unit`, if any.
    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.bound.get(&unit).copied()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_proj
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    /// Buffers created and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Textures created and not yet released.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn next(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn buffer(&self, buffer: BufferHandle) -> &BufferState {
        match self.buffers.get(&buffer) {
            Some(state) => state,
            None => self.reject_buffer(buffer),
        }
    }

    fn buffer_mut(&mut self, buffer: BufferHandle) -> &mut BufferState {
        let released = self.released_buffers.contains(&buffer);
        match self.buffers.get_mut(&buffer) {
            Some(state) => state,
            None if released => panic!("HeadlessDevice: buffer {buffer:?} used after release"),
            None => panic!("HeadlessDevice: unknown buffer {buffer:?}"),
        }
    }

    fn reject_buffer(&self, buffer: BufferHandle) -> ! {
        if self.released_buffers.contains(&buffer) {
            panic!("HeadlessDevice: buffer {buffer:?} used after release");
        }
        panic!("HeadlessDevice: unknown buffer {buffer:?}");
    }

    fn check_texture(&self, texture: TextureHandle) {
        if self.textures.contains_key(&texture) {
            return;
        }
        if self.released_textures.contains(&texture) {
            panic!("HeadlessDevice: texture {texture:?} used after release");
        }
        panic!("HeadlessDevice: unknown texture {texture:?}");
    }
}

impl RenderDevice for HeadlessDevice {
    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn create_vertex_buffer(&mut self, kind: PrimitiveKind, size: u64) -> BufferHandle {
        let buffer = BufferHandle(self.next());
        self.buffers.insert(
            buffer,
            BufferState {
                role: BufferRole::Vertex(kind),
                data: vec![0; size as usize],
                last_write: 0,
            },
        );
        self.calls
            .push(DeviceCall::CreateVertexBuffer { buffer, kind, size });
        buffer
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle {
        let buffer = BufferHandle(self.next());
        let data = bytemuck::cast_slice::<u32, u8>(indices).to_vec();
        self.buffers.insert(
            buffer,
            BufferState {
                role: BufferRole::Index(indices.len() as u32),
                last_write: data.len(),
                data,
            },
        );
        self.calls.push(DeviceCall::CreateIndexBuffer {
            buffer,
            index_count: indices.len() as u32,
        });
        buffer
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        let state = self.buffer_mut(buffer);
        assert!(
            data.len() <= state.data.len(),
            "HeadlessDevice: write of {} bytes overflows {buffer:?} ({} bytes)",
            data.len(),
            state.data.len()
        );
        state.data[..data.len()].copy_from_slice(data);
        state.last_write = data.len();
        self.calls.push(DeviceCall::WriteBuffer {
            buffer,
            bytes: data.len(),
        });
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffer(buffer);
        self.buffers.remove(&buffer);
        self.released_buffers.insert(buffer);
        self.calls.push(DeviceCall::ReleaseBuffer(buffer));
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle {
        assert_eq!(
            rgba.len(),
            (width * height * 4) as usize,
            "HeadlessDevice: texture data does not match {width}x{height} RGBA8"
        );
        let texture = TextureHandle(self.next());
        self.textures.insert(texture, (width, height));
        self.calls.push(DeviceCall::CreateTexture {
            texture,
            width,
            height,
        });
        texture
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.check_texture(texture);
        self.textures.remove(&texture);
        self.released_textures.insert(texture);
        self.bound.retain(|_, bound| *bound != texture);
        self.calls.push(DeviceCall::ReleaseTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        assert!(
            unit < self.max_texture_units,
            "HeadlessDevice: texture unit {unit} out of range (max {})",
            self.max_texture_units
        );
        self.check_texture(texture);
        self.bound.insert(unit, texture);
        self.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn set_view_projection(&mut self, view_proj: Mat4) {
        self.view_proj = view_proj;
        self.calls.push(DeviceCall::SetViewProjection(view_proj));
    }

    fn draw_indexed(
        &mut self,
        kind: PrimitiveKind,
        vertices: BufferHandle,
        indices: BufferHandle,
        index_count: u32,
    ) {
        match self.buffer(vertices).role {
            BufferRole::Vertex(k) if k == kind => {}
            ref role => panic!("HeadlessDevice: {vertices:?} is {role:?}, not a {kind:?} vertex buffer"),
        }
        match self.buffer(indices).role {
            BufferRole::Index(count) => assert!(
                index_count <= count,
                "HeadlessDevice: drawing {index_count} indices from a buffer of {count}"
            ),
            ref role => panic!("HeadlessDevice: {indices:?} is {role:?}, not an index buffer"),
        }
        self.calls.push(DeviceCall::DrawIndexed {
            kind,
            vertices,
            index_count,
        });
    }

    fn draw_lines(&mut self, vertices: BufferHandle, vertex_count: u32, width: f32) {
        match self.buffer(vertices).role {
            BufferRole::Vertex(PrimitiveKind::Line) => {}
            ref role => panic!("HeadlessDevice: {vertices:?} is {role:?}, not a line vertex buffer"),
        }
        self.calls.push(DeviceCall::DrawLines {
            vertices,
            vertex_count,
            width,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut device = HeadlessDevice::new();
        let vb = device.create_vertex_buffer(PrimitiveKind::Quad, 16);
        let ib = device.create_index_buffer(&[0, 1, 2]);
        device.write_buffer(vb, &[1, 2, 3, 4]);
        device.draw_indexed(PrimitiveKind::Quad, vb, ib, 3);

        assert_eq!(device.calls().len(), 4);
        assert_eq!(device.uploads(), 1);
        assert_eq!(device.draw_calls(), 1);
        assert_eq!(device.indexed_draws(PrimitiveKind::Quad), vec![3]);
    }

    #[test]
    fn uploaded_vertices_reflect_last_write() {
        let mut device = HeadlessDevice::new();
        let vb = device.create_vertex_buffer(PrimitiveKind::Line, 64);
        device.write_buffer(vb, bytemuck::cast_slice(&[1.0f32, 2.0, 3.0]));
        device.write_buffer(vb, bytemuck::cast_slice(&[9.0f32]));
        assert_eq!(device.uploaded_vertices::<f32>(vb), vec![9.0]);
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn write_after_release_panics() {
        let mut device = HeadlessDevice::new();
        let vb = device.create_vertex_buffer(PrimitiveKind::Quad, 16);
        device.release_buffer(vb);
        device.write_buffer(vb, &[0]);
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn bind_released_texture_panics() {
        let mut device = HeadlessDevice::new();
        let tex = device.create_texture(1, 1, &[255; 4]);
        device.release_texture(tex);
        device.bind_texture(0, tex);
    }

    #[test]
    #[should_panic(expected = "not a line vertex buffer")]
    fn draw_from_wrong_kind_panics() {
        let mut device = HeadlessDevice::new();
        let vb = device.create_vertex_buffer(PrimitiveKind::Quad, 16);
        device.draw_lines(vb, 2, 1.0);
    }

    #[test]
    fn release_unbinds_texture() {
        let mut device = HeadlessDevice::new();
        let tex = device.create_texture(2, 1, &[0; 8]);
        device.bind_texture(3, tex);
        assert_eq!(device.bound_texture(3), Some(tex));
        device.release_texture(tex);
        assert_eq!(device.bound_texture(3), None);
        assert_eq!(device.live_textures(), 0);
    }
}
