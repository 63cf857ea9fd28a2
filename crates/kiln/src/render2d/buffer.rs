//! # Buffer — Owned Device Buffers
//!
//! A [`GpuBuffer`] owns one device buffer handle. The device can't be reached
//! from `Drop`, so release is explicit: [`GpuBuffer::release`] consumes the
//! wrapper and frees the handle exactly once. A buffer dropped without release
//! is a leak; debug builds log it, release builds stay silent.
//!
//! ```text
//! GpuBuffer::vertex(device, Quad, 480_000, "quad vertices")
//!     │  write(device, bytes)   ← any number of times
//!     ▼
//! buffer.release(device)        ← handle gone, wrapper consumed
//! ```

use super::device::{BufferHandle, PrimitiveKind, RenderDevice};

#[derive(Debug)]
pub struct GpuBuffer {
    handle: Option<BufferHandle>,
    size: u64,
    label: &'static str,
}

impl GpuBuffer {
    /// A vertex buffer of `size` bytes for primitives of `kind`.
    pub fn vertex<D: RenderDevice + ?Sized>(
        device: &mut D,
        kind: PrimitiveKind,
        size: u64,
        label: &'static str,
    ) -> Self {
        Self {
            handle: Some(device.create_vertex_buffer(kind, size)),
            size,
            label,
        }
    }

    /// An index buffer filled with `indices`.
    pub fn index<D: RenderDevice + ?Sized>(
        device: &mut D,
        indices: &[u32],
        label: &'static str,
    ) -> Self {
        Self {
            handle: Some(device.create_index_buffer(indices)),
            size: std::mem::size_of_val(indices) as u64,
            label,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        match self.handle {
            Some(handle) => handle,
            None => panic!("GpuBuffer `{}` used after release", self.label),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Upload `data` to the start of the buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data` is larger than the buffer.
    pub fn write<D: RenderDevice + ?Sized>(&self, device: &mut D, data: &[u8]) {
        assert!(
            data.len() as u64 <= self.size,
            "GpuBuffer `{}`: write of {} bytes exceeds size {}",
            self.label,
            data.len(),
            self.size
        );
        device.write_buffer(self.handle(), data);
    }

    /// Free the device buffer.
    pub fn release<D: RenderDevice + ?Sized>(mut self, device: &mut D) {
        if let Some(handle) = self.handle.take() {
            device.release_buffer(handle);
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if !cfg!(debug_assertions) {
            return;
        }
        if let Some(handle) = self.handle {
            log::warn!(
                "GpuBuffer `{}` ({:?}) dropped without release; device memory leaked",
                self.label,
                handle
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render2d::HeadlessDevice;

    #[test]
    fn release_frees_exactly_once() {
        let mut device = HeadlessDevice::new();
        let buffer = GpuBuffer::vertex(&mut device, PrimitiveKind::Quad, 64, "test");
        assert_eq!(device.live_buffers(), 1);
        buffer.write(&mut device, &[0u8; 32]);
        buffer.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn index_buffer_size_in_bytes() {
        let mut device = HeadlessDevice::new();
        let buffer = GpuBuffer::index(&mut device, &[0, 1, 2, 2, 3, 0], "indices");
        assert_eq!(buffer.size(), 24);
        buffer.release(&mut device);
    }

    #[test]
    #[should_panic(expected = "exceeds size")]
    fn oversized_write_panics() {
        let mut device = HeadlessDevice::new();
        let buffer = GpuBuffer::vertex(&mut device, PrimitiveKind::Line, 8, "tiny");
        buffer.write(&mut device, &[0u8; 16]);
    }

    #[test]
    fn dropped_without_release_stays_live_on_device() {
        let mut device = HeadlessDevice::new();
        drop(GpuBuffer::vertex(&mut device, PrimitiveKind::Circle, 8, "leaky"));
        assert_eq!(device.live_buffers(), 1);
    }
}
