//! # Batch — CPU-Side Accumulation
//!
//! A [`PrimitiveBatch`] is a fixed-capacity vertex array for one primitive
//! kind. The renderer appends world-space vertices until the batch is full,
//! then uploads the live span in one write and draws it in one call.
//!
//! ```text
//! PrimitiveBatch<QuadVertex>   max_primitives = 3
//!   vertices: [q0 q0 q0 q0 | q1 q1 q1 q1 | ·  ·  ·  · ]
//!              ◄──── live span (uploaded) ───►  unused
//!   len() = 2, index_count() = 12
//! ```
//!
//! [`TextureSlots`] assigns textures to the fixed set of sampler slots a single
//! draw can use. Slot 0 always holds the 1x1 white texture, so untextured
//! quads sample white and multiply by their tint like everything else.
//!
//! ```text
//! slots: [white, grass.png, stone.png, ·, ·, ...]   max = 16
//!   assign(stone.png) → Some(2)   (already present)
//!   assign(water.png) → Some(3)   (next free slot)
//!   assign(x.png) when all 16 taken → None → renderer flushes
//! ```

use std::rc::Rc;

use bytemuck::Pod;

use super::device::PrimitiveKind;
use super::texture::Texture2D;

/// Fixed-capacity vertex storage for one primitive kind.
#[derive(Debug)]
pub struct PrimitiveBatch<V> {
    kind: PrimitiveKind,
    vertices: Vec<V>,
    max_primitives: usize,
}

impl<V: Pod> PrimitiveBatch<V> {
    pub fn new(kind: PrimitiveKind, max_primitives: usize) -> Self {
        Self {
            kind,
            vertices: Vec::with_capacity(max_primitives * kind.vertices_per_primitive()),
            max_primitives,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Primitives currently in the batch.
    pub fn len(&self) -> usize {
        self.vertices.len() / self.kind.vertices_per_primitive()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// True when one more primitive would overflow the batch.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_primitives
    }

    pub fn max_primitives(&self) -> usize {
        self.max_primitives
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.len() * self.kind.indices_per_primitive()
    }

    /// Bytes needed for a device buffer holding a full batch.
    pub fn buffer_size(&self) -> u64 {
        (self.max_primitives * self.kind.vertices_per_primitive() * std::mem::size_of::<V>())
            as u64
    }

    /// Append one primitive's vertices.
    ///
    /// # Panics
    ///
    /// Panics if the batch is full or `vertices` isn't exactly one primitive.
    /// The renderer flushes before either can happen.
    pub fn push(&mut self, vertices: &[V]) {
        assert_eq!(
            vertices.len(),
            self.kind.vertices_per_primitive(),
            "{} primitive needs {} vertices",
            self.kind.name(),
            self.kind.vertices_per_primitive()
        );
        assert!(
            !self.is_full(),
            "{} batch overflow: flush before appending past {} primitives",
            self.kind.name(),
            self.max_primitives
        );
        self.vertices.extend_from_slice(vertices);
    }

    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    /// The live span as raw bytes, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

/// Texture-to-slot assignment for the quad batch.
#[derive(Debug)]
pub struct TextureSlots {
    slots: Vec<Rc<Texture2D>>,
    used: Vec<bool>,
    max: usize,
}

impl TextureSlots {
    /// Slots with `white` in slot 0. `max` counts slot 0 and must be ≥ 2.
    pub fn new(white: Rc<Texture2D>, max: usize) -> Self {
        assert!(max >= 2, "need at least one texture slot besides white");
        Self {
            slots: vec![white],
            used: vec![false; max],
            max,
        }
    }

    /// The slot `texture` occupies, if any.
    pub fn find(&self, texture: &Texture2D) -> Option<usize> {
        self.slots.iter().position(|t| **t == *texture)
    }

    /// The slot for `texture`, taking the next free one if needed. `None`
    /// when every slot is taken by other textures.
    pub fn assign(&mut self, texture: &Rc<Texture2D>) -> Option<usize> {
        if let Some(slot) = self.find(texture) {
            return Some(slot);
        }
        if self.slots.len() == self.max {
            return None;
        }
        self.slots.push(Rc::clone(texture));
        Some(self.slots.len() - 1)
    }

    /// Back to `[white]`, with `texture` in slot 1.
    pub fn reset_with(&mut self, texture: &Rc<Texture2D>) -> usize {
        self.reset();
        self.slots.push(Rc::clone(texture));
        1
    }

    /// Drop every assignment except the white texture in slot 0.
    pub fn reset(&mut self) {
        self.slots.truncate(1);
        self.clear_used();
    }

    /// Record that the pending batch samples `slot`.
    pub fn mark_used(&mut self, slot: usize) {
        self.used[slot] = true;
    }

    pub fn clear_used(&mut self) {
        self.used.fill(false);
    }

    /// `(slot, texture)` for every slot the pending batch samples.
    pub fn used(&self) -> impl Iterator<Item = (usize, &Rc<Texture2D>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(slot, _)| self.used[*slot])
    }

    /// Assigned slots, including white.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.max
    }

    pub fn get(&self, slot: usize) -> Option<&Rc<Texture2D>> {
        self.slots.get(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render2d::device::TextureHandle;
    use crate::render2d::texture::ReclaimQueue;
    use crate::render2d::vertex::LineVertex;

    fn texture(queue: &ReclaimQueue, id: u32) -> Rc<Texture2D> {
        Rc::new(Texture2D::new(TextureHandle(id), 1, 1, None, queue))
    }

    #[test]
    fn batch_counts_and_fills() {
        let mut batch = PrimitiveBatch::<LineVertex>::new(PrimitiveKind::Line, 2);
        let v = LineVertex {
            position: [0.0; 3],
            color: [1.0; 4],
            entity_id: -1,
        };
        batch.push(&[v, v]);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_full());
        batch.push(&[v, v]);
        assert!(batch.is_full());
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(batch.bytes().len(), 4 * 32);
        assert_eq!(batch.buffer_size(), 2 * 2 * 32);
        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    #[should_panic(expected = "batch overflow")]
    fn push_past_capacity_panics() {
        let mut batch = PrimitiveBatch::<LineVertex>::new(PrimitiveKind::Line, 1);
        let v = LineVertex {
            position: [0.0; 3],
            color: [1.0; 4],
            entity_id: -1,
        };
        batch.push(&[v, v]);
        batch.push(&[v, v]);
    }

    #[test]
    fn slots_reuse_then_exhaust() {
        let queue = ReclaimQueue::default();
        let white = texture(&queue, 0);
        let mut slots = TextureSlots::new(Rc::clone(&white), 3);
        let a = texture(&queue, 1);
        let b = texture(&queue, 2);
        let c = texture(&queue, 3);

        assert_eq!(slots.assign(&white), Some(0));
        assert_eq!(slots.assign(&a), Some(1));
        assert_eq!(slots.assign(&a), Some(1));
        assert_eq!(slots.assign(&b), Some(2));
        assert!(slots.is_full());
        assert_eq!(slots.assign(&c), None);

        assert_eq!(slots.reset_with(&c), 1);
        assert_eq!(slots.find(&c), Some(1));
        assert_eq!(slots.find(&a), None);
    }

    #[test]
    fn used_tracks_only_marked_slots() {
        let queue = ReclaimQueue::default();
        let mut slots = TextureSlots::new(texture(&queue, 0), 4);
        let a = texture(&queue, 1);
        let b = texture(&queue, 2);
        slots.assign(&a);
        let b_slot = slots.assign(&b).unwrap();
        slots.mark_used(b_slot);

        let used: Vec<_> = slots.used().map(|(slot, t)| (slot, t.handle())).collect();
        assert_eq!(used, vec![(2, TextureHandle(2))]);
        slots.clear_used();
        assert_eq!(slots.used().count(), 0);
    }
}
