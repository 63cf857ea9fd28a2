//! # Component — Per-Entity Type-Erased Storage
//!
//! Components are plain data: a `Transform`, a `SpriteRenderer`, a
//! `CameraComponent`. They carry no behavior of their own; systems read and
//! write them. The only thing the store needs to know about a component is
//! its type, because an entity holds **at most one instance per type**.
//!
//! ## Layout
//!
//! Each [`Entity`](super::entity::Entity) owns one [`ComponentMap`]:
//!
//! ```text
//! ComponentMap
//!   slots: HashMap<TypeId, Slot>
//!     TypeId(Transform)      → Slot { value: Box<Transform>,      name }
//!     TypeId(SpriteRenderer) → Slot { value: Box<SpriteRenderer>, name }
//! ```
//!
//! The `TypeId` key is computed at compile time from the Rust type, so there is
//! no string or reflection lookup on the hot path, and the "one per type"
//! invariant falls out of the map's key uniqueness: inserting a second value of
//! the same type replaces the first.
//!
//! ## Why `Box<dyn Any>`?
//!
//! The set of component types is open (users define their own), so the store
//! can't be a `Vec<T>` or an enum. Boxing each value and downcasting on access
//! costs one allocation per component but needs **zero unsafe code**.
//!
//! ## Take / Put Back
//!
//! Mutable multi-component views need several `&mut` into the same map at
//! once, which the borrow checker can't prove disjoint. The view temporarily
//! [`take`](ComponentMap::take)s the boxes it needs out of the map, hands out
//! `&mut` into the owned boxes, then [`put_back`](ComponentMap::put_back)s them.
//!
//! ## Comparison
//!
//! - **hecs / bevy_ecs**: archetype tables of raw bytes. Fast iteration, lots
//!   of unsafe, and no stable per-entity insertion order.
//! - **kiln**: one small map per entity. Iteration follows registry order,
//!   which keeps draw order deterministic.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Marker trait for component types.
///
/// Blanket-implemented for every `'static` type, so plain structs can be
/// attached to entities without any derive. The pipeline is single-threaded,
/// so components are free to hold `Rc` handles (textures, for instance).
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// One stored component plus its type name (for diagnostics and panics).
struct Slot {
    value: Box<dyn Any>,
    name: &'static str,
}

/// A boxed component removed from a [`ComponentMap`] with
/// [`take`](ComponentMap::take), to be returned with
/// [`put_back`](ComponentMap::put_back).
pub struct TakenComponent {
    type_id: TypeId,
    slot: Slot,
}

impl TakenComponent {
    /// Downcast to the concrete component type.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the type this component was stored as.
    pub fn get_mut<T: Component>(&mut self) -> &mut T {
        let name = self.slot.name;
        self.slot.value.downcast_mut::<T>().unwrap_or_else(|| {
            panic!(
                "component type mismatch: slot holds `{}`, requested `{}`",
                name,
                std::any::type_name::<T>()
            )
        })
    }

    /// The `TypeId` the component was stored under.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// The component set of a single entity: at most one value per type.
#[derive(Default)]
pub struct ComponentMap {
    slots: HashMap<TypeId, Slot>,
}

impl ComponentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, returning the previous value of the same type if
    /// there was one (last write wins).
    pub fn insert<T: Component>(&mut self, value: T) -> Option<T> {
        let previous = self.slots.insert(
            TypeId::of::<T>(),
            Slot {
                value: Box::new(value),
                name: std::any::type_name::<T>(),
            },
        )?;
        previous.value.downcast::<T>().ok().map(|b| *b)
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_mut::<T>())
    }

    /// Remove and return the component of type `T`. No-op if absent.
    pub fn remove<T: Component>(&mut self) -> Option<T> {
        let slot = self.slots.remove(&TypeId::of::<T>())?;
        slot.value.downcast::<T>().ok().map(|b| *b)
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.slots.contains_key(&type_id)
    }

    /// True only if every listed type is present.
    pub fn contains_all(&self, type_ids: &[TypeId]) -> bool {
        type_ids.iter().all(|tid| self.slots.contains_key(tid))
    }

    /// Temporarily remove a component for exclusive access. Pair with
    /// [`put_back`](Self::put_back).
    pub fn take(&mut self, type_id: TypeId) -> Option<TakenComponent> {
        let slot = self.slots.remove(&type_id)?;
        Some(TakenComponent { type_id, slot })
    }

    /// Return a component removed with [`take`](Self::take).
    pub fn put_back(&mut self, taken: TakenComponent) {
        self.slots.insert(taken.type_id, taken.slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Type names of every stored component, in no particular order.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.values().map(|slot| slot.name)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.slots.keys().copied()
    }
}

impl std::fmt::Debug for ComponentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.type_names().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    #[derive(Debug, PartialEq)]
    struct Speed(f32);

    #[test]
    fn insert_and_get() {
        let mut map = ComponentMap::new();
        assert!(map.insert(Health(10)).is_none());
        assert!(map.insert(Speed(2.5)).is_none());
        assert_eq!(map.get::<Health>(), Some(&Health(10)));
        assert_eq!(map.get::<Speed>(), Some(&Speed(2.5)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn second_insert_replaces_and_returns_previous() {
        let mut map = ComponentMap::new();
        map.insert(Health(10));
        let previous = map.insert(Health(99));
        assert_eq!(previous, Some(Health(10)));
        assert_eq!(map.get::<Health>(), Some(&Health(99)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut map = ComponentMap::new();
        map.insert(Health(1));
        assert_eq!(map.remove::<Speed>(), None);
        assert_eq!(map.remove::<Health>(), Some(Health(1)));
        assert!(map.is_empty());
    }

    #[test]
    fn contains_all_requires_every_type() {
        let mut map = ComponentMap::new();
        map.insert(Health(1));
        let both = [TypeId::of::<Health>(), TypeId::of::<Speed>()];
        assert!(!map.contains_all(&both));
        map.insert(Speed(1.0));
        assert!(map.contains_all(&both));
        assert!(map.contains_all(&[]));
    }

    #[test]
    fn take_and_put_back() {
        let mut map = ComponentMap::new();
        map.insert(Health(5));
        let mut taken = map.take(TypeId::of::<Health>()).unwrap();
        assert!(!map.contains(TypeId::of::<Health>()));
        taken.get_mut::<Health>().0 += 1;
        map.put_back(taken);
        assert_eq!(map.get::<Health>(), Some(&Health(6)));
    }

    #[test]
    #[should_panic(expected = "component type mismatch")]
    fn taken_downcast_mismatch_panics() {
        let mut map = ComponentMap::new();
        map.insert(Health(5));
        let mut taken = map.take(TypeId::of::<Health>()).unwrap();
        taken.get_mut::<Speed>();
    }

    #[test]
    fn drop_called_on_replace_and_remove() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut map = ComponentMap::new();
        map.insert(Rc::clone(&tracker));
        assert_eq!(Rc::strong_count(&tracker), 2);
        drop(map.insert(Rc::clone(&tracker)));
        assert_eq!(Rc::strong_count(&tracker), 2);
        drop(map);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
