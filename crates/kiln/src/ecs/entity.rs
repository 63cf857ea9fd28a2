//! # Entity — Identity Plus an Owned Component Set
//!
//! An [`Entity`] is an integer [`EntityId`], a display name, and the
//! [`ComponentMap`] it exclusively owns. When the entity is dropped (for
//! example after [`Context::unregister`](super::context::Context::unregister)),
//! its components die with it.
//!
//! ## Identity
//!
//! Two `Entity` values with the same id are the same entity: `PartialEq`,
//! `Eq` and `Hash` look only at the id, never at the components.
//!
//! ## Sequential IDs
//!
//! Ids come from an [`IdAllocator`], a monotonically increasing counter.
//! Ids are never recycled within a context, so a stale `EntityId` simply fails
//! to resolve instead of aliasing a newer entity.
//!
//! ```text
//! IdAllocator { next: 3 }
//!   allocate()      → EntityId(3), next = 4
//!   reserve(Id(10)) →              next = 11   (explicitly registered id)
//!   allocate()      → EntityId(11)
//! ```
//!
//! Ids stop at [`EntityId::MAX`] (`i32::MAX`) so every id fits the signed
//! entity attachment used for mouse picking, where `-1` means "no entity".
//! Past that the allocator reports exhaustion instead of wrapping.
//!
//! ## Component-Added Notification
//!
//! Render-system registration hooks want to know when a component appears on
//! an entity. Rather than a global event bus, an entity carries an optional
//! [`ComponentObserver`] injected by the context that created it.
//! [`Entity::insert`] also returns the value it replaced, so callers that only
//! care about their own insert don't need an observer at all.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use super::component::{Component, ComponentMap};

/// Integer identity of an entity. Stable for the entity's lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The largest id a context will hand out or accept.
    pub const MAX: EntityId = EntityId(i32::MAX as u32);

    /// The raw integer id.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The id as carried in vertex data for mouse picking.
    ///
    /// # Panics
    ///
    /// Panics if the id is above [`EntityId::MAX`]. Registered ids never are.
    pub fn pick_id(self) -> i32 {
        match i32::try_from(self.0) {
            Ok(id) => id,
            Err(_) => panic!("EntityId::pick_id: {self} exceeds {}", EntityId::MAX),
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequential entity id factory.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id, or `None` once [`EntityId::MAX`] has been used.
    pub fn allocate(&mut self) -> Option<EntityId> {
        let id = EntityId(self.next);
        if id > EntityId::MAX {
            return None;
        }
        self.next += 1;
        Some(id)
    }

    /// Make sure future allocations never collide with `id`, which was chosen
    /// by the caller (for example when an entity is registered directly).
    pub fn reserve(&mut self, id: EntityId) {
        if id.0 >= self.next {
            self.next = id.0.saturating_add(1);
        }
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> EntityId {
        EntityId(self.next)
    }
}

/// Event delivered to a [`ComponentObserver`] after a component insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentAdded {
    pub entity: EntityId,
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// True if the insert overwrote an existing component of the same type.
    pub replaced: bool,
}

/// Receives component-added notifications for every entity of a context.
pub trait ComponentObserver {
    fn component_added(&self, event: &ComponentAdded);
}

/// Any `Fn(&ComponentAdded)` closure is an observer.
impl<F: Fn(&ComponentAdded)> ComponentObserver for F {
    fn component_added(&self, event: &ComponentAdded) {
        (self)(event);
    }
}

/// An entity: id, display name and its exclusively-owned components.
pub struct Entity {
    id: EntityId,
    name: String,
    pub(crate) components: ComponentMap,
    observer: Option<Rc<dyn ComponentObserver>>,
}

impl Entity {
    /// Create a free-standing entity with an explicit id.
    ///
    /// Prefer [`Context::allocate`](super::context::Context::allocate) or
    /// [`Context::spawn`](super::context::Context::spawn), which pick an
    /// unused id for you.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            components: ComponentMap::new(),
            observer: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Attach a component, replacing any existing one of the same type.
    ///
    /// Returns the replaced value and notifies the entity's observer.
    pub fn insert<T: Component>(&mut self, component: T) -> Option<T> {
        let previous = self.components.insert(component);
        if let Some(observer) = &self.observer {
            observer.component_added(&ComponentAdded {
                entity: self.id,
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                replaced: previous.is_some(),
            });
        }
        previous
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Component>(mut self, component: T) -> Self {
        self.insert(component);
        self
    }

    /// The component of type `T`, or `None` if the entity lacks it.
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components.get::<T>()
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components.get_mut::<T>()
    }

    /// The component of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity lacks it. Check with [`has`](Self::has) first, or
    /// use [`get`](Self::get).
    pub fn component<T: Component>(&self) -> &T {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "entity {} ({:?}) has no `{}` component",
                self.id,
                self.name,
                std::any::type_name::<T>()
            )
        })
    }

    /// Remove and return the component of type `T`. No-op if absent.
    pub fn remove<T: Component>(&mut self) -> Option<T> {
        self.components.remove::<T>()
    }

    pub fn has<T: Component>(&self) -> bool {
        self.components.contains(TypeId::of::<T>())
    }

    /// True only if the entity holds every listed type.
    pub fn has_all(&self, type_ids: &[TypeId]) -> bool {
        self.components.contains_all(type_ids)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &ComponentMap {
        &self.components
    }

    pub(crate) fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    pub(crate) fn set_observer(&mut self, observer: Option<Rc<dyn ComponentObserver>>) {
        self.observer = observer;
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.components)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq)]
    struct Position(f32, f32);
    struct Marker;

    #[test]
    fn allocate_sequential() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), Some(EntityId(0)));
        assert_eq!(ids.allocate(), Some(EntityId(1)));
        assert_eq!(ids.peek(), EntityId(2));
    }

    #[test]
    fn reserve_skips_past_explicit_ids() {
        let mut ids = IdAllocator::new();
        ids.reserve(EntityId(10));
        assert_eq!(ids.allocate(), Some(EntityId(11)));
        ids.reserve(EntityId(3));
        assert_eq!(ids.allocate(), Some(EntityId(12)));
    }

    #[test]
    fn allocator_stops_at_max_instead_of_wrapping() {
        let mut ids = IdAllocator::new();
        ids.reserve(EntityId(EntityId::MAX.0 - 1));
        assert_eq!(ids.allocate(), Some(EntityId::MAX));
        assert_eq!(ids.allocate(), None);
        assert_eq!(ids.allocate(), None);

        let mut ids = IdAllocator::new();
        ids.reserve(EntityId(u32::MAX));
        assert_eq!(ids.peek(), EntityId(u32::MAX));
        assert_eq!(ids.allocate(), None);
    }

    #[test]
    fn pick_id_covers_the_whole_id_range() {
        assert_eq!(EntityId(0).pick_id(), 0);
        assert_eq!(EntityId::MAX.pick_id(), i32::MAX);
        assert_ne!(EntityId::MAX.pick_id(), -1);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn pick_id_above_max_panics() {
        EntityId(EntityId::MAX.0 + 1).pick_id();
    }

    #[test]
    fn insert_twice_keeps_one_instance_last_write_wins() {
        let mut e = Entity::new(EntityId(1), "player");
        assert!(e.insert(Position(1.0, 1.0)).is_none());
        let old = e.insert(Position(5.0, 6.0));
        assert_eq!(old, Some(Position(1.0, 1.0)));
        assert_eq!(e.get::<Position>(), Some(&Position(5.0, 6.0)));
        assert_eq!(e.component_count(), 1);
    }

    #[test]
    fn has_all_checks_every_type() {
        let e = Entity::new(EntityId(1), "e").with(Position(0.0, 0.0));
        let wanted = [TypeId::of::<Position>(), TypeId::of::<Marker>()];
        assert!(!e.has_all(&wanted));
        let e = e.with(Marker);
        assert!(e.has_all(&wanted));
        assert!(e.has::<Marker>());
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut e = Entity::new(EntityId(1), "e");
        assert!(e.remove::<Marker>().is_none());
        assert_eq!(e.component_count(), 0);
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn component_on_missing_type_panics() {
        let e = Entity::new(EntityId(4), "empty");
        e.component::<Position>();
    }

    #[test]
    fn identity_is_by_id() {
        let a = Entity::new(EntityId(7), "a").with(Marker);
        let b = Entity::new(EntityId(7), "b");
        let c = Entity::new(EntityId(8), "a");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        assert!(set.insert(c));
    }

    #[test]
    fn observer_sees_inserts_and_replacements() {
        let seen: Rc<RefCell<Vec<ComponentAdded>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let observer: Rc<dyn ComponentObserver> =
            Rc::new(move |event: &ComponentAdded| sink.borrow_mut().push(*event));

        let mut e = Entity::new(EntityId(2), "watched");
        e.set_observer(Some(observer));
        e.insert(Position(0.0, 0.0));
        e.insert(Position(1.0, 0.0));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].entity, EntityId(2));
        assert_eq!(seen[0].type_id, TypeId::of::<Position>());
        assert!(!seen[0].replaced);
        assert!(seen[1].replaced);
    }
}
