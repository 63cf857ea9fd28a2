//! # Context — The Entity Registry
//!
//! [`Context`] owns every live [`Entity`] and answers component queries over
//! them. Render systems and editor code receive `&Context` / `&mut Context`;
//! there is no global registry.
//!
//! ## Storage
//!
//! ```text
//! slots: Vec<Option<Entity>>        index: HashMap<EntityId, usize>
//!   [0] Some(#0 "camera")             #0 → 0
//!   [1] None        ← unregistered    #2 → 2
//!   [2] Some(#2 "player")             #3 → 3
//!   [3] Some(#3 "tree")
//! ```
//!
//! - **Insertion order** is the order of `slots`. Views walk it front to back,
//!   which makes equal-priority draw order deterministic.
//! - **O(1) lookup** goes through `index`.
//! - **Removal** leaves a tombstone (`None`) so other entities keep their slot
//!   index. Once tombstones outnumber live entities the vector is compacted
//!   and the index rebuilt, preserving relative order.
//!
//! ## Ids
//!
//! Ids come from a sequential allocator owned by the context. Registering an
//! entity built elsewhere with an explicit id bumps the allocator past it, so
//! later allocations can't collide. Registering an id that is already live is
//! a programming error: [`register`](Context::register) panics,
//! [`try_register`](Context::try_register) returns [`EcsError::DuplicateEntity`].
//! Ids above [`EntityId::MAX`] are refused with [`EcsError::IdOutOfRange`], and
//! once the allocator has handed out `EntityId::MAX`
//! [`try_allocate`](Context::try_allocate) reports [`EcsError::IdsExhausted`].
//!
//! ## Mutating While Iterating
//!
//! A [`View`] borrows the context, so the borrow checker already forbids
//! registering or unregistering mid-iteration. Callers that want to mutate the
//! registry based on a query take a [`snapshot`](Context::snapshot) of the
//! matching ids first.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use super::component::{Component, ComponentMap};
use super::entity::{ComponentObserver, Entity, EntityId, IdAllocator};
use super::view::{View, ViewSet};

/// Recoverable registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),
    #[error("entity id {0} is above EntityId::MAX")]
    IdOutOfRange(EntityId),
    #[error("entity ids are exhausted")]
    IdsExhausted,
}

// ── Context ──────────────────────────────────────────────────────────────

/// Insertion-ordered registry of live entities.
#[derive(Default)]
pub struct Context {
    slots: Vec<Option<Entity>>,
    index: HashMap<EntityId, usize>,
    ids: IdAllocator,
    observer: Option<Rc<dyn ComponentObserver>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose entities report every component insert to `observer`.
    ///
    /// The observer is attached to entities created by
    /// [`allocate`](Self::allocate) and [`spawn`](Self::spawn), and to
    /// registered entities that don't already carry one.
    pub fn with_observer(observer: impl ComponentObserver + 'static) -> Self {
        Self {
            observer: Some(Rc::new(observer)),
            ..Self::default()
        }
    }

    /// Create an entity with a fresh id, not yet registered.
    ///
    /// Use this to assemble an entity before handing it to
    /// [`register`](Self::register).
    ///
    /// # Panics
    ///
    /// Panics once every id up to [`EntityId::MAX`] has been handed out.
    pub fn allocate(&mut self, name: impl Into<String>) -> Entity {
        match self.try_allocate(name) {
            Ok(entity) => entity,
            Err(err) => panic!("Context::allocate: {err}"),
        }
    }

    /// Create an entity with a fresh id, or report that none are left.
    pub fn try_allocate(&mut self, name: impl Into<String>) -> Result<Entity, EcsError> {
        let id = self.ids.allocate().ok_or(EcsError::IdsExhausted)?;
        let mut entity = Entity::new(id, name);
        entity.set_observer(self.observer.clone());
        Ok(entity)
    }

    /// Create and register a named entity, returning a builder for adding
    /// components to it.
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityBuilder<'_> {
        let entity = self.allocate(name);
        let id = self.register(entity);
        EntityBuilder { ctx: self, id }
    }

    /// Add an entity to the live set.
    ///
    /// # Panics
    ///
    /// Panics if an entity with the same id is already registered, or if the
    /// id is above [`EntityId::MAX`].
    pub fn register(&mut self, entity: Entity) -> EntityId {
        match self.try_register(entity) {
            Ok(id) => id,
            Err(err) => panic!("Context::register: {err}"),
        }
    }

    /// Add an entity to the live set, or report a duplicate or out-of-range id.
    ///
    /// On error the entity is dropped.
    pub fn try_register(&mut self, mut entity: Entity) -> Result<EntityId, EcsError> {
        let id = entity.id();
        if id > EntityId::MAX {
            return Err(EcsError::IdOutOfRange(id));
        }
        if self.index.contains_key(&id) {
            return Err(EcsError::DuplicateEntity(id));
        }
        if !entity.has_observer() {
            entity.set_observer(self.observer.clone());
        }
        self.ids.reserve(id);
        self.index.insert(id, self.slots.len());
        self.slots.push(Some(entity));
        log::trace!("registered entity {id}");
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut()
    }

    /// Remove an entity from the live set and hand it back. Its components
    /// drop with it unless the caller keeps it.
    pub fn unregister(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.index.remove(&id)?;
        let entity = self.slots[slot].take();
        if self.slots.len() > 8 && self.index.len() * 2 < self.slots.len() {
            self.compact();
        }
        log::trace!("unregistered entity {id}");
        entity
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Every live entity, in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.slots.iter().flatten()
    }

    /// The first entity (in insertion order) with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities().find(|e| e.name() == name)
    }

    /// Lazily iterate every entity holding all of `Q`'s component types, in
    /// insertion order.
    ///
    /// ```ignore
    /// for (entity, (transform, sprite)) in ctx.view::<(Transform, SpriteRenderer)>() {
    ///     renderer.draw_sprite(&transform.matrix(), sprite, entity.id());
    /// }
    /// ```
    pub fn view<Q: ViewSet>(&self) -> View<'_, Q> {
        View::new(&self.slots)
    }

    /// Visit every entity holding all of `Q`'s component types with mutable
    /// access to those components, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names the same component type twice. If `f` panics, the
    /// components it was visiting are returned to their entity during unwind.
    pub fn view_mut<Q: ViewSet>(&mut self, mut f: impl FnMut(EntityId, Q::ItemMut<'_>)) {
        let required = Q::type_ids();
        for entity in self.slots.iter_mut().flatten() {
            if !entity.has_all(&required) {
                continue;
            }
            let id = entity.id();
            let taken = Q::take(&mut entity.components);
            let mut guard = PutBack::<Q> {
                taken: Some(taken),
                components: &mut entity.components,
            };
            if let Some(taken) = guard.taken.as_mut() {
                f(id, Q::fetch_mut(taken));
            }
        }
    }

    /// Ids of every entity currently matching `Q`, in insertion order.
    pub fn snapshot<Q: ViewSet>(&self) -> Vec<EntityId> {
        self.view::<Q>().map(|(entity, _)| entity.id()).collect()
    }

    /// Unregister every entity. The id allocator keeps counting.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (slot, entity) in self.slots.iter().enumerate() {
            if let Some(entity) = entity {
                self.index.insert(entity.id(), slot);
            }
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.len())
            .field("next_id", &self.ids.peek())
            .finish()
    }
}

/// Returns taken components to their map when dropped, including on unwind.
struct PutBack<'m, Q: ViewSet> {
    taken: Option<Q::Taken>,
    components: &'m mut ComponentMap,
}

impl<Q: ViewSet> Drop for PutBack<'_, Q> {
    fn drop(&mut self) {
        if let Some(taken) = self.taken.take() {
            Q::put_back(taken, self.components);
        }
    }
}

// ── EntityBuilder ────────────────────────────────────────────────────────

/// Builder for adding components to a freshly spawned entity.
///
/// ```ignore
/// let player = ctx
///     .spawn("player")
///     .insert(Transform::from_xy(0.0, 0.0))
///     .insert(SpriteRenderer::from_color(Color::GREEN))
///     .id();
/// ```
pub struct EntityBuilder<'c> {
    ctx: &'c mut Context,
    id: EntityId,
}

impl<'c> EntityBuilder<'c> {
    /// Add a component to this entity.
    pub fn insert<T: Component>(self, component: T) -> Self {
        if let Some(entity) = self.ctx.get_mut(self.id) {
            entity.insert(component);
        }
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::ComponentAdded;
    use std::cell::RefCell;

    #[derive(Debug, PartialEq)]
    struct A(u32);
    #[derive(Debug, PartialEq)]
    struct B(u32);
    struct C;

    fn ids<'a>(it: impl Iterator<Item = (&'a Entity, (&'a A, &'a B))>) -> Vec<EntityId> {
        it.map(|(e, _)| e.id()).collect()
    }

    #[test]
    fn view_yields_exactly_matching_entities_in_insertion_order() {
        let mut ctx = Context::new();
        let e0 = ctx.spawn("ab").insert(A(0)).insert(B(0)).id();
        let _e1 = ctx.spawn("a").insert(A(1)).id();
        let e2 = ctx.spawn("ba").insert(B(2)).insert(A(2)).id();
        let _e3 = ctx.spawn("b").insert(B(3)).id();
        let e4 = ctx.spawn("abc").insert(A(4)).insert(C).insert(B(4)).id();

        assert_eq!(ids(ctx.view::<(A, B)>()), vec![e0, e2, e4]);

        let values: Vec<_> = ctx.view::<(A, B)>().map(|(_, (a, b))| (a.0, b.0)).collect();
        assert_eq!(values, vec![(0, 0), (2, 2), (4, 4)]);
    }

    #[test]
    fn view_is_restartable_and_reflects_live_state() {
        let mut ctx = Context::new();
        let e0 = ctx.spawn("x").insert(A(0)).insert(B(0)).id();
        assert_eq!(ctx.view::<(A, B)>().count(), 1);
        assert_eq!(ctx.view::<(A, B)>().count(), 1);

        let e1 = ctx.spawn("y").insert(A(1)).id();
        assert_eq!(ctx.view::<(A, B)>().count(), 1);
        ctx.get_mut(e1).unwrap().insert(B(1));
        assert_eq!(ids(ctx.view::<(A, B)>()), vec![e0, e1]);

        ctx.unregister(e0);
        ctx.unregister(e1);
        assert_eq!(ctx.view::<(A, B)>().count(), 0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut ctx = Context::new();
        ctx.register(Entity::new(EntityId(5), "first"));
        let err = ctx.try_register(Entity::new(EntityId(5), "second"));
        assert_eq!(err, Err(EcsError::DuplicateEntity(EntityId(5))));
        assert_eq!(ctx.get(EntityId(5)).unwrap().name(), "first");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_register_panics() {
        let mut ctx = Context::new();
        ctx.register(Entity::new(EntityId(1), "a"));
        ctx.register(Entity::new(EntityId(1), "b"));
    }

    #[test]
    fn explicit_ids_bump_the_allocator() {
        let mut ctx = Context::new();
        ctx.register(Entity::new(EntityId(10), "explicit"));
        let next = ctx.spawn("auto").id();
        assert_eq!(next, EntityId(11));
    }

    #[test]
    fn ids_above_max_are_rejected_without_panicking() {
        let mut ctx = Context::new();
        let err = ctx.try_register(Entity::new(EntityId(u32::MAX), "too big"));
        assert_eq!(err, Err(EcsError::IdOutOfRange(EntityId(u32::MAX))));
        assert!(ctx.is_empty());
        assert_eq!(ctx.spawn("still fine").id(), EntityId(0));
    }

    #[test]
    fn registering_max_id_exhausts_allocation() {
        let mut ctx = Context::new();
        let last = ctx.register(Entity::new(EntityId::MAX, "last"));
        assert_eq!(ctx.get(last).unwrap().id().pick_id(), i32::MAX);
        assert_eq!(ctx.try_allocate("next").err(), Some(EcsError::IdsExhausted));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn spawn_past_max_panics() {
        let mut ctx = Context::new();
        ctx.register(Entity::new(EntityId::MAX, "last"));
        ctx.spawn("one too many");
    }

    #[test]
    fn get_unknown_id_is_none() {
        let ctx = Context::new();
        assert!(ctx.get(EntityId(3)).is_none());
        assert!(!ctx.contains(EntityId(3)));
    }

    #[test]
    fn unregister_returns_entity_and_drops_components_with_it() {
        let tracker = Rc::new(());
        let mut ctx = Context::new();
        let id = ctx.spawn("holder").insert(Rc::clone(&tracker)).id();
        assert_eq!(Rc::strong_count(&tracker), 2);

        let entity = ctx.unregister(id).unwrap();
        assert_eq!(entity.name(), "holder");
        assert!(ctx.unregister(id).is_none());
        drop(entity);
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert!(ctx.is_empty());
    }

    #[test]
    fn compaction_preserves_order_and_lookup() {
        let mut ctx = Context::new();
        let all: Vec<_> = (0..20).map(|i| ctx.spawn(format!("e{i}")).insert(A(i)).id()).collect();
        for id in all.iter().step_by(2).chain(all.iter().skip(1).step_by(4)) {
            ctx.unregister(*id);
        }
        let survivors: Vec<_> = ctx.entities().map(Entity::id).collect();
        let expected: Vec<_> = all.iter().copied().skip(3).step_by(4).collect();
        assert_eq!(survivors, expected);
        for id in &expected {
            assert_eq!(ctx.get(*id).unwrap().component::<A>().0, id.raw());
        }
    }

    #[test]
    fn view_mut_mutates_in_place() {
        let mut ctx = Context::new();
        ctx.spawn("p").insert(A(1)).insert(B(10));
        ctx.spawn("q").insert(A(2));

        let mut visited = Vec::new();
        ctx.view_mut::<(A, B)>(|id, (a, b)| {
            visited.push(id);
            a.0 += b.0;
            b.0 = 0;
        });

        assert_eq!(visited.len(), 1);
        let p = ctx.find_by_name("p").unwrap();
        assert_eq!(p.get::<A>(), Some(&A(11)));
        assert_eq!(p.get::<B>(), Some(&B(0)));
        assert_eq!(ctx.find_by_name("q").unwrap().get::<A>(), Some(&A(2)));
    }

    #[test]
    fn view_mut_returns_components_when_the_visitor_panics() {
        let mut ctx = Context::new();
        let id = ctx.spawn("p").insert(A(1)).insert(B(2)).id();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.view_mut::<(A, B)>(|_, (a, _)| {
                a.0 = 7;
                panic!("visitor failed");
            });
        }));
        assert!(result.is_err());

        let entity = ctx.get(id).unwrap();
        assert_eq!(entity.get::<A>(), Some(&A(7)));
        assert_eq!(entity.get::<B>(), Some(&B(2)));
        assert_eq!(ctx.view::<(A, B)>().count(), 1);
    }

    #[test]
    fn snapshot_allows_mutating_the_registry_afterwards() {
        let mut ctx = Context::new();
        ctx.spawn("doomed").insert(C);
        let keep = ctx.spawn("kept").id();
        ctx.spawn("doomed too").insert(C);

        for id in ctx.snapshot::<(C,)>() {
            ctx.unregister(id);
        }
        assert_eq!(ctx.len(), 1);
        assert!(ctx.contains(keep));
    }

    #[test]
    fn observer_sees_components_of_spawned_and_registered_entities() {
        let seen: Rc<RefCell<Vec<ComponentAdded>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let mut ctx = Context::with_observer(move |event: &ComponentAdded| {
            sink.borrow_mut().push(*event);
        });

        let spawned = ctx.spawn("s").insert(A(1)).insert(A(2)).id();
        let id = ctx.register(Entity::new(EntityId(50), "r"));
        ctx.get_mut(id).unwrap().insert(B(1));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].entity, spawned);
        assert!(seen[1].replaced);
        assert_eq!(seen[2].entity, EntityId(50));
        assert!(seen[2].type_name.ends_with("B"));
    }

    #[test]
    fn clear_empties_but_keeps_counting() {
        let mut ctx = Context::new();
        ctx.spawn("a");
        ctx.spawn("b");
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.spawn("c").id(), EntityId(2));
    }
}
