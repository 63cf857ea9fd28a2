//! # View — Querying Entities by Component Combination
//!
//! A view selects every registered entity that has **all** of a set of
//! component types, in registry insertion order:
//!
//! ```text
//! for (entity, (transform, sprite)) in ctx.view::<(Transform, SpriteRenderer)>() {
//!     // every entity holding both, oldest registration first
//! }
//!
//! 1. Compute TypeIds: [TypeId::of::<Transform>(), TypeId::of::<SpriteRenderer>()]
//! 2. Walk the registry in insertion order
//!    - Does the entity hold every TypeId? (Entity::has_all)
//!    - If yes, downcast each component and yield the tuple
//! ```
//!
//! A view is a query, not a cached index. Nothing is materialized up front:
//! each call to [`Context::view`](super::context::Context::view) re-scans the
//! live registry, and the returned [`View`] filters lazily as it is iterated.
//!
//! ## Shared vs. Mutable
//!
//! Shared views are ordinary iterators, because `&A` and `&B` borrowed from
//! the same entity never conflict. Mutable access can't be expressed as an
//! `Iterator` (the yielded `&mut` would have to borrow from the iterator), so
//! [`Context::view_mut`](super::context::Context::view_mut) is closure-based:
//! the requested components are taken out of the entity's map, handed to the
//! closure, and put back, also when the closure panics.
//!
//! ## The `ViewSet` Trait
//!
//! Implemented for tuples of 1 to 8 component types, so
//! `view::<(Transform,)>()` and `view::<(Transform, CameraComponent)>()` both
//! work. Listing the same type twice is fine for shared views and panics for
//! mutable views (two `&mut` to one component).
//!
//! ## Comparison
//!
//! - **hecs / bevy_ecs**: `Query<(&A, &mut B)>` over archetype tables; order
//!   follows archetype layout, not spawn order.
//! - **EnTT (C++)**: `registry.view<A, B>()` iterates the smallest pool.
//! - **kiln**: registry-order scan, so equal-priority draws are deterministic.

use std::any::TypeId;
use std::marker::PhantomData;

use super::component::{Component, ComponentMap, TakenComponent};
use super::entity::Entity;

/// A set of component types that can be viewed together.
pub trait ViewSet {
    /// Shared references to each component.
    type Item<'a>;
    /// Exclusive references to each component.
    type ItemMut<'a>;
    /// Components taken out of an entity for a mutable visit.
    type Taken;

    /// The component types this set requires.
    fn type_ids() -> Vec<TypeId>;

    /// Borrow every component, or `None` if any is missing.
    fn fetch(components: &ComponentMap) -> Option<Self::Item<'_>>;

    /// Take every component out of the map.
    ///
    /// # Panics
    ///
    /// Panics if a component is missing (callers check membership first) or
    /// the same type is listed twice.
    fn take(components: &mut ComponentMap) -> Self::Taken;

    /// Borrow the taken components mutably.
    fn fetch_mut(taken: &mut Self::Taken) -> Self::ItemMut<'_>;

    /// Return taken components to the map.
    fn put_back(taken: Self::Taken, components: &mut ComponentMap);
}

/// One typed component taken out of a [`ComponentMap`].
pub struct Taken<T> {
    inner: TakenComponent,
    _marker: PhantomData<T>,
}

impl<T: Component> Taken<T> {
    fn from_map(components: &mut ComponentMap) -> Self {
        let inner = components.take(TypeId::of::<T>()).unwrap_or_else(|| {
            panic!(
                "mutable view: `{}` missing or requested twice",
                std::any::type_name::<T>()
            )
        });
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut::<T>()
    }

    fn put_back(self, components: &mut ComponentMap) {
        components.put_back(self.inner);
    }
}

macro_rules! impl_view_set_tuple {
    ($($T:ident),+) => {
        impl<$($T: Component),+> ViewSet for ($($T,)+) {
            type Item<'a> = ($(&'a $T,)+);
            type ItemMut<'a> = ($(&'a mut $T,)+);
            type Taken = ($(Taken<$T>,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$T>()),+]
            }

            fn fetch(components: &ComponentMap) -> Option<Self::Item<'_>> {
                Some(($(components.get::<$T>()?,)+))
            }

            fn take(components: &mut ComponentMap) -> Self::Taken {
                ($(Taken::<$T>::from_map(components),)+)
            }

            #[allow(non_snake_case)]
            fn fetch_mut(taken: &mut Self::Taken) -> Self::ItemMut<'_> {
                let ($($T,)+) = taken;
                ($($T.get_mut(),)+)
            }

            #[allow(non_snake_case)]
            fn put_back(taken: Self::Taken, components: &mut ComponentMap) {
                let ($($T,)+) = taken;
                $($T.put_back(components);)+
            }
        }
    };
}

impl_view_set_tuple!(A);
impl_view_set_tuple!(A, B);
impl_view_set_tuple!(A, B, C);
impl_view_set_tuple!(A, B, C, D);
impl_view_set_tuple!(A, B, C, D, E);
impl_view_set_tuple!(A, B, C, D, E, F);
impl_view_set_tuple!(A, B, C, D, E, F, G);
impl_view_set_tuple!(A, B, C, D, E, F, G, H);

/// Lazy iterator over `(entity, components)` for every registered entity
/// holding all of `Q`'s types, in insertion order.
///
/// Created by [`Context::view`](super::context::Context::view).
pub struct View<'c, Q: ViewSet> {
    slots: std::slice::Iter<'c, Option<Entity>>,
    required: Vec<TypeId>,
    _marker: PhantomData<Q>,
}

impl<'c, Q: ViewSet> View<'c, Q> {
    pub(crate) fn new(slots: &'c [Option<Entity>]) -> Self {
        Self {
            slots: slots.iter(),
            required: Q::type_ids(),
            _marker: PhantomData,
        }
    }
}

impl<'c, Q: ViewSet> Iterator for View<'c, Q> {
    type Item = (&'c Entity, Q::Item<'c>);

    fn next(&mut self) -> Option<Self::Item> {
        for entity in self.slots.by_ref().flatten() {
            if !entity.has_all(&self.required) {
                continue;
            }
            if let Some(item) = Q::fetch(&entity.components) {
                return Some((entity, item));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.slots.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct A(u8);
    #[derive(Debug, PartialEq)]
    struct B(u8);

    #[test]
    fn fetch_requires_every_type() {
        let mut map = ComponentMap::new();
        map.insert(A(1));
        assert!(<(A, B)>::fetch(&map).is_none());
        map.insert(B(2));
        let (a, b) = <(A, B)>::fetch(&map).unwrap();
        assert_eq!((a, b), (&A(1), &B(2)));
    }

    #[test]
    fn take_mutate_put_back() {
        let mut map = ComponentMap::new();
        map.insert(A(1));
        map.insert(B(2));
        let mut taken = <(A, B)>::take(&mut map);
        {
            let (a, b) = <(A, B)>::fetch_mut(&mut taken);
            a.0 += 10;
            b.0 += 20;
        }
        <(A, B)>::put_back(taken, &mut map);
        assert_eq!(map.get::<A>(), Some(&A(11)));
        assert_eq!(map.get::<B>(), Some(&B(22)));
    }

    #[test]
    #[should_panic(expected = "requested twice")]
    fn duplicate_type_in_mutable_view_panics() {
        let mut map = ComponentMap::new();
        map.insert(A(1));
        let _ = <(A, A)>::take(&mut map);
    }

    #[test]
    fn type_ids_preserve_order() {
        assert_eq!(
            <(B, A)>::type_ids(),
            vec![TypeId::of::<B>(), TypeId::of::<A>()]
        );
    }
}
