//! # Entity Registry and Component Views
//!
//! A small entity-component store built for draw-order determinism rather
//! than raw iteration speed. Each entity owns a map of its components; the
//! [`Context`] keeps entities in insertion order and answers "every entity
//! with A and B" queries by scanning that order.
//!
//! ## Module Overview
//!
//! - [`entity`] — Sequential ids, the `Entity` record, component-added observer
//! - [`component`] — Type-erased per-entity storage (`Box<dyn Any>` by `TypeId`)
//! - [`view`] — `ViewSet` tuples and the lazy `View` iterator
//! - [`context`] — The registry: register, lookup, views, snapshots

pub mod component;
pub mod context;
pub mod entity;
pub mod view;

pub use component::{Component, ComponentMap};
pub use context::{Context, EcsError, EntityBuilder};
pub use entity::{ComponentAdded, ComponentObserver, Entity, EntityId};
pub use view::{View, ViewSet};
