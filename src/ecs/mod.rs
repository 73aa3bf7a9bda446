//! Entity Component System (ECS)
//!
//! A `Domain` owns entities, their components, the buckets grouping entities
//! by the components they own, and the event handlers observing them.
//!
//! ```
//! #[macro_use]
//! extern crate entity_domain;
//!
//! use entity_domain::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Position(f32, f32);
//! #[derive(Debug, Clone, Default)]
//! struct Velocity(f32, f32);
//! declare_component!(Position, Velocity);
//!
//! fn main() {
//!     let mut domain = Domain::new();
//!     domain.bucket::<(Position, Velocity), ()>();
//!
//!     let e1 = domain.create_entity();
//!     domain.add_with(e1, Position(0.0, 0.0)).unwrap();
//!     domain.add_with(e1, Velocity(1.0, 0.0)).unwrap();
//!     domain.activate(e1);
//!
//!     let view = domain.view::<(Position, Velocity), ()>().unwrap();
//!     for (_, (p, v), ()) in view.entries() {
//!         assert_eq!(p.0 + v.0, 1.0);
//!     }
//! }
//! ```

#[macro_use]
pub mod component;
pub mod bitset;
pub mod bucket;
pub mod domain;
pub mod entity;
pub mod event;
pub mod factory;
pub mod weak;

pub use self::bitset::{BitSet, MAX_COMPONENTS};
pub use self::bucket::{
    Bucket, BucketEvent, BucketId, BucketLayout, BucketListener, BucketSlot, BucketView,
    ListenerHandle,
};
pub use self::component::{Component, ComponentId, ComponentSet};
pub use self::domain::Domain;
pub use self::entity::Entity;
pub use self::event::{Event, EventHandler, EventId, HandlerHandle};
pub use self::factory::{ComponentFactory, ComponentHandle};
pub use self::weak::WeakEntity;
