//! A data-oriented entity component system. See the `ecs` module for an
//! overview.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

extern crate fnv;
extern crate inlinable_string;
extern crate serde_json;
extern crate smallvec;

#[macro_use]
pub mod utils;
#[macro_use]
pub mod ecs;

pub mod errors;
pub mod settings;

pub mod prelude {
    pub use super::ecs::event::{ACTIVATED, ANY, DEACTIVATED, DELETED};
    pub use super::ecs::{
        BucketEvent, BucketId, BucketLayout, BucketListener, Component, ComponentId, Domain,
        Entity, Event, EventHandler, EventId, WeakEntity,
    };
    pub use super::errors::{Error, Result};
    pub use super::settings::DomainSettings;
}
