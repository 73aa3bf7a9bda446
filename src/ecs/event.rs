//! Global and entity-scoped event handlers.
//!
//! Events are identified by a hashed string. Four ids are reserved: the
//! lifecycle events `ACTIVATED`, `DEACTIVATED` and `DELETED`, and the
//! wildcard `ANY` which receives every event.
//!
//! `Domain::trigger` delivers an event in three tiers, each drained before
//! the next and each walked newest registration first:
//!
//! 1. handlers attached to the entity the event is about;
//! 2. global handlers registered for the event id;
//! 3. global handlers registered for `ANY`.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use super::domain::Domain;
use super::Entity;
use crate::utils::{FastHashMap, HashValue, ObjectPool};

/// Identifier of an event, usually created with `EventId::from("Name")`.
pub type EventId = HashValue<str>;

/// Wildcard id. Handlers registered with it receive every event.
pub const ANY: EventId = HashValue::from_raw(1);
/// Fired after an entity became active and joined its buckets.
pub const ACTIVATED: EventId = HashValue::from_raw(2);
/// Fired after an entity became inactive and left its buckets.
pub const DEACTIVATED: EventId = HashValue::from_raw(3);
/// Fired when an entity is deleted, while its components are still readable.
pub const DELETED: EventId = HashValue::from_raw(4);

impl_handle!(HandlerHandle);

/// An event being dispatched.
#[derive(Clone, Copy)]
pub struct Event<'a> {
    pub id: EventId,
    pub entity: Option<Entity>,
    pub args: Option<&'a dyn Any>,
}

impl<'a> Event<'a> {
    /// Returns the arguments of this event if they are of type `T`.
    #[inline]
    pub fn args<T: Any>(&self) -> Option<&'a T> {
        self.args.and_then(|v| v.downcast_ref::<T>())
    }
}

/// Receives events. Handlers only get shared access to the domain, so they can
/// read components and trigger further events but never mutate the domain
/// while a dispatch is in flight.
pub trait EventHandler {
    fn on_entity_event(&mut self, domain: &Domain, event: &Event);

    /// Called on every handler attached to an entity when that entity is deleted,
    /// whatever id the handler was registered with.
    fn on_entity_deleted(&mut self, _domain: &Domain, _ent: Entity) {}
}

impl<F> EventHandler for F
where
    F: FnMut(&Domain, &Event),
{
    fn on_entity_event(&mut self, domain: &Domain, event: &Event) {
        (self)(domain, event)
    }
}

/// Turns a closure into an `EventHandler`, letting the compiler infer the
/// argument types.
///
/// ```
/// use entity_domain::ecs::event::{self, EventId};
/// use entity_domain::ecs::Domain;
///
/// let mut domain = Domain::new();
/// domain.add_event_handler(
///     EventId::from("Explode"),
///     event::from_fn(|_, e| assert!(e.entity.is_none())),
/// );
/// domain.trigger(EventId::from("Explode"), None, None);
/// ```
pub fn from_fn<F>(func: F) -> F
where
    F: FnMut(&Domain, &Event),
{
    func
}

pub(crate) type SharedHandler = Rc<RefCell<dyn EventHandler>>;

/// Runs `func` on the handler unless it is already running further up the stack.
pub(crate) fn invoke<F>(handler: &SharedHandler, func: F)
where
    F: FnOnce(&mut dyn EventHandler),
{
    match handler.try_borrow_mut() {
        Ok(mut v) => func(&mut *v),
        Err(_) => warn!("[EventDispatcher] skips a handler which is re-entered during dispatch."),
    }
}

/// Storage of every handler, and the global registration lists.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    handlers: ObjectPool<HandlerHandle, SharedHandler>,
    globals: FastHashMap<EventId, Vec<HandlerHandle>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        EventDispatcher::default()
    }

    /// Stores a handler without registering it anywhere.
    pub fn create(&mut self, handler: SharedHandler) -> HandlerHandle {
        self.handlers.create(handler)
    }

    /// Drops a stored handler.
    pub fn free(&mut self, handle: HandlerHandle) -> bool {
        self.handlers.free(handle).is_some()
    }

    pub fn add(&mut self, id: EventId, handler: SharedHandler) -> HandlerHandle {
        let handle = self.create(handler);
        self.globals.entry(id).or_insert_with(Vec::new).push(handle);
        handle
    }

    pub fn remove(&mut self, id: EventId, handle: HandlerHandle) -> bool {
        let removed = match self.globals.get_mut(&id) {
            Some(v) => match v.iter().position(|h| *h == handle) {
                Some(index) => {
                    v.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };

        removed && self.free(handle)
    }

    #[inline]
    pub fn resolve(&self, handle: HandlerHandle) -> Option<SharedHandler> {
        self.handlers.get(handle).cloned()
    }

    /// Global handlers of `id`, newest first.
    pub fn snapshot(&self, id: EventId) -> SmallVec<[SharedHandler; 8]> {
        match self.globals.get(&id) {
            Some(v) => v.iter().rev().filter_map(|h| self.resolve(*h)).collect(),
            None => SmallVec::new(),
        }
    }

    /// Number of stored handlers, global and entity-scoped.
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
