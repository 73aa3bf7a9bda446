//! The `Domain` owns every entity, component, bucket and event handler, and
//! keeps them consistent with each other.
//!
//! Deleting an entity is deferred: `delete` deactivates the entity, fires
//! `DELETED` and marks it invalid, but its components stay readable until
//! the next `advance`. Dropping the domain reclaims everything left.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use smallvec::SmallVec;

use super::bitset::MAX_COMPONENTS;
use super::bucket::{
    Bucket, BucketEvent, BucketId, BucketLayout, BucketListener, BucketView, ListenerHandle,
    Notification,
};
use super::component::{Component, ComponentId, ComponentSet};
use super::entity::{EntityEntry, EntityStore};
use super::event::{self, Event, EventDispatcher, EventHandler, EventId, HandlerHandle};
use super::factory::{ComponentFactory, ComponentHandle};
use super::weak::{WeakEntity, WeakListener};
use super::Entity;
use crate::errors::*;
use crate::settings::DomainSettings;
use crate::utils::FastHashMap;

type Notifications = SmallVec<[Notification; 8]>;
type Slots = SmallVec<[Option<ComponentHandle>; 8]>;

/// The `Domain` struct contains all the data, which is entities, their
/// components and the buckets grouping them.
pub struct Domain {
    settings: DomainSettings,
    entities: EntityStore,
    components: FastHashMap<TypeId, ComponentId>,
    factories: Vec<ComponentFactory>,
    buckets: Vec<Bucket>,
    bucket_types: FastHashMap<TypeId, BucketId>,
    dispatcher: EventDispatcher,
    deleted: Vec<Entity>,
}

impl Default for Domain {
    fn default() -> Self {
        Domain::new()
    }
}

impl Domain {
    /// Constructs a new empty `Domain` with default settings.
    pub fn new() -> Self {
        Domain::with_settings(DomainSettings::default())
    }

    pub fn with_settings(settings: DomainSettings) -> Self {
        info!("[Domain] creates with {:?}.", settings);

        Domain {
            settings,
            entities: EntityStore::with_capacity(settings.entity_capacity),
            components: FastHashMap::default(),
            factories: Vec::new(),
            buckets: Vec::new(),
            bucket_types: FastHashMap::default(),
            dispatcher: EventDispatcher::new(),
            deleted: Vec::new(),
        }
    }

    #[inline]
    pub fn settings(&self) -> &DomainSettings {
        &self.settings
    }
}

impl Domain {
    /// Registers a component type, returning its identifier. Registering a
    /// type twice returns the same identifier.
    pub fn try_register<T: Component>(&mut self) -> Result<ComponentId> {
        if let Some(id) = self.components.get(&TypeId::of::<T>()) {
            return Ok(*id);
        }

        if self.factories.len() >= MAX_COMPONENTS {
            return Err(Error::ComponentCapacityExceeded(MAX_COMPONENTS));
        }

        let id = ComponentId(self.factories.len());
        let factory = ComponentFactory::new::<T>(id, self.settings.component_capacity);
        info!("[Domain] registers {} as {}.", factory.type_name(), id);

        self.factories.push(factory);
        self.components.insert(TypeId::of::<T>(), id);
        Ok(id)
    }

    /// Registers a component type, returning its identifier.
    ///
    /// # Panics
    ///
    /// Panics if the domain already holds `MAX_COMPONENTS` component types.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        match self.try_register::<T>() {
            Ok(id) => id,
            Err(err) => panic!("{}", err),
        }
    }

    /// Returns the identifier of `T` if it has been registered.
    #[inline]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.get(&TypeId::of::<T>()).cloned()
    }

    /// Returns the storage of a registered component type.
    #[inline]
    pub fn factory(&self, id: ComponentId) -> Option<&ComponentFactory> {
        self.factories.get(id.index())
    }

    /// Returns the component stored in the pooled slot `handle`.
    #[inline]
    pub fn fetch_slot<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        let id = self.component_id::<T>()?;
        self.factories[id.index()].get_by_handle(handle)
    }
}

impl Domain {
    /// Creates a new, inactive entity.
    pub fn create(&mut self, name: Option<&str>) -> Entity {
        let ent = self.entities.create(name);
        trace!("[Domain] creates {}.", ent);
        ent
    }

    #[inline]
    pub fn create_entity(&mut self) -> Entity {
        self.create(None)
    }

    #[inline]
    pub fn create_named(&mut self, name: &str) -> Entity {
        self.create(Some(name))
    }

    /// Creates an inactive copy of `src`, cloning every component it owns.
    /// Returns `None` if `src` is not valid.
    pub fn clone_entity(&mut self, src: Entity, name: Option<&str>) -> Option<Entity> {
        let (components, buckets) = match self.entities.get(src) {
            Some(entry) if entry.valid => (entry.components.clone(), entry.buckets.clone()),
            _ => {
                warn!("[Domain] can not clone {} which is not valid.", src);
                return None;
            }
        };

        let ent = self.entities.create(name);

        let mut owned = SmallVec::new();
        for id in components {
            if self.factories[id.index()].clone_from(ent, src).is_some() {
                owned.push(id);
            }
        }

        let entry = self.entities.get_mut(ent)?;
        entry.components = owned;
        entry.buckets = buckets;
        entry.rebuild_mask();

        trace!("[Domain] clones {} from {}.", ent, src);
        Some(ent)
    }

    /// Makes `ent` visible to buckets, name lookups and event handlers. Does
    /// nothing and returns false if it is already active or not valid.
    pub fn activate(&mut self, ent: Entity) -> bool {
        match self.entities.get_mut(ent) {
            Some(entry) if entry.valid => {
                if entry.active {
                    return false;
                }

                entry.active = true;
                entry.buckets.clear();
            }
            _ => {
                warn!("[Domain] can not activate {} which is not valid.", ent);
                return false;
            }
        }

        self.entities.index(ent);

        let mut notes = Notifications::new();
        for i in 0..self.buckets.len() {
            self.try_register_entity_with_bucket(ent, BucketId(i), &mut notes);
        }

        trace!("[Domain] activates {}.", ent);
        self.notify(&notes);
        self.trigger(event::ACTIVATED, Some(ent), None);
        true
    }

    /// Removes `ent` from every bucket and from the name lookups. Does nothing
    /// and returns false if it is not active.
    pub fn deactivate(&mut self, ent: Entity) -> bool {
        let buckets = match self.entities.get_mut(ent) {
            Some(entry) if entry.active => {
                entry.active = false;
                mem::replace(&mut entry.buckets, SmallVec::new())
            }
            _ => return false,
        };

        self.entities.unindex(ent);

        let mut notes = Notifications::new();
        for id in buckets {
            if self.buckets[id.index()].remove(ent) {
                notes.push(Notification {
                    bucket: id,
                    event: BucketEvent::Removed(ent),
                });
            }
        }

        trace!("[Domain] deactivates {}.", ent);
        self.notify(&notes);
        self.trigger(event::DEACTIVATED, Some(ent), None);
        true
    }

    /// Deactivates `ent`, fires `DELETED` and invalidates the handle. The
    /// components of `ent` can still be read until the next `advance`.
    pub fn delete(&mut self, ent: Entity) -> bool {
        if !self.is_valid(ent) {
            return false;
        }

        self.deactivate(ent);
        self.trigger(event::DELETED, Some(ent), None);

        let handlers = match self.entities.get_mut(ent) {
            Some(entry) => {
                entry.valid = false;
                entry.weak = None;
                mem::replace(&mut entry.handlers, Vec::new())
            }
            None => return false,
        };

        for (_, handle) in handlers {
            self.dispatcher.free(handle);
        }

        trace!("[Domain] deletes {}.", ent);
        self.deleted.push(ent);
        true
    }

    /// Reclaims the storage of every entity deleted since the last call.
    /// Returns the number of reclaimed entities.
    pub fn advance(&mut self) -> usize {
        let deleted = mem::replace(&mut self.deleted, Vec::new());
        for &ent in &deleted {
            self.destroy(ent);
        }

        if !deleted.is_empty() {
            debug!("[Domain] reclaims {} deleted entities.", deleted.len());
        }

        deleted.len()
    }

    fn destroy(&mut self, ent: Entity) {
        let entry = match self.entities.free(ent) {
            Some(entry) => entry,
            None => return,
        };

        for id in &entry.components {
            self.factories[id.index()].delete(ent);
        }

        for (_, handle) in entry.handlers {
            self.dispatcher.free(handle);
        }

        if let Some(cell) = entry.weak {
            cell.set(None);
        }
    }

    /// Returns true if `ent` has been created and not deleted yet.
    #[inline]
    pub fn is_valid(&self, ent: Entity) -> bool {
        self.entities.get(ent).map(|v| v.valid).unwrap_or(false)
    }

    #[inline]
    pub fn is_active(&self, ent: Entity) -> bool {
        self.entities.get(ent).map(|v| v.active).unwrap_or(false)
    }

    /// Returns the unique id of `ent`. Ids are never reused.
    #[inline]
    pub fn id(&self, ent: Entity) -> Option<u64> {
        self.entities.get(ent).map(|v| v.id)
    }

    #[inline]
    pub fn name(&self, ent: Entity) -> Option<&str> {
        self.entities
            .get(ent)
            .and_then(|v| v.name.as_ref())
            .map(|v| &**v)
    }

    /// Finds the earliest activated entity named `name`.
    #[inline]
    pub fn find(&self, name: &str) -> Option<Entity> {
        self.entities.find(name)
    }

    /// Finds the active entity with unique id `id`.
    #[inline]
    pub fn find_by_id(&self, id: u64) -> Option<Entity> {
        self.entities.find_by_id(id)
    }

    /// Returns the number of valid entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len() - self.deleted.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the valid entities in index order.
    pub fn entities<'a>(&'a self) -> impl Iterator<Item = Entity> + 'a {
        self.entities.iter().filter(move |v| self.is_valid(*v))
    }
}

impl Domain {
    /// Adds a default constructed `T` to `ent`, or returns the existing one.
    pub fn add<T: Component>(&mut self, ent: Entity) -> Option<&mut T> {
        let id = self.register::<T>();
        if !self.is_valid(ent) {
            warn!("[Domain] can not add {} to {}.", self.factories[id.index()].type_name(), ent);
            return None;
        }

        let (_, existed) = self.factories[id.index()].create(ent)?;
        if !existed {
            self.on_component_added(ent, id);
        }

        self.factories[id.index()].get_mut::<T>(ent)
    }

    /// Adds `value` to `ent`. If `ent` already owns a `T` it is replaced in
    /// place and returned.
    pub fn add_with<T: Component>(&mut self, ent: Entity, value: T) -> Result<Option<T>> {
        let id = self.register::<T>();
        if !self.is_valid(ent) {
            return Err(Error::InvalidEntity(ent));
        }

        match self.factories[id.index()].insert(ent, value) {
            Some((_, None)) => {
                self.on_component_added(ent, id);
                Ok(None)
            }
            Some((_, old)) => Ok(old),
            None => Err(Error::InvalidEntity(ent)),
        }
    }

    /// Removes the `T` of `ent`. Returns false if there is none.
    pub fn remove<T: Component>(&mut self, ent: Entity) -> bool {
        match self.component_id::<T>() {
            Some(id) => self.remove_by_id(ent, id),
            None => false,
        }
    }

    /// Removes the component `id` of `ent`. Bucket listeners observing the
    /// removal can still read the component.
    pub fn remove_by_id(&mut self, ent: Entity, id: ComponentId) -> bool {
        match self.entities.get(ent) {
            Some(entry) if entry.valid && entry.owns(id) => {}
            _ => return false,
        }

        let mut notes = Notifications::new();
        self.unregister_entity_with_buckets(ent, id, &mut notes);
        self.notify(&notes);

        self.factories[id.index()].delete(ent);
        if let Some(entry) = self.entities.get_mut(ent) {
            entry.components.retain(|v| *v != id);
            entry.rebuild_mask();
        }

        true
    }

    #[inline]
    pub fn get<T: Component>(&self, ent: Entity) -> Option<&T> {
        let id = self.component_id::<T>()?;
        self.factories[id.index()].get(ent)
    }

    #[inline]
    pub fn get_mut<T: Component>(&mut self, ent: Entity) -> Option<&mut T> {
        let id = self.component_id::<T>()?;
        self.factories[id.index()].get_mut(ent)
    }

    #[inline]
    pub fn has<T: Component>(&self, ent: Entity) -> bool {
        match self.component_id::<T>() {
            Some(id) => self.factories[id.index()].contains(ent),
            None => false,
        }
    }

    fn on_component_added(&mut self, ent: Entity, id: ComponentId) {
        match self.entities.get_mut(ent) {
            Some(entry) => {
                entry.components.push(id);
                entry.mask.insert(id.index());
            }
            None => return,
        }

        let subscribers: SmallVec<[(BucketId, usize); 4]> =
            self.factories[id.index()].subscribers().iter().cloned().collect();

        let mut notes = Notifications::new();
        for (bucket, slot) in subscribers {
            self.register_entity_with_bucket(ent, bucket, slot, &mut notes);
        }

        self.notify(&notes);
    }

    /// Re-evaluates one bucket after the component in `slot` was added to `ent`.
    fn register_entity_with_bucket(
        &mut self,
        ent: Entity,
        id: BucketId,
        slot: usize,
        notes: &mut Notifications,
    ) {
        let (matched, active) = match self.entities.get(ent) {
            Some(entry) => {
                if !entry.mask.is_superset(&self.buckets[id.index()].required()) {
                    return;
                }

                (entry.buckets.contains(&id), entry.active)
            }
            None => return,
        };

        let bucket = &mut self.buckets[id.index()];
        if matched {
            if active && !bucket.layout().slots()[slot].required {
                let component = bucket.layout().slots()[slot].component;
                let handle = self.factories[component.index()].lookup(ent);
                bucket.patch(ent, slot, handle);
            }

            return;
        }

        self.try_register_entity_with_bucket(ent, id, notes);
    }

    /// Links `ent` with bucket `id` if it satisfies the layout, creating an
    /// entry when `ent` is active.
    fn try_register_entity_with_bucket(
        &mut self,
        ent: Entity,
        id: BucketId,
        notes: &mut Notifications,
    ) -> bool {
        let slots = match self.entities.get(ent) {
            Some(entry) => {
                let bucket = &self.buckets[id.index()];
                if entry.buckets.contains(&id) || !satisfies(entry, bucket) {
                    return false;
                }

                if entry.active {
                    Some(resolve_slots(&self.factories, ent, bucket.layout()))
                } else {
                    None
                }
            }
            None => return false,
        };

        if let Some(entry) = self.entities.get_mut(ent) {
            entry.buckets.push(id);
        }

        if let Some(slots) = slots {
            if self.buckets[id.index()].insert(ent, slots) {
                notes.push(Notification {
                    bucket: id,
                    event: BucketEvent::Added(ent),
                });
            }
        }

        true
    }

    /// Updates every bucket depending on `component`, which is about to be
    /// removed from `ent` and still present.
    fn unregister_entity_with_buckets(
        &mut self,
        ent: Entity,
        component: ComponentId,
        notes: &mut Notifications,
    ) {
        let subscribers: SmallVec<[(BucketId, usize); 4]> =
            self.factories[component.index()].subscribers().iter().cloned().collect();

        for (id, slot) in subscribers {
            let lost = match self.entities.get(ent) {
                Some(entry) if entry.buckets.contains(&id) => {
                    let bucket = &mut self.buckets[id.index()];
                    let layout = bucket.layout();

                    if layout.slots()[slot].required {
                        true
                    } else {
                        let remains = layout
                            .slots()
                            .iter()
                            .enumerate()
                            .any(|(i, v)| i != slot && entry.owns(v.component));
                        let lost = bucket.required().is_empty() && !remains;

                        if entry.active {
                            bucket.patch(ent, slot, None);
                        }

                        lost
                    }
                }
                _ => false,
            };

            if lost {
                self.drop_membership(ent, id, notes);
            }
        }
    }

    fn drop_membership(&mut self, ent: Entity, id: BucketId, notes: &mut Notifications) {
        if let Some(entry) = self.entities.get_mut(ent) {
            entry.buckets.retain(|v| *v != id);
        }

        if self.buckets[id.index()].remove(ent) {
            notes.push(Notification {
                bucket: id,
                event: BucketEvent::Removed(ent),
            });
        }
    }

    fn notify(&self, notes: &[Notification]) {
        for v in notes {
            for listener in self.buckets[v.bucket.index()].listeners() {
                match listener.try_borrow_mut() {
                    Ok(mut listener) => listener.on_bucket_event(self, v.bucket, v.event),
                    Err(_) => warn!(
                        "[Domain] skips a listener of {} which is re-entered.",
                        v.bucket
                    ),
                }
            }
        }
    }
}

impl Domain {
    /// Registers a bucket and fills it with the entities that already match.
    ///
    /// # Panics
    ///
    /// Panics if the layout refers to a component type that is not
    /// registered in this domain, e.g. an id taken from another domain. The
    /// check also runs in release builds, like the capacity check of
    /// `register`.
    pub fn register_bucket(&mut self, layout: BucketLayout) -> BucketId {
        for v in layout.slots() {
            assert!(
                v.component.index() < self.factories.len(),
                "{} is not registered in this domain.",
                v.component
            );
        }

        let id = BucketId(self.buckets.len());
        for (slot, v) in layout.slots().iter().enumerate() {
            self.factories[v.component.index()].subscribe(id, slot);
        }

        info!("[Domain] registers {} with {:?}.", id, layout.slots());
        self.buckets
            .push(Bucket::new(id, layout, self.settings.bucket_capacity));

        let mut notes = Notifications::new();
        let entities: Vec<_> = self.entities().collect();
        for ent in entities {
            self.try_register_entity_with_bucket(ent, id, &mut notes);
        }

        self.notify(&notes);
        id
    }

    /// Returns the bucket of entities owning every component of `R`, with the
    /// components of `O` resolved when present. The bucket is registered on
    /// first use.
    pub fn bucket<R: ComponentSet, O: ComponentSet>(&mut self) -> BucketId {
        let key = TypeId::of::<(R, O)>();
        if let Some(id) = self.bucket_types.get(&key) {
            return *id;
        }

        let mut required = Vec::with_capacity(R::LEN);
        R::register(self, &mut required);
        let mut optional = Vec::with_capacity(O::LEN);
        O::register(self, &mut optional);

        let mut layout = BucketLayout::new();
        for v in required {
            layout = layout.require(v);
        }

        for v in optional {
            layout = layout.optional(v);
        }

        let id = self.register_bucket(layout);
        self.bucket_types.insert(key, id);
        id
    }

    /// Returns a typed view of the bucket created by `bucket::<R, O>`.
    pub fn view<R: ComponentSet, O: ComponentSet>(&self) -> Option<BucketView<R, O>> {
        let id = self.bucket_types.get(&TypeId::of::<(R, O)>())?;
        Some(BucketView::new(self, &self.buckets[id.index()]))
    }

    #[inline]
    pub fn bucket_by_id(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.get(id.index())
    }

    #[inline]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Registers a listener on the membership changes of `bucket`.
    pub fn add_bucket_listener<L>(&mut self, bucket: BucketId, listener: L) -> Option<ListenerHandle>
    where
        L: BucketListener + 'static,
    {
        let bucket = self.buckets.get_mut(bucket.index())?;
        Some(bucket.add_listener(Rc::new(RefCell::new(listener))))
    }

    pub fn remove_bucket_listener(&mut self, bucket: BucketId, handle: ListenerHandle) -> bool {
        match self.buckets.get_mut(bucket.index()) {
            Some(bucket) => bucket.remove_listener(handle),
            None => false,
        }
    }
}

impl Domain {
    /// Registers a global handler of event `id`.
    pub fn add_event_handler<H>(&mut self, id: EventId, handler: H) -> HandlerHandle
    where
        H: EventHandler + 'static,
    {
        self.dispatcher.add(id, Rc::new(RefCell::new(handler)))
    }

    /// Attaches a handler of event `id` to `ent`. The handler is dropped when
    /// `ent` is deleted.
    pub fn add_entity_event_handler<H>(
        &mut self,
        ent: Entity,
        id: EventId,
        handler: H,
    ) -> Option<HandlerHandle>
    where
        H: EventHandler + 'static,
    {
        if !self.is_valid(ent) {
            warn!("[Domain] can not attach handler to {} which is not valid.", ent);
            return None;
        }

        let handle = self.dispatcher.create(Rc::new(RefCell::new(handler)));
        self.entities.get_mut(ent)?.handlers.push((id, handle));
        Some(handle)
    }

    pub fn remove_event_handler(&mut self, id: EventId, handle: HandlerHandle) -> bool {
        self.dispatcher.remove(id, handle)
    }

    pub fn remove_entity_event_handler(
        &mut self,
        ent: Entity,
        id: EventId,
        handle: HandlerHandle,
    ) -> bool {
        let removed = match self.entities.get_mut(ent) {
            Some(entry) => match entry.handlers.iter().position(|v| *v == (id, handle)) {
                Some(index) => {
                    entry.handlers.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };

        removed && self.dispatcher.free(handle)
    }

    /// Delivers event `id`. Handlers attached to `entity` run first, then the
    /// global handlers of `id`, then the global `ANY` handlers. Each group is
    /// walked from the newest registration to the oldest.
    pub fn trigger(&self, id: EventId, entity: Option<Entity>, args: Option<&dyn Any>) {
        let event = Event { id, entity, args };

        if let Some(ent) = entity {
            if let Some(entry) = self.entities.get(ent) {
                if entry.active || id == event::DEACTIVATED || id == event::DELETED {
                    let scoped: SmallVec<[_; 8]> = entry
                        .handlers
                        .iter()
                        .rev()
                        .filter_map(|(k, h)| self.dispatcher.resolve(*h).map(|v| (*k, v)))
                        .collect();

                    for (k, handler) in &scoped {
                        if *k == id || *k == event::ANY {
                            event::invoke(handler, |v| v.on_entity_event(self, &event));
                        }

                        if id == event::DELETED {
                            event::invoke(handler, |v| v.on_entity_deleted(self, ent));
                        }
                    }
                }
            }
        }

        for handler in &self.dispatcher.snapshot(id) {
            event::invoke(handler, |v| v.on_entity_event(self, &event));
        }

        if id != event::ANY {
            for handler in &self.dispatcher.snapshot(event::ANY) {
                event::invoke(handler, |v| v.on_entity_event(self, &event));
            }
        }
    }

    /// Returns a reference to `ent` that is cleared once `ent` is deleted.
    pub fn downgrade(&mut self, ent: Entity) -> Option<WeakEntity> {
        match self.entities.get(ent) {
            Some(entry) if entry.valid => {
                if let Some(cell) = entry.weak.as_ref() {
                    return Some(WeakEntity::new(cell.clone()));
                }
            }
            _ => return None,
        }

        let cell = Rc::new(Cell::new(Some(ent)));
        let listener = WeakListener::new(cell.clone());
        self.add_entity_event_handler(ent, event::DELETED, listener)?;
        self.entities.get_mut(ent)?.weak = Some(cell.clone());
        Some(WeakEntity::new(cell))
    }
}

impl Drop for Domain {
    fn drop(&mut self) {
        self.advance();

        let entities: Vec<_> = self.entities.iter().collect();
        for ent in entities {
            self.destroy(ent);
        }

        debug_assert!(self.factories.iter().all(|v| v.is_empty()));
    }
}

/// Returns true if `entry` fills every required slot of `bucket`. The owned
/// list is checked as well as the mask.
fn satisfies(entry: &EntityEntry, bucket: &Bucket) -> bool {
    entry.mask.is_superset(&bucket.required())
        && bucket
            .layout()
            .slots()
            .iter()
            .filter(|v| v.required)
            .all(|v| entry.owns(v.component))
}

fn resolve_slots(factories: &[ComponentFactory], ent: Entity, layout: &BucketLayout) -> Slots {
    layout
        .slots()
        .iter()
        .map(|v| factories[v.component.index()].lookup(ent))
        .collect()
}
