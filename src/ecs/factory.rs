//! Per-type component storage.
//!
//! Every component type registered in a `Domain` gets exactly one
//! `ComponentFactory`. The factory owns a pooled allocator for the values, an
//! index from entity to pooled slot, and a small table of function pointers
//! which lets the domain create, copy and destroy components without knowing
//! their concrete type.

use std::any::{self, Any};
use std::mem;

use smallvec::SmallVec;

use super::bucket::BucketId;
use super::component::{Component, ComponentId};
use super::Entity;
use crate::utils::{FastHashMap, ObjectPool};

impl_handle!(ComponentHandle);

type Pool<T> = ObjectPool<ComponentHandle, T>;

/// Type-erased constructor, copy-constructor and destructor of one component type.
#[derive(Clone, Copy)]
struct ComponentVTable {
    create: fn(&mut dyn Any) -> Option<ComponentHandle>,
    clone: fn(&mut dyn Any, ComponentHandle) -> Option<ComponentHandle>,
    free: fn(&mut dyn Any, ComponentHandle) -> bool,
}

impl ComponentVTable {
    fn of<T: Component>() -> Self {
        ComponentVTable {
            create: create::<T>,
            clone: clone::<T>,
            free: free::<T>,
        }
    }
}

fn create<T: Component>(pool: &mut dyn Any) -> Option<ComponentHandle> {
    pool.downcast_mut::<Pool<T>>()
        .map(|pool| pool.create(T::default()))
}

fn clone<T: Component>(pool: &mut dyn Any, src: ComponentHandle) -> Option<ComponentHandle> {
    let pool = pool.downcast_mut::<Pool<T>>()?;
    let value = pool.get(src)?.clone();
    Some(pool.create(value))
}

fn free<T: Component>(pool: &mut dyn Any, handle: ComponentHandle) -> bool {
    pool.downcast_mut::<Pool<T>>()
        .and_then(|pool| pool.free(handle))
        .is_some()
}

/// Pooled storage of one component type.
pub struct ComponentFactory {
    id: ComponentId,
    name: &'static str,
    pool: Box<dyn Any>,
    vtable: ComponentVTable,
    lookup: FastHashMap<Entity, ComponentHandle>,
    subscribers: SmallVec<[(BucketId, usize); 4]>,
}

impl ComponentFactory {
    pub(crate) fn new<T: Component>(id: ComponentId, capacity: usize) -> Self {
        ComponentFactory {
            id,
            name: any::type_name::<T>(),
            pool: Box::new(Pool::<T>::with_capacity(capacity)),
            vtable: ComponentVTable::of::<T>(),
            lookup: FastHashMap::default(),
            subscribers: SmallVec::new(),
        }
    }

    /// The identifier (and mask bit) assigned to this component type.
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The type name of the stored component.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of live components.
    #[inline]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Returns the pooled slot of the component owned by `ent`.
    #[inline]
    pub fn lookup(&self, ent: Entity) -> Option<ComponentHandle> {
        self.lookup.get(&ent).cloned()
    }

    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.lookup.contains_key(&ent)
    }

    /// Buckets depending on this component type, with the slot this type
    /// occupies in each of them.
    #[inline]
    pub fn subscribers(&self) -> &[(BucketId, usize)] {
        &self.subscribers
    }

    pub(crate) fn subscribe(&mut self, bucket: BucketId, slot: usize) {
        debug_assert!(
            !self.subscribers.iter().any(|v| v.0 == bucket),
            "{} subscribed twice by {:?}.",
            self.name,
            bucket
        );

        self.subscribers.push((bucket, slot));
    }

    /// Default-constructs a component for `ent`. If `ent` already owns one,
    /// the existing slot is returned and the second value is `true`.
    pub(crate) fn create(&mut self, ent: Entity) -> Option<(ComponentHandle, bool)> {
        if let Some(handle) = self.lookup(ent) {
            return Some((handle, true));
        }

        let handle = (self.vtable.create)(self.pool.as_mut())?;
        self.lookup.insert(ent, handle);
        Some((handle, false))
    }

    /// Copy-constructs the component of `src` for `ent`. Fails if `ent` already
    /// owns a component of this type or `src` owns none.
    pub(crate) fn clone_from(&mut self, ent: Entity, src: Entity) -> Option<ComponentHandle> {
        if self.contains(ent) {
            return None;
        }

        let src = self.lookup(src)?;
        let handle = (self.vtable.clone)(self.pool.as_mut(), src)?;
        self.lookup.insert(ent, handle);
        Some(handle)
    }

    /// Destroys the component of `ent` and returns its slot to the pool.
    pub(crate) fn delete(&mut self, ent: Entity) -> bool {
        match self.lookup.remove(&ent) {
            Some(handle) => {
                let freed = (self.vtable.free)(self.pool.as_mut(), handle);
                debug_assert!(freed, "{} lost track of {}.", self.name, handle);
                true
            }
            None => false,
        }
    }

    /// Inserts `value` for `ent`. An existing value is replaced in place and
    /// returned, keeping its slot.
    pub(crate) fn insert<T: Component>(
        &mut self,
        ent: Entity,
        value: T,
    ) -> Option<(ComponentHandle, Option<T>)> {
        let existing = self.lookup(ent);
        let pool = self.pool.downcast_mut::<Pool<T>>()?;

        if let Some(handle) = existing {
            let v = pool.get_mut(handle)?;
            return Some((handle, Some(mem::replace(v, value))));
        }

        let handle = pool.create(value);
        self.lookup.insert(ent, handle);
        Some((handle, None))
    }

    /// Returns a reference to the component of `ent`.
    #[inline]
    pub fn get<T: Component>(&self, ent: Entity) -> Option<&T> {
        self.get_by_handle(self.lookup(ent)?)
    }

    /// Returns a mutable reference to the component of `ent`.
    #[inline]
    pub fn get_mut<T: Component>(&mut self, ent: Entity) -> Option<&mut T> {
        let handle = self.lookup(ent)?;
        self.pool.downcast_mut::<Pool<T>>()?.get_mut(handle)
    }

    /// Returns a reference to the component stored in the pooled slot `handle`.
    #[inline]
    pub fn get_by_handle<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.pool.downcast_ref::<Pool<T>>()?.get(handle)
    }
}

impl Drop for ComponentFactory {
    fn drop(&mut self) {
        debug_assert!(
            self.lookup.is_empty(),
            "{} is dropped with {} live components.",
            self.name,
            self.lookup.len()
        );
    }
}
