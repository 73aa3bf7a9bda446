//! Entity handles and the records backing them.

use std::cell::Cell;
use std::rc::Rc;

use inlinable_string::InlinableString;
use smallvec::SmallVec;

use super::bitset::BitSet;
use super::bucket::BucketId;
use super::component::ComponentId;
use super::event::{EventId, HandlerHandle};
use crate::utils::{FastHashMap, HashValue, ObjectPool};

impl_handle!(Entity);

/// The record behind an `Entity` handle.
pub(crate) struct EntityEntry {
    pub id: u64,
    pub name: Option<InlinableString>,
    pub active: bool,
    /// Cleared by `Domain::delete`, the record itself lives until the next flush.
    pub valid: bool,
    pub mask: BitSet,
    /// Owned component types, in the order they were added.
    pub components: SmallVec<[ComponentId; 8]>,
    /// Buckets whose required components are all owned by this entity.
    pub buckets: SmallVec<[BucketId; 8]>,
    /// Entity-scoped handler registrations, oldest first.
    pub handlers: Vec<(EventId, HandlerHandle)>,
    /// Shared cell handed out to every `WeakEntity` of this entity.
    pub weak: Option<Rc<Cell<Option<Entity>>>>,
}

impl EntityEntry {
    fn new(id: u64, name: Option<&str>) -> Self {
        EntityEntry {
            id,
            name: name.map(InlinableString::from),
            active: false,
            valid: true,
            mask: BitSet::new(),
            components: SmallVec::new(),
            buckets: SmallVec::new(),
            handlers: Vec::new(),
            weak: None,
        }
    }

    /// Recomputes the component mask from the owned component list.
    pub fn rebuild_mask(&mut self) {
        self.mask.clear();
        for v in &self.components {
            self.mask.insert(v.index());
        }
    }

    #[inline]
    pub fn owns(&self, component: ComponentId) -> bool {
        self.components.contains(&component)
    }
}

/// Stable storage of entity records, plus the name and id indices of the
/// active ones.
pub(crate) struct EntityStore {
    entries: ObjectPool<Entity, EntityEntry>,
    next_id: u64,
    names: FastHashMap<HashValue<str>, SmallVec<[Entity; 1]>>,
    ids: FastHashMap<u64, Entity>,
}

impl EntityStore {
    pub fn with_capacity(capacity: usize) -> Self {
        EntityStore {
            entries: ObjectPool::with_capacity(capacity),
            next_id: 1,
            names: FastHashMap::default(),
            ids: FastHashMap::default(),
        }
    }

    /// Allocates a new record with a fresh, never reused id.
    pub fn create(&mut self, name: Option<&str>) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.create(EntityEntry::new(id, name))
    }

    #[inline]
    pub fn get(&self, ent: Entity) -> Option<&EntityEntry> {
        self.entries.get(ent)
    }

    #[inline]
    pub fn get_mut(&mut self, ent: Entity) -> Option<&mut EntityEntry> {
        self.entries.get_mut(ent)
    }

    /// Releases the record. The handle is dead afterwards.
    pub fn free(&mut self, ent: Entity) -> Option<EntityEntry> {
        self.unindex(ent);
        self.entries.free(ent)
    }

    /// Number of records, including the deleted ones waiting for a flush.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates every record handle in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries.iter()
    }

    /// Makes `ent` reachable through `find` and `find_by_id`.
    pub fn index(&mut self, ent: Entity) {
        let (id, name) = match self.entries.get(ent) {
            Some(entry) => (entry.id, entry.name.as_ref().map(|v| HashValue::<str>::from(v))),
            None => return,
        };

        self.ids.insert(id, ent);
        if let Some(name) = name {
            let v = self.names.entry(name).or_insert_with(SmallVec::new);
            if !v.contains(&ent) {
                v.push(ent);
            }
        }
    }

    pub fn unindex(&mut self, ent: Entity) {
        let (id, name) = match self.entries.get(ent) {
            Some(entry) => (entry.id, entry.name.as_ref().map(|v| HashValue::<str>::from(v))),
            None => return,
        };

        if self.ids.get(&id) == Some(&ent) {
            self.ids.remove(&id);
        }

        if let Some(name) = name {
            let empty = match self.names.get_mut(&name) {
                Some(v) => {
                    v.retain(|e| *e != ent);
                    v.is_empty()
                }
                None => false,
            };

            if empty {
                self.names.remove(&name);
            }
        }
    }

    /// Returns the earliest activated entity with `name`.
    pub fn find(&self, name: &str) -> Option<Entity> {
        self.names
            .get(&HashValue::from(name))
            .and_then(|v| v.first().cloned())
    }

    pub fn find_by_id(&self, id: u64) -> Option<Entity> {
        self.ids.get(&id).cloned()
    }
}
