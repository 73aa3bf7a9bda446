//! Buckets are live queries over the entities of a domain.
//!
//! A bucket is described by a `BucketLayout`, an ordered list of component
//! slots each flagged as required or optional. An active entity is a member of
//! the bucket as long as it owns every required component. Buckets without any
//! required component keep an entity only while it owns at least one of the
//! optional ones.
//!
//! Membership is maintained incrementally by the `Domain` as components come
//! and go, and entries are kept in insertion order.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use super::bitset::BitSet;
use super::component::{ComponentId, ComponentSet};
use super::domain::Domain;
use super::factory::ComponentHandle;
use super::Entity;
use crate::utils::{FastHashMap, HandlePool, ObjectPool};

/// The identifier of a bucket registered in a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId(pub(crate) usize);

impl BucketId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BucketId ({})", self.0)
    }
}

/// One component slot of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSlot {
    pub component: ComponentId,
    pub required: bool,
}

/// The ordered component slots of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketLayout {
    slots: SmallVec<[BucketSlot; 8]>,
}

impl BucketLayout {
    pub fn new() -> Self {
        BucketLayout::default()
    }

    /// Appends a slot that entities must fill to be a member.
    pub fn require(self, component: ComponentId) -> Self {
        self.push(component, true)
    }

    /// Appends a slot that is resolved when present.
    pub fn optional(self, component: ComponentId) -> Self {
        self.push(component, false)
    }

    fn push(mut self, component: ComponentId, required: bool) -> Self {
        debug_assert!(
            self.position(component).is_none(),
            "{} is declared twice in one bucket layout.",
            component
        );

        self.slots.push(BucketSlot {
            component,
            required,
        });
        self
    }

    #[inline]
    pub fn slots(&self) -> &[BucketSlot] {
        &self.slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot index of `component`.
    pub fn position(&self, component: ComponentId) -> Option<usize> {
        self.slots.iter().position(|v| v.component == component)
    }

    /// The mask of every required component.
    pub fn required_mask(&self) -> BitSet {
        let mut mask = BitSet::new();
        for v in self.slots.iter().filter(|v| v.required) {
            mask.insert(v.component.index());
        }
        mask
    }
}

/// A change of bucket membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketEvent {
    Added(Entity),
    Removed(Entity),
}

impl BucketEvent {
    #[inline]
    pub fn entity(&self) -> Entity {
        match *self {
            BucketEvent::Added(ent) | BucketEvent::Removed(ent) => ent,
        }
    }
}

/// Observes the membership changes of one bucket. Listeners are invoked
/// synchronously, before the mutating call returns. When an entity leaves a
/// bucket because a component is removed, that component can still be read
/// from the domain during the notification.
pub trait BucketListener {
    fn on_bucket_event(&mut self, domain: &Domain, bucket: BucketId, event: BucketEvent);
}

impl<F> BucketListener for F
where
    F: FnMut(&Domain, BucketId, BucketEvent),
{
    fn on_bucket_event(&mut self, domain: &Domain, bucket: BucketId, event: BucketEvent) {
        (self)(domain, bucket, event)
    }
}

/// Turns a closure into a `BucketListener`, letting the compiler infer the
/// argument types.
pub fn from_fn<F>(func: F) -> F
where
    F: FnMut(&Domain, BucketId, BucketEvent),
{
    func
}

impl_handle!(ListenerHandle);

pub(crate) type SharedListener = Rc<RefCell<dyn BucketListener>>;

/// A membership change waiting to be delivered to the listeners of `bucket`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Notification {
    pub bucket: BucketId,
    pub event: BucketEvent,
}

impl_handle!(EntryHandle);

struct BucketEntry {
    entity: Entity,
    slots: SmallVec<[Option<ComponentHandle>; 8]>,
    prev: Option<EntryHandle>,
    next: Option<EntryHandle>,
}

/// The entries of one bucket, with their component slots resolved.
pub struct Bucket {
    id: BucketId,
    layout: BucketLayout,
    required: BitSet,
    entries: ObjectPool<EntryHandle, BucketEntry>,
    head: Option<EntryHandle>,
    tail: Option<EntryHandle>,
    lookup: FastHashMap<Entity, EntryHandle>,
    listeners: Vec<(ListenerHandle, SharedListener)>,
    listener_handles: HandlePool<ListenerHandle>,
}

impl Bucket {
    pub(crate) fn new(id: BucketId, layout: BucketLayout, capacity: usize) -> Self {
        Bucket {
            id,
            required: layout.required_mask(),
            layout,
            entries: ObjectPool::with_capacity(capacity),
            head: None,
            tail: None,
            lookup: FastHashMap::default(),
            listeners: Vec::new(),
            listener_handles: HandlePool::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> BucketId {
        self.id
    }

    #[inline]
    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// The mask of every required component.
    #[inline]
    pub fn required(&self) -> BitSet {
        self.required
    }

    /// Returns the number of member entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.lookup.contains_key(&ent)
    }

    /// Returns the resolved component slots of `ent`, in layout order.
    pub fn slots(&self, ent: Entity) -> Option<&[Option<ComponentHandle>]> {
        let handle = self.lookup.get(&ent)?;
        self.entries.get(*handle).map(|v| &v.slots[..])
    }

    /// Iterates the members and their resolved slots, in insertion order.
    #[inline]
    pub fn entries(&self) -> Iter {
        Iter {
            bucket: self,
            cursor: self.head,
        }
    }

    /// Iterates the members in insertion order.
    #[inline]
    pub fn entities<'a>(&'a self) -> impl Iterator<Item = Entity> + 'a {
        self.entries().map(|(ent, _)| ent)
    }

    /// Appends `ent` at the end of the entry list. Returns false if `ent` is
    /// already a member.
    pub(crate) fn insert(&mut self, ent: Entity, slots: SmallVec<[Option<ComponentHandle>; 8]>) -> bool {
        if self.lookup.contains_key(&ent) {
            return false;
        }

        debug_assert_eq!(slots.len(), self.layout.len());

        let handle = self.entries.create(BucketEntry {
            entity: ent,
            slots,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(tail) => {
                if let Some(v) = self.entries.get_mut(tail) {
                    v.next = Some(handle);
                }
            }
            None => self.head = Some(handle),
        }

        self.tail = Some(handle);
        self.lookup.insert(ent, handle);
        true
    }

    /// Unlinks the entry of `ent`. Returns false if `ent` is not a member.
    pub(crate) fn remove(&mut self, ent: Entity) -> bool {
        let entry = match self.lookup.remove(&ent) {
            Some(handle) => match self.entries.free(handle) {
                Some(entry) => entry,
                None => return false,
            },
            None => return false,
        };

        match entry.prev {
            Some(prev) => {
                if let Some(v) = self.entries.get_mut(prev) {
                    v.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }

        match entry.next {
            Some(next) => {
                if let Some(v) = self.entries.get_mut(next) {
                    v.prev = entry.prev;
                }
            }
            None => self.tail = entry.prev,
        }

        true
    }

    /// Replaces one resolved slot of an existing entry in place.
    pub(crate) fn patch(&mut self, ent: Entity, slot: usize, value: Option<ComponentHandle>) -> bool {
        let handle = match self.lookup.get(&ent) {
            Some(handle) => *handle,
            None => return false,
        };

        match self.entries.get_mut(handle) {
            Some(entry) if slot < entry.slots.len() => {
                entry.slots[slot] = value;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn add_listener(&mut self, listener: SharedListener) -> ListenerHandle {
        let handle = self.listener_handles.create();
        self.listeners.push((handle, listener));
        handle
    }

    pub(crate) fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        if !self.listener_handles.free(handle) {
            return false;
        }

        self.listeners.retain(|v| v.0 != handle);
        true
    }

    /// Listeners in registration order.
    pub(crate) fn listeners(&self) -> impl Iterator<Item = &SharedListener> {
        self.listeners.iter().map(|v| &v.1)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("id", &self.id)
            .field("layout", &self.layout)
            .field("len", &self.len())
            .finish()
    }
}

/// Iterator over the entries of a `Bucket`, created by `Bucket::entries`.
pub struct Iter<'a> {
    bucket: &'a Bucket,
    cursor: Option<EntryHandle>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Entity, &'a [Option<ComponentHandle>]);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.bucket.entries.get(self.cursor?)?;
        self.cursor = entry.next;
        Some((entry.entity, &entry.slots[..]))
    }
}

/// A typed view over a bucket, with `R` the required and `O` the optional
/// component types.
pub struct BucketView<'a, R, O> {
    domain: &'a Domain,
    bucket: &'a Bucket,
    _phantom: PhantomData<(R, O)>,
}

impl<'a, R: ComponentSet, O: ComponentSet> BucketView<'a, R, O> {
    pub(crate) fn new(domain: &'a Domain, bucket: &'a Bucket) -> Self {
        debug_assert_eq!(bucket.layout().len(), R::LEN + O::LEN);

        BucketView {
            domain,
            bucket,
            _phantom: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> BucketId {
        self.bucket.id()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bucket.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bucket.is_empty()
    }

    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.bucket.contains(ent)
    }

    /// Iterates the members in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + 'a {
        self.bucket.entities()
    }

    /// Iterates the members with references to their components.
    pub fn entries(&self) -> impl Iterator<Item = (Entity, R::Refs<'a>, O::OptionRefs<'a>)> + 'a {
        let domain = self.domain;
        self.bucket.entries().filter_map(move |(ent, slots)| {
            let required = R::fetch(domain, &slots[..R::LEN])?;
            let optional = O::fetch_optional(domain, &slots[R::LEN..]);
            Some((ent, required, optional))
        })
    }
}
