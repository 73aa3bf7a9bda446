use super::handle::HandleLike;
use super::handle_pool::{HandlePool, Iter};

/// Values addressed by versioned handles.
///
/// A freed slot keeps its storage and is filled again by a later `create`, so
/// the pool behaves as a block allocator for `T`. Handles into freed slots
/// are stale and never reach the new value.
pub struct ObjectPool<H: HandleLike, T> {
    handles: HandlePool<H>,
    slots: Vec<Option<T>>,
}

impl<H: HandleLike, T> Default for ObjectPool<H, T> {
    fn default() -> Self {
        ObjectPool::new()
    }
}

impl<H: HandleLike, T> ObjectPool<H, T> {
    pub fn new() -> Self {
        ObjectPool::with_capacity(0)
    }

    /// Reserves room for `capacity` values up front.
    pub fn with_capacity(capacity: usize) -> Self {
        ObjectPool {
            handles: HandlePool::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Stores `value` and returns the handle naming it.
    pub fn create(&mut self, value: T) -> H {
        let handle = self.handles.create();
        let index = handle.index() as usize;

        if index == self.slots.len() {
            self.slots.push(Some(value));
        } else {
            self.slots[index] = Some(value);
        }

        handle
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        self.slot(handle).and_then(|v| self.slots[v].as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let index = self.slot(handle)?;
        self.slots[index].as_mut()
    }

    #[inline]
    pub fn is_alive(&self, handle: H) -> bool {
        self.handles.is_alive(handle)
    }

    /// Takes the value out and releases its slot. Returns `None` if `handle`
    /// is stale.
    pub fn free(&mut self, handle: H) -> Option<T> {
        let index = self.slot(handle)?;
        self.handles.free(handle);
        self.slots[index].take()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the live handles in index order.
    #[inline]
    pub fn iter(&self) -> Iter<H> {
        self.handles.iter()
    }

    #[inline]
    fn slot(&self, handle: H) -> Option<usize> {
        if self.handles.is_alive(handle) {
            Some(handle.index() as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::handle::Handle;
    use super::*;

    #[test]
    fn basic() {
        let mut pool = ObjectPool::<Handle, i32>::new();

        let e1 = pool.create(3);
        assert_eq!(pool.get(e1), Some(&3));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.free(e1), Some(3));
        assert!(pool.is_empty());
        assert_eq!(pool.get(e1), None);
        assert_eq!(pool.free(e1), None);
    }

    #[test]
    fn reuse_storage() {
        let mut pool = ObjectPool::<Handle, String>::with_capacity(4);

        let e1 = pool.create("a".to_owned());
        let e2 = pool.create("b".to_owned());
        pool.free(e1);

        let e3 = pool.create("c".to_owned());
        assert_eq!(e3.index(), e1.index());
        assert_ne!(e3, e1);
        assert_eq!(pool.get(e1), None);
        assert_eq!(pool.get(e3).map(|v| v.as_str()), Some("c"));

        *pool.get_mut(e2).unwrap() = "d".to_owned();
        assert_eq!(pool.get(e2).map(|v| v.as_str()), Some("d"));
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec![e3, e2]);
    }
}
