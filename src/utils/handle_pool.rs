use std::cmp::Ordering;
use std::collections::binary_heap::BinaryHeap;
use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

#[derive(PartialEq, Eq)]
struct InverseHandleIndex(HandleIndex);

impl PartialOrd for InverseHandleIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InverseHandleIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// Allocator of versioned indices.
///
/// A slot is alive while its version is odd. Freeing bumps the version to an
/// even number, and the next `create` on that index bumps it again. Freed
/// indices are recycled lowest first.
pub struct HandlePool<H: HandleLike> {
    versions: Vec<HandleIndex>,
    frees: BinaryHeap<InverseHandleIndex>,
    _phantom: PhantomData<H>,
}

impl<H: HandleLike> Default for HandlePool<H> {
    fn default() -> Self {
        HandlePool::with_capacity(0)
    }
}

impl<H: HandleLike> HandlePool<H> {
    pub fn new() -> Self {
        HandlePool::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HandlePool {
            versions: Vec::with_capacity(capacity),
            frees: BinaryHeap::with_capacity(capacity),
            _phantom: PhantomData,
        }
    }

    pub fn create(&mut self) -> H {
        match self.frees.pop() {
            Some(InverseHandleIndex(index)) => {
                let slot = &mut self.versions[index as usize];
                *slot += 1;
                H::new(index, *slot)
            }
            None => {
                let index = self.versions.len() as HandleIndex;
                self.versions.push(1);
                H::new(index, 1)
            }
        }
    }

    /// `true` if `handle` came from this pool and its slot was not freed since.
    #[inline]
    pub fn is_alive(&self, handle: H) -> bool {
        match self.versions.get(handle.index() as usize) {
            Some(&v) => v & 1 == 1 && v == handle.version(),
            None => false,
        }
    }

    /// Releases the index of `handle`. Stale handles are ignored and yield
    /// `false`.
    pub fn free(&mut self, handle: H) -> bool {
        if !self.is_alive(handle) {
            return false;
        }

        self.versions[handle.index() as usize] += 1;
        self.frees.push(InverseHandleIndex(handle.index()));
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles in index order.
    #[inline]
    pub fn iter(&self) -> Iter<H> {
        Iter {
            versions: self.versions.iter().enumerate(),
            _phantom: PhantomData,
        }
    }
}

pub struct Iter<'a, H: HandleLike> {
    versions: std::iter::Enumerate<std::slice::Iter<'a, HandleIndex>>,
    _phantom: PhantomData<H>,
}

impl<'a, H: HandleLike> Iterator for Iter<'a, H> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        self.versions
            .by_ref()
            .find(|(_, &v)| v & 1 == 1)
            .map(|(index, &v)| H::new(index as HandleIndex, v))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::handle::Handle;

    #[test]
    fn recycle() {
        let mut pool = HandlePool::<Handle>::new();
        let h1 = pool.create();
        let h2 = pool.create();
        assert_eq!(h1, Handle::new(0, 1));
        assert_eq!(h2, Handle::new(1, 1));
        assert_eq!(pool.len(), 2);

        assert!(pool.free(h1));
        assert!(!pool.free(h1));
        assert!(!pool.is_alive(h1));
        assert_eq!(pool.len(), 1);

        let h3 = pool.create();
        assert_eq!(h3, Handle::new(0, 3));
        assert!(pool.is_alive(h3));
        assert!(!pool.is_alive(h1));
    }

    #[test]
    fn iter_skips_dead() {
        let mut pool = HandlePool::<Handle>::new();
        let handles: Vec<_> = (0..5).map(|_| pool.create()).collect();
        pool.free(handles[1]);
        pool.free(handles[3]);

        let alive: Vec<_> = pool.iter().collect();
        assert_eq!(alive, vec![handles[0], handles[2], handles[4]]);
    }
}
