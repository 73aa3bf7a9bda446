//! Fast, deterministic hashing used for component lookups, event ids and names.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use fnv::FnvHasher;

/// A `HashMap` using a default FNV hasher.
pub type FastHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FnvHasher>>;

/// Hashes a value into 64 bits. The result is stable across runs, so it is
/// safe to bake into constants or to send across processes.
#[inline]
pub fn hash64<T: Hash + ?Sized>(v: &T) -> u64 {
    let mut state = FnvHasher::default();
    v.hash(&mut state);
    state.finish()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stable() {
        assert_eq!(hash64("Foo"), hash64("Foo"));
        assert_ne!(hash64("Foo"), hash64("Bar"));
    }
}
