//! Commonly used utilities like pools, hashes and so on.

#[macro_use]
pub mod handle;
pub mod handle_pool;
pub mod hash;
pub mod hash_value;
pub mod object_pool;

pub use self::handle::{Handle, HandleIndex, HandleLike};
pub use self::handle_pool::HandlePool;
pub use self::hash::{hash64, FastHashMap};
pub use self::hash_value::HashValue;
pub use self::object_pool::ObjectPool;
