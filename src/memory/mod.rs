//! Memory-mapped files and deferred references into them.

mod map;
mod reference;

pub use self::map::{MemoryMap, Accessor, AccessorMut};
pub use self::reference::MemoryRef;
