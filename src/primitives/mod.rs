//! On-disk indexing structures built on memory maps.
//!
//! A hash table file starts with a bucket array and continues with the
//! elements of a record or slab manager.
//!
//! ```text
//!  buckets  bucket heads       manager
//!   /        /                  /
//! |....|........ ... ....|.......... ... |
//! ```
//!
//! Each element of a bucket chain is stored as key, link to the next element and value.
//!
//! ```text
//!  key   next  value
//!   /     /     /
//! |....|....|.......|
//! ```

use std::fmt;

use byteorder::{LittleEndian, ByteOrder};

mod hash_table;
mod header;
mod multimap;
mod record_manager;
mod slab_manager;

pub use self::hash_table::{HashTable, RecordHashTable, SlabHashTable, Manager};
pub use self::header::HashTableHeader;
pub use self::multimap::{RecordMultimap, RowIterator};
pub use self::record_manager::RecordManager;
pub use self::slab_manager::SlabManager;

/// Position of an element inside a manager.
pub trait Link: Copy + Eq + fmt::Debug + Send + Sync + 'static {
	const SIZE: usize;
	/// Terminates chains and marks empty buckets.
	const EMPTY: Self;

	fn read(bytes: &[u8]) -> Self;

	fn write(self, bytes: &mut [u8]);

	fn from_usize(value: usize) -> Self;

	fn to_usize(self) -> usize;

	fn to_bytes(self) -> Vec<u8> {
		let mut bytes = vec![0u8; Self::SIZE];
		self.write(&mut bytes);
		bytes
	}
}

impl Link for u32 {
	const SIZE: usize = 4;
	const EMPTY: Self = u32::MAX;

	fn read(bytes: &[u8]) -> Self {
		LittleEndian::read_u32(bytes)
	}

	fn write(self, bytes: &mut [u8]) {
		LittleEndian::write_u32(bytes, self)
	}

	fn from_usize(value: usize) -> Self {
		value as u32
	}

	fn to_usize(self) -> usize {
		self as usize
	}
}

impl Link for u64 {
	const SIZE: usize = 8;
	const EMPTY: Self = u64::MAX;

	fn read(bytes: &[u8]) -> Self {
		LittleEndian::read_u64(bytes)
	}

	fn write(self, bytes: &mut [u8]) {
		LittleEndian::write_u64(bytes, self)
	}

	fn from_usize(value: usize) -> Self {
		value as u64
	}

	fn to_usize(self) -> usize {
		self as usize
	}
}

/// Bucket count and number of stored rows of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo {
	pub buckets: usize,
	pub rows: usize,
}
