use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tiny_keccak::sha3_256;

use error::{ErrorKind, Result};
use memory::{MemoryMap, MemoryRef};
use primitives::{HashTableHeader, Link, RecordManager, SlabManager};

/// Allocator of hash table elements.
pub trait Manager {
	type Link: Link;

	fn create(&self) -> Result<()>;

	fn start(&self) -> Result<()>;

	fn sync(&self) -> Result<()>;

	/// Allocates an element able to hold `size` bytes.
	fn allocate(&self, size: usize) -> Result<Self::Link>;

	fn get(&self, link: Self::Link) -> MemoryRef;
}

impl Manager for RecordManager {
	type Link = u32;

	fn create(&self) -> Result<()> {
		RecordManager::create(self)
	}

	fn start(&self) -> Result<()> {
		RecordManager::start(self)
	}

	fn sync(&self) -> Result<()> {
		RecordManager::sync(self)
	}

	fn allocate(&self, size: usize) -> Result<u32> {
		debug_assert!(size <= self.record_size());
		self.new_records(1)
	}

	fn get(&self, link: u32) -> MemoryRef {
		RecordManager::get(self, link)
	}
}

impl Manager for SlabManager {
	type Link = u64;

	fn create(&self) -> Result<()> {
		SlabManager::create(self)
	}

	fn start(&self) -> Result<()> {
		SlabManager::start(self)
	}

	fn sync(&self) -> Result<()> {
		SlabManager::sync(self)
	}

	fn allocate(&self, size: usize) -> Result<u64> {
		self.new_slab(size)
	}

	fn get(&self, link: u64) -> MemoryRef {
		SlabManager::get(self, link)
	}
}

/// Chained hash table over a record or slab manager.
///
/// New elements become the head of their bucket, so of several elements
/// stored under one key the most recent is found and unlinked first.
pub struct HashTable<M: Manager> {
	header: HashTableHeader<M::Link>,
	manager: M,
	key_size: usize,
	/// Held for write while a chain is spliced.
	lock: RwLock<()>,
}

pub type RecordHashTable = HashTable<RecordManager>;
pub type SlabHashTable = HashTable<SlabManager>;

impl RecordHashTable {
	/// Record table storing values of `value_size` bytes.
	pub fn record_table(map: Arc<MemoryMap>, buckets: usize, key_size: usize, value_size: usize) -> Self {
		let base = HashTableHeader::<u32>::size(buckets);
		let record_size = key_size + u32::SIZE + value_size;
		let manager = RecordManager::new(map.clone(), base, record_size);
		HashTable::new(map, buckets, key_size, manager)
	}

	/// Number of elements ever stored, unlinked ones included.
	pub fn rows(&self) -> usize {
		self.manager.count() as usize
	}
}

impl SlabHashTable {
	pub fn slab_table(map: Arc<MemoryMap>, buckets: usize, key_size: usize) -> Self {
		let base = HashTableHeader::<u64>::size(buckets);
		let manager = SlabManager::new(map.clone(), base);
		HashTable::new(map, buckets, key_size, manager)
	}
}

impl<M: Manager> HashTable<M> {
	pub fn new(map: Arc<MemoryMap>, buckets: usize, key_size: usize, manager: M) -> Self {
		HashTable {
			header: HashTableHeader::new(map, buckets),
			manager,
			key_size,
			lock: RwLock::new(()),
		}
	}

	pub fn buckets(&self) -> usize {
		self.header.buckets()
	}

	pub fn key_size(&self) -> usize {
		self.key_size
	}

	pub fn create(&self) -> Result<()> {
		self.header.create()?;
		self.manager.create()
	}

	pub fn start(&self) -> Result<()> {
		self.header.start()?;
		self.manager.start()
	}

	pub fn sync(&self) -> Result<()> {
		self.manager.sync()
	}

	fn check_key(&self, key: &[u8]) -> Result<()> {
		if key.len() != self.key_size {
			return Err(ErrorKind::InvalidKeyLen(self.key_size, key.len()).into());
		}
		Ok(())
	}

	/// Bucket of a key. Derived from the key bytes only, so it is stable across restarts.
	fn bucket_index(&self, key: &[u8]) -> usize {
		let digest = sha3_256(key);
		(LittleEndian::read_u64(&digest[..8]) % self.header.buckets() as u64) as usize
	}

	fn next_of(&self, link: M::Link) -> Result<M::Link> {
		self.manager.get(link).with(self.key_size, M::Link::SIZE, M::Link::read)
	}

	fn key_matches(&self, link: M::Link, key: &[u8]) -> Result<bool> {
		self.manager.get(link).with(0, self.key_size, |stored| stored == key)
	}

	/// Stores `value` under `key` and returns the link of the new element.
	pub fn store(&self, key: &[u8], value: &[u8]) -> Result<M::Link> {
		self.check_key(key)?;
		let _lock = self.lock.write();

		let bucket = self.bucket_index(key);
		let link = self.manager.allocate(self.key_size + M::Link::SIZE + value.len())?;
		let head = self.header.read(bucket)?;

		let mut element = Vec::with_capacity(self.key_size + M::Link::SIZE + value.len());
		element.extend_from_slice(key);
		element.extend_from_slice(&head.to_bytes());
		element.extend_from_slice(value);
		self.manager.get(link).write(0, &element)?;

		self.header.write(bucket, link)?;
		Ok(link)
	}

	/// Link of the most recently stored element with `key`.
	pub fn find_link(&self, key: &[u8]) -> Result<Option<M::Link>> {
		self.check_key(key)?;
		let _lock = self.lock.read();

		let mut current = self.header.read(self.bucket_index(key))?;
		while current != M::Link::EMPTY {
			if self.key_matches(current, key)? {
				return Ok(Some(current));
			}
			current = self.next_of(current)?;
		}
		Ok(None)
	}

	/// Value of the most recently stored element with `key`.
	pub fn find(&self, key: &[u8]) -> Result<Option<MemoryRef>> {
		Ok(self.find_link(key)?.map(|link| self.value(link)))
	}

	/// Removes the most recently stored element with `key`.
	pub fn unlink(&self, key: &[u8]) -> Result<bool> {
		self.check_key(key)?;
		let lock = self.lock.upgradable_read();

		let bucket = self.bucket_index(key);
		let mut previous = None;
		let mut current = self.header.read(bucket)?;
		while current != M::Link::EMPTY {
			let next = self.next_of(current)?;
			if self.key_matches(current, key)? {
				let _lock = RwLockUpgradableReadGuard::upgrade(lock);
				match previous {
					None => self.header.write(bucket, next)?,
					Some(previous) => self.manager.get(previous).write(self.key_size, &next.to_bytes())?,
				}
				return Ok(true);
			}
			previous = Some(current);
			current = next;
		}
		Ok(false)
	}

	pub fn value(&self, link: M::Link) -> MemoryRef {
		self.manager.get(link).advance(self.key_size + M::Link::SIZE)
	}

	pub fn key(&self, link: M::Link) -> Result<Vec<u8>> {
		self.manager.get(link).read(0, self.key_size)
	}
}
