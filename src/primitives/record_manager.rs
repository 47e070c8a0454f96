use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};
use parking_lot::Mutex;

use error::{corrupted, Result};
use memory::{MemoryMap, MemoryRef};

/// Fixed-size records addressed by index.
///
/// ```text
///  count  records
///   /      /
/// |....|........ ... |
/// ```
///
/// The count in the file is updated by `sync` only.
pub struct RecordManager {
	map: Arc<MemoryMap>,
	base: usize,
	record_size: usize,
	count: Mutex<u32>,
}

impl RecordManager {
	const COUNT_SIZE: usize = 4;

	pub fn new(map: Arc<MemoryMap>, base: usize, record_size: usize) -> Self {
		RecordManager {
			map,
			base,
			record_size,
			count: Mutex::new(0),
		}
	}

	pub fn record_size(&self) -> usize {
		self.record_size
	}

	fn end(&self, count: u32) -> usize {
		self.base + Self::COUNT_SIZE + count as usize * self.record_size
	}

	pub fn create(&self) -> Result<()> {
		let mut count = self.count.lock();
		*count = 0;
		self.map.reserve(self.end(0))?;
		MemoryRef::new(self.map.clone(), self.base).write_u32(0, 0)
	}

	/// Loads the count persisted by the last `sync`.
	pub fn start(&self) -> Result<()> {
		let stored = {
			let access = self.map.access()?;
			LittleEndian::read_u32(access.get(self.base, Self::COUNT_SIZE)?)
		};

		if self.end(stored) > self.map.size() {
			return Err(corrupted(format!("{} records exceed the size of {}", stored, self.map.path().display())));
		}

		*self.count.lock() = stored;
		Ok(())
	}

	pub fn sync(&self) -> Result<()> {
		let count = *self.count.lock();
		MemoryRef::new(self.map.clone(), self.base).write_u32(0, count)
	}

	pub fn count(&self) -> u32 {
		*self.count.lock()
	}

	/// Truncates the logical count. The file keeps its size.
	pub fn set_count(&self, value: u32) -> Result<()> {
		let mut count = self.count.lock();
		if value > *count {
			return Err(corrupted(format!("cannot raise record count from {} to {}", *count, value)));
		}
		*count = value;
		Ok(())
	}

	/// Appends `n` records and returns the index of the first one.
	pub fn new_records(&self, n: u32) -> Result<u32> {
		let mut count = self.count.lock();
		let first = *count;
		let next = first.checked_add(n).ok_or_else(|| corrupted("record count overflow"))?;
		self.map.reserve(self.end(next))?;
		*count = next;
		Ok(first)
	}

	pub fn get(&self, index: u32) -> MemoryRef {
		MemoryRef::new(self.map.clone(), self.end(index))
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use memory::MemoryMap;
	use super::RecordManager;

	fn open_map(temp: &TempDir) -> Arc<MemoryMap> {
		let path = temp.path().join("records");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 150));
		map.open().unwrap();
		map
	}

	#[test]
	fn test_new_records_and_sync() {
		let temp = TempDir::new("test_new_records_and_sync").unwrap();
		let map = open_map(&temp);
		let manager = RecordManager::new(map.clone(), 0, 8);
		manager.create().unwrap();

		assert_eq!(manager.new_records(1).unwrap(), 0);
		assert_eq!(manager.new_records(3).unwrap(), 1);
		assert_eq!(manager.count(), 4);
		manager.get(2).write_u64(0, 99).unwrap();
		manager.sync().unwrap();

		let reopened = RecordManager::new(map, 0, 8);
		reopened.start().unwrap();
		assert_eq!(reopened.count(), 4);
		assert_eq!(reopened.get(2).read_u64(0).unwrap(), 99);
	}

	#[test]
	fn test_count_is_persisted_by_sync_only() {
		let temp = TempDir::new("test_count_is_persisted_by_sync_only").unwrap();
		let map = open_map(&temp);
		let manager = RecordManager::new(map.clone(), 0, 4);
		manager.create().unwrap();
		manager.new_records(2).unwrap();

		let other = RecordManager::new(map, 0, 4);
		other.start().unwrap();
		assert_eq!(other.count(), 0);
	}

	#[test]
	fn test_set_count_only_truncates() {
		let temp = TempDir::new("test_set_count_only_truncates").unwrap();
		let manager = RecordManager::new(open_map(&temp), 0, 4);
		manager.create().unwrap();
		manager.new_records(5).unwrap();
		manager.set_count(2).unwrap();
		assert_eq!(manager.count(), 2);
		assert!(manager.set_count(3).is_err());
		assert_eq!(manager.new_records(1).unwrap(), 2);
	}
}
