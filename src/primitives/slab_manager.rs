use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};
use parking_lot::Mutex;

use error::{corrupted, Result};
use memory::{MemoryMap, MemoryRef};

/// Variable-size slabs addressed by offset.
///
/// ```text
///  payload size  slabs
///   /             /
/// |........|..... ... |
/// ```
///
/// Offsets are relative to the manager and include the size prefix, so no slab
/// is ever found at offset zero.
pub struct SlabManager {
	map: Arc<MemoryMap>,
	base: usize,
	payload_size: Mutex<u64>,
}

impl SlabManager {
	const SIZE_SIZE: usize = 8;

	pub fn new(map: Arc<MemoryMap>, base: usize) -> Self {
		SlabManager {
			map,
			base,
			payload_size: Mutex::new(Self::SIZE_SIZE as u64),
		}
	}

	pub fn create(&self) -> Result<()> {
		let mut payload_size = self.payload_size.lock();
		*payload_size = Self::SIZE_SIZE as u64;
		self.map.reserve(self.base + Self::SIZE_SIZE)?;
		MemoryRef::new(self.map.clone(), self.base).write_u64(0, *payload_size)
	}

	pub fn start(&self) -> Result<()> {
		let stored = {
			let access = self.map.access()?;
			LittleEndian::read_u64(access.get(self.base, Self::SIZE_SIZE)?)
		};

		if stored < Self::SIZE_SIZE as u64 || self.base as u64 + stored > self.map.size() as u64 {
			return Err(corrupted(format!("slab payload size {} is invalid for {}", stored, self.map.path().display())));
		}

		*self.payload_size.lock() = stored;
		Ok(())
	}

	pub fn sync(&self) -> Result<()> {
		let payload_size = *self.payload_size.lock();
		MemoryRef::new(self.map.clone(), self.base).write_u64(0, payload_size)
	}

	pub fn payload_size(&self) -> u64 {
		*self.payload_size.lock()
	}

	/// Appends a slab of `size` bytes and returns its offset.
	pub fn new_slab(&self, size: usize) -> Result<u64> {
		let mut payload_size = self.payload_size.lock();
		let offset = *payload_size;
		let next = offset + size as u64;
		self.map.reserve(self.base + next as usize)?;
		*payload_size = next;
		Ok(offset)
	}

	pub fn get(&self, offset: u64) -> MemoryRef {
		MemoryRef::new(self.map.clone(), self.base + offset as usize)
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use memory::MemoryMap;
	use super::SlabManager;

	#[test]
	fn test_slabs_are_appended() {
		let temp = TempDir::new("test_slabs_are_appended").unwrap();
		let path = temp.path().join("slabs");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 150));
		map.open().unwrap();

		let manager = SlabManager::new(map.clone(), 16);
		manager.create().unwrap();
		let first = manager.new_slab(10).unwrap();
		let second = manager.new_slab(3).unwrap();
		assert_eq!(first, 8);
		assert_eq!(second, 18);
		assert_eq!(manager.payload_size(), 21);

		manager.get(second).write(0, b"abc").unwrap();
		manager.sync().unwrap();

		let reopened = SlabManager::new(map, 16);
		reopened.start().unwrap();
		assert_eq!(reopened.payload_size(), 21);
		assert_eq!(reopened.get(second).read(0, 3).unwrap(), b"abc");
	}
}
