use std::marker::PhantomData;
use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};

use error::{ErrorKind, Result};
use memory::{MemoryMap, MemoryRef};
use primitives::Link;

/// Bucket array at the front of a hash table file.
///
/// ```text
///  buckets  heads
///   /        /
/// |....|..........|
/// ```
pub struct HashTableHeader<L> {
	map: Arc<MemoryMap>,
	buckets: usize,
	link: PhantomData<L>,
}

impl<L: Link> HashTableHeader<L> {
	const COUNT_SIZE: usize = 4;

	pub fn new(map: Arc<MemoryMap>, buckets: usize) -> Self {
		HashTableHeader {
			map,
			buckets,
			link: PhantomData,
		}
	}

	pub fn size(buckets: usize) -> usize {
		Self::COUNT_SIZE + buckets * L::SIZE
	}

	pub fn buckets(&self) -> usize {
		self.buckets
	}

	/// Writes the bucket count and marks every bucket empty.
	pub fn create(&self) -> Result<()> {
		let size = Self::size(self.buckets);
		self.map.resize(size)?;

		let mut access = self.map.access_mut()?;
		let bytes = access.get_mut(0, size)?;
		LittleEndian::write_u32(&mut bytes[..Self::COUNT_SIZE], self.buckets as u32);
		for byte in &mut bytes[Self::COUNT_SIZE..] {
			*byte = 0xff;
		}
		Ok(())
	}

	/// Verifies the stored bucket count.
	pub fn start(&self) -> Result<()> {
		let stored = {
			let access = self.map.access()?;
			LittleEndian::read_u32(access.get(0, Self::COUNT_SIZE)?) as usize
		};

		if stored != self.buckets {
			return Err(ErrorKind::InvalidOptions(
				"buckets",
				format!("{} is stored in {}, {} was requested", stored, self.map.path().display(), self.buckets),
			).into());
		}
		Ok(())
	}

	fn bucket(&self, index: usize) -> MemoryRef {
		debug_assert!(index < self.buckets);
		MemoryRef::new(self.map.clone(), Self::COUNT_SIZE + index * L::SIZE)
	}

	pub fn read(&self, index: usize) -> Result<L> {
		self.bucket(index).with(0, L::SIZE, L::read)
	}

	pub fn write(&self, index: usize, link: L) -> Result<()> {
		self.bucket(index).write(0, &link.to_bytes())
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use error::ErrorKind;
	use memory::MemoryMap;
	use primitives::Link;
	use super::HashTableHeader;

	#[test]
	fn test_create_marks_buckets_empty() {
		let temp = TempDir::new("test_create_marks_buckets_empty").unwrap();
		let path = temp.path().join("table");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 150));
		map.open().unwrap();

		let header = HashTableHeader::<u64>::new(map.clone(), 10);
		header.create().unwrap();
		assert_eq!(map.size(), HashTableHeader::<u64>::size(10));
		header.start().unwrap();
		for i in 0..10 {
			assert_eq!(header.read(i).unwrap(), u64::EMPTY);
		}

		header.write(3, 77).unwrap();
		assert_eq!(header.read(3).unwrap(), 77);
		assert_eq!(header.read(4).unwrap(), u64::EMPTY);
	}

	#[test]
	fn test_start_rejects_other_bucket_count() {
		let temp = TempDir::new("test_start_rejects_other_bucket_count").unwrap();
		let path = temp.path().join("table");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 150));
		map.open().unwrap();

		HashTableHeader::<u32>::new(map.clone(), 10).create().unwrap();
		let err = HashTableHeader::<u32>::new(map, 11).start().unwrap_err();
		assert!(matches!(*err.kind(), ErrorKind::InvalidOptions("buckets", _)));
	}
}
