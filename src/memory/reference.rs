use std::fmt;
use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};

use error::Result;
use memory::MemoryMap;

/// Deferred position inside a memory map.
///
/// Every read or write takes a fresh accessor, so a reference stays valid
/// across remaps.
#[derive(Clone)]
pub struct MemoryRef {
	map: Arc<MemoryMap>,
	offset: usize,
}

impl fmt::Debug for MemoryRef {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("MemoryRef")
			.field("path", &self.map.path())
			.field("offset", &self.offset)
			.finish()
	}
}

impl MemoryRef {
	pub fn new(map: Arc<MemoryMap>, offset: usize) -> Self {
		MemoryRef { map, offset }
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Reference moved `by` bytes forward.
	pub fn advance(&self, by: usize) -> Self {
		MemoryRef {
			map: self.map.clone(),
			offset: self.offset + by,
		}
	}

	/// Runs `f` over `len` bytes starting at the reference.
	pub fn with<F, T>(&self, at: usize, len: usize, f: F) -> Result<T> where
		F: FnOnce(&[u8]) -> T,
	{
		let access = self.map.access()?;
		let bytes = access.get(self.offset + at, len)?;
		Ok(f(bytes))
	}

	/// Runs `f` over every used byte from the reference onwards.
	pub fn with_tail<F, T>(&self, at: usize, f: F) -> Result<T> where
		F: FnOnce(&[u8]) -> T,
	{
		let end = self.map.size();
		let access = self.map.access()?;
		let bytes = access.range(self.offset + at, end)?;
		Ok(f(bytes))
	}

	pub fn read(&self, at: usize, len: usize) -> Result<Vec<u8>> {
		self.with(at, len, |bytes| bytes.to_vec())
	}

	pub fn read_u8(&self, at: usize) -> Result<u8> {
		self.with(at, 1, |bytes| bytes[0])
	}

	pub fn read_u32(&self, at: usize) -> Result<u32> {
		self.with(at, 4, LittleEndian::read_u32)
	}

	pub fn read_u64(&self, at: usize) -> Result<u64> {
		self.with(at, 8, LittleEndian::read_u64)
	}

	pub fn write(&self, at: usize, data: &[u8]) -> Result<()> {
		self.map.access_mut()?.write(self.offset + at, data)
	}

	pub fn write_u32(&self, at: usize, value: u32) -> Result<()> {
		let mut buf = [0u8; 4];
		LittleEndian::write_u32(&mut buf, value);
		self.write(at, &buf)
	}

	pub fn write_u64(&self, at: usize, value: u64) -> Result<()> {
		let mut buf = [0u8; 8];
		LittleEndian::write_u64(&mut buf, value);
		self.write(at, &buf)
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use memory::MemoryMap;
	use super::MemoryRef;

	#[test]
	fn test_reference_survives_remap() {
		let temp = TempDir::new("test_reference_survives_remap").unwrap();
		let path = temp.path().join("map");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 100));
		map.open().unwrap();
		map.reserve(16).unwrap();

		let reference = MemoryRef::new(map.clone(), 4);
		reference.write_u32(0, 0xdead_beef).unwrap();
		reference.write_u64(4, 42).unwrap();
		map.reserve(1 << 16).unwrap();

		assert_eq!(reference.read_u32(0).unwrap(), 0xdead_beef);
		assert_eq!(reference.advance(4).read_u64(0).unwrap(), 42);
		assert_eq!(reference.with_tail(0, |bytes| bytes.len()).unwrap(), (1 << 16) - 4);
	}
}
