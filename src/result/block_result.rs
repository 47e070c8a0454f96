use chain::{Hash, Header};
use error::{ErrorKind, Result};
use memory::MemoryRef;

/// Stored block, decoded field by field on demand.
///
/// ```text
///  header  height  tx count  tx hashes
///   /       /       /         /
/// |......|....|....|..... ... |
/// ```
#[derive(Debug, Clone)]
pub struct BlockResult {
	slab: MemoryRef,
}

impl BlockResult {
	const HEIGHT_OFFSET: usize = Header::SIZE;
	const COUNT_OFFSET: usize = Header::SIZE + 4;
	const HASHES_OFFSET: usize = Header::SIZE + 8;

	pub fn new(slab: MemoryRef) -> Self {
		BlockResult { slab }
	}

	pub(crate) fn slab_size(transactions: usize) -> usize {
		Self::HASHES_OFFSET + transactions * Hash::SIZE
	}

	pub(crate) fn serialize(header: &Header, height: u32, hashes: &[Hash]) -> Vec<u8> {
		let mut data = Vec::with_capacity(Self::slab_size(hashes.len()));
		data.extend_from_slice(&header.to_data());
		data.extend_from_slice(&height.to_le_bytes());
		data.extend_from_slice(&(hashes.len() as u32).to_le_bytes());
		for hash in hashes {
			data.extend_from_slice(&hash.0);
		}
		data
	}

	pub fn header(&self) -> Result<Header> {
		self.slab.with(0, Header::SIZE, Header::from_data)?
	}

	pub fn hash(&self) -> Result<Hash> {
		Ok(self.header()?.hash())
	}

	pub fn height(&self) -> Result<u32> {
		self.slab.read_u32(Self::HEIGHT_OFFSET)
	}

	/// Proof of work target of the header.
	pub fn bits(&self) -> Result<u32> {
		self.slab.read_u32(72)
	}

	pub fn timestamp(&self) -> Result<u32> {
		self.slab.read_u32(68)
	}

	pub fn transaction_count(&self) -> Result<usize> {
		Ok(self.slab.read_u32(Self::COUNT_OFFSET)? as usize)
	}

	pub fn transaction_hash(&self, index: usize) -> Result<Hash> {
		let count = self.transaction_count()?;
		if index >= count {
			return Err(ErrorKind::OutOfBounds(index, 1, count).into());
		}

		self.slab.with(Self::HASHES_OFFSET + index * Hash::SIZE, Hash::SIZE, |bytes| {
			let mut hash = [0u8; 32];
			hash.copy_from_slice(bytes);
			Hash(hash)
		})
	}

	pub fn transaction_hashes(&self) -> Result<Vec<Hash>> {
		let count = self.transaction_count()?;
		self.slab.with(Self::HASHES_OFFSET, count * Hash::SIZE, |bytes| {
			bytes.chunks(Hash::SIZE)
				.map(|chunk| {
					let mut hash = [0u8; 32];
					hash.copy_from_slice(chunk);
					Hash(hash)
				})
				.collect()
		})
	}
}
