use std::io::Read;

use byteorder::{LittleEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use chain::Hash;
use error::Result;

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OutputPoint {
	pub hash: Hash,
	pub index: u32,
}

/// Reference to a transaction input. Same layout as an output point.
pub type InputPoint = OutputPoint;

impl OutputPoint {
	pub const SIZE: usize = 36;

	const CHECKSUM_MASK: u64 = 0xffff_ffff_ffff_8000;

	pub fn new(hash: Hash, index: u32) -> Self {
		OutputPoint { hash, index }
	}

	/// Previous output of a coinbase input.
	pub fn null() -> Self {
		OutputPoint {
			hash: Hash::default(),
			index: u32::MAX,
		}
	}

	pub fn is_null(&self) -> bool {
		self.index == u32::MAX && self.hash.is_zero()
	}

	/// Packs the upper 49 bits of the hash with the lower 15 bits of the index.
	pub fn checksum(&self) -> u64 {
		let upper = LittleEndian::read_u64(&self.hash.0[..8]) & Self::CHECKSUM_MASK;
		let lower = self.index as u64 & !Self::CHECKSUM_MASK;
		upper | lower
	}

	pub fn to_key(&self) -> [u8; 36] {
		let mut key = [0u8; 36];
		key[..32].copy_from_slice(&self.hash.0);
		LittleEndian::write_u32(&mut key[32..], self.index);
		key
	}

	pub fn write_to(&self, out: &mut Vec<u8>) {
		out.extend_from_slice(&self.hash.0);
		let _ = out.write_u32::<LittleEndian>(self.index);
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
		let mut hash = [0u8; 32];
		reader.read_exact(&mut hash)?;
		let index = reader.read_u32::<LittleEndian>()?;
		Ok(OutputPoint::new(Hash(hash), index))
	}
}

#[cfg(test)]
mod tests {
	use chain::Hash;
	use super::OutputPoint;

	#[test]
	fn test_checksum_packs_hash_and_index() {
		let mut hash = [0u8; 32];
		hash[0] = 0xff;
		hash[1] = 0xff;
		hash[7] = 0x12;
		let point = OutputPoint::new(Hash(hash), 0x1_0003);
		assert_eq!(point.checksum(), 0x1200_0000_0000_8000 | 0x0003);
	}

	#[test]
	fn test_null_point() {
		assert!(OutputPoint::null().is_null());
		assert!(!OutputPoint::new(Hash::default(), 0).is_null());
	}

	#[test]
	fn test_key_layout() {
		let point = OutputPoint::new(Hash([7u8; 32]), 2);
		let key = point.to_key();
		assert_eq!(&key[..32], &[7u8; 32][..]);
		assert_eq!(&key[32..], &[2, 0, 0, 0]);
		let mut data = Vec::new();
		point.write_to(&mut data);
		assert_eq!(&data[..], &key[..]);
	}
}
