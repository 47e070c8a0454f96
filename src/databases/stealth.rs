use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ByteOrder};

use chain::{Hash, ShortHash};
use databases::{Storage, new_map};
use error::{ErrorKind, Result};
use memory::MemoryMap;
use primitives::RecordManager;

/// Prefix filter over the leading bits of stealth prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthFilter {
	bits: u8,
	prefix: u32,
}

impl StealthFilter {
	pub fn new(bits: u8, prefix: u32) -> Result<Self> {
		if bits > 32 {
			return Err(ErrorKind::InvalidOptions("bits", format!("{} exceeds 32", bits)).into());
		}
		Ok(StealthFilter { bits, prefix })
	}

	/// Filter accepting every row.
	pub fn any() -> Self {
		StealthFilter { bits: 0, prefix: 0 }
	}

	pub fn matches(&self, prefix: u32) -> bool {
		match self.bits {
			0 => true,
			bits => (prefix ^ self.prefix) >> (32 - bits as u32) == 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthRow {
	pub prefix: u32,
	pub height: u32,
	pub ephemeral_key: Hash,
	pub address: ShortHash,
	pub transaction_hash: Hash,
}

impl StealthRow {
	/// prefix, height, ephemeral key, address, transaction hash
	const SIZE: usize = 4 + 4 + 32 + 20 + 32;

	fn to_bytes(&self) -> Vec<u8> {
		let mut data = Vec::with_capacity(Self::SIZE);
		data.extend_from_slice(&self.prefix.to_le_bytes());
		data.extend_from_slice(&self.height.to_le_bytes());
		data.extend_from_slice(&self.ephemeral_key.0);
		data.extend_from_slice(&self.address.0);
		data.extend_from_slice(&self.transaction_hash.0);
		data
	}

	fn from_bytes(bytes: &[u8]) -> Self {
		let mut ephemeral_key = [0u8; 32];
		ephemeral_key.copy_from_slice(&bytes[8..40]);
		let mut address = [0u8; 20];
		address.copy_from_slice(&bytes[40..60]);
		let mut transaction_hash = [0u8; 32];
		transaction_hash.copy_from_slice(&bytes[60..92]);

		StealthRow {
			prefix: LittleEndian::read_u32(&bytes[0..4]),
			height: LittleEndian::read_u32(&bytes[4..8]),
			ephemeral_key: Hash(ephemeral_key),
			address: ShortHash(address),
			transaction_hash: Hash(transaction_hash),
		}
	}
}

/// Append-only stealth rows in height order.
pub struct StealthDatabase {
	rows_map: Arc<MemoryMap>,
	rows: RecordManager,
}

impl StealthDatabase {
	pub fn new<P: AsRef<Path>>(rows_path: P, expansion: usize) -> Self {
		let rows_map = new_map(rows_path, expansion);
		StealthDatabase {
			rows: RecordManager::new(rows_map.clone(), 0, StealthRow::SIZE),
			rows_map,
		}
	}

	pub fn store(&self, row: &StealthRow) -> Result<()> {
		let index = self.rows.new_records(1)?;
		self.rows.get(index).write(0, &row.to_bytes())
	}

	fn row(&self, index: u32) -> Result<StealthRow> {
		self.rows.get(index).with(0, StealthRow::SIZE, StealthRow::from_bytes)
	}

	/// Rows at or above `from_height` whose prefix matches the filter, oldest first.
	pub fn scan(&self, filter: &StealthFilter, from_height: u32) -> Result<Vec<StealthRow>> {
		let mut result = Vec::new();
		for index in 0..self.rows.count() {
			let row = self.row(index)?;
			if row.height >= from_height && filter.matches(row.prefix) {
				result.push(row);
			}
		}
		Ok(result)
	}

	/// Removes the trailing rows stored at or above `from_height`.
	pub fn unlink(&self, from_height: u32) -> Result<()> {
		let mut count = self.rows.count();
		while count > 0 && self.row(count - 1)?.height >= from_height {
			count -= 1;
		}
		self.rows.set_count(count)
	}

	pub fn rows(&self) -> usize {
		self.rows.count() as usize
	}
}

impl Storage for StealthDatabase {
	fn maps(&self) -> Vec<&Arc<MemoryMap>> {
		vec![&self.rows_map]
	}

	fn create_structures(&self) -> Result<()> {
		self.rows.create()
	}

	fn start_structures(&self) -> Result<()> {
		self.rows.start()
	}

	fn sync(&self) -> Result<()> {
		self.rows.sync()
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use chain::{Hash, ShortHash};
	use databases::Storage;
	use memory::MemoryMap;
	use super::{StealthDatabase, StealthFilter, StealthRow};

	fn row(prefix: u32, height: u32) -> StealthRow {
		StealthRow {
			prefix,
			height,
			ephemeral_key: Hash([height as u8; 32]),
			address: ShortHash([1u8; 20]),
			transaction_hash: Hash([2u8; 32]),
		}
	}

	#[test]
	fn test_filter_matches_leading_bits() {
		let filter = StealthFilter::new(4, 0xa000_0000).unwrap();
		assert!(filter.matches(0xafff_ffff));
		assert!(!filter.matches(0xb000_0000));
		assert!(StealthFilter::any().matches(0x1234_5678));
		assert!(StealthFilter::new(32, 7).unwrap().matches(7));
		assert!(StealthFilter::new(33, 0).is_err());
	}

	#[test]
	fn test_scan_and_unlink() {
		let temp = TempDir::new("test_stealth_scan_and_unlink").unwrap();
		let path = temp.path().join("stealth_rows");
		MemoryMap::touch(&path).unwrap();
		let db = StealthDatabase::new(path, 150);
		db.create().unwrap();

		db.store(&row(0xa000_0000, 1)).unwrap();
		db.store(&row(0xb000_0000, 2)).unwrap();
		db.store(&row(0xa100_0000, 3)).unwrap();

		let filter = StealthFilter::new(4, 0xa000_0000).unwrap();
		assert_eq!(db.scan(&filter, 0).unwrap(), vec![row(0xa000_0000, 1), row(0xa100_0000, 3)]);
		assert_eq!(db.scan(&filter, 2).unwrap(), vec![row(0xa100_0000, 3)]);

		db.unlink(2).unwrap();
		assert_eq!(db.rows(), 1);
		assert_eq!(db.scan(&StealthFilter::any(), 0).unwrap(), vec![row(0xa000_0000, 1)]);
		db.unlink(5).unwrap();
		assert_eq!(db.rows(), 1);
	}
}
