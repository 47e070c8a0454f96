use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chain::{InputPoint, OutputPoint};
use databases::{Storage, new_map};
use error::Result;
use memory::MemoryMap;
use primitives::{RecordHashTable, StatInfo};

/// Spending input of every spent output.
pub struct SpendDatabase {
	lookup_map: Arc<MemoryMap>,
	lookup: RecordHashTable,
}

impl SpendDatabase {
	pub fn new<P: AsRef<Path>>(lookup_path: P, buckets: usize, expansion: usize) -> Self {
		let lookup_map = new_map(lookup_path, expansion);
		SpendDatabase {
			lookup: RecordHashTable::record_table(lookup_map.clone(), buckets, OutputPoint::SIZE, InputPoint::SIZE),
			lookup_map,
		}
	}

	pub fn store(&self, outpoint: &OutputPoint, spend: &InputPoint) -> Result<()> {
		self.lookup.store(&outpoint.to_key(), &spend.to_key()).map(|_| ())
	}

	pub fn get(&self, outpoint: &OutputPoint) -> Result<Option<InputPoint>> {
		match self.lookup.find(&outpoint.to_key())? {
			Some(value) => {
				let bytes = value.read(0, InputPoint::SIZE)?;
				InputPoint::read_from(&mut Cursor::new(bytes)).map(Some)
			},
			None => Ok(None),
		}
	}

	pub fn unlink(&self, outpoint: &OutputPoint) -> Result<bool> {
		self.lookup.unlink(&outpoint.to_key())
	}

	pub fn statinfo(&self) -> StatInfo {
		StatInfo {
			buckets: self.lookup.buckets(),
			rows: self.lookup.rows(),
		}
	}
}

impl Storage for SpendDatabase {
	fn maps(&self) -> Vec<&Arc<MemoryMap>> {
		vec![&self.lookup_map]
	}

	fn create_structures(&self) -> Result<()> {
		self.lookup.create()
	}

	fn start_structures(&self) -> Result<()> {
		self.lookup.start()
	}

	fn sync(&self) -> Result<()> {
		self.lookup.sync()
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use chain::{Hash, InputPoint, OutputPoint};
	use databases::Storage;
	use memory::MemoryMap;
	use super::SpendDatabase;

	#[test]
	fn test_store_get_unlink() {
		let temp = TempDir::new("test_spend_store_get_unlink").unwrap();
		let path = temp.path().join("spend_table");
		MemoryMap::touch(&path).unwrap();
		let db = SpendDatabase::new(path, 16, 150);
		db.create().unwrap();

		let outpoint = OutputPoint::new(Hash([1u8; 32]), 3);
		let spend = InputPoint::new(Hash([2u8; 32]), 0);
		assert_eq!(db.get(&outpoint).unwrap(), None);
		db.store(&outpoint, &spend).unwrap();
		assert_eq!(db.get(&outpoint).unwrap(), Some(spend));
		assert_eq!(db.get(&OutputPoint::new(Hash([1u8; 32]), 4)).unwrap(), None);
		assert_eq!(db.statinfo().rows, 1);

		assert!(db.unlink(&outpoint).unwrap());
		assert_eq!(db.get(&outpoint).unwrap(), None);
	}
}
