use std::path::Path;
use std::sync::Arc;

use chain::OutputPoint;
use databases::{Storage, new_map};
use error::Result;
use memory::MemoryMap;
use primitives::{RecordHashTable, StatInfo};

/// Set of unspent outputs.
pub struct UnspentDatabase {
	lookup_map: Arc<MemoryMap>,
	lookup: RecordHashTable,
}

impl UnspentDatabase {
	pub fn new<P: AsRef<Path>>(lookup_path: P, buckets: usize, expansion: usize) -> Self {
		let lookup_map = new_map(lookup_path, expansion);
		UnspentDatabase {
			lookup: RecordHashTable::record_table(lookup_map.clone(), buckets, OutputPoint::SIZE, 0),
			lookup_map,
		}
	}

	pub fn store(&self, outpoint: &OutputPoint) -> Result<()> {
		self.lookup.store(&outpoint.to_key(), &[]).map(|_| ())
	}

	pub fn contains(&self, outpoint: &OutputPoint) -> Result<bool> {
		Ok(self.lookup.find_link(&outpoint.to_key())?.is_some())
	}

	/// Returns false if the output was not in the set.
	pub fn remove(&self, outpoint: &OutputPoint) -> Result<bool> {
		self.lookup.unlink(&outpoint.to_key())
	}

	pub fn statinfo(&self) -> StatInfo {
		StatInfo {
			buckets: self.lookup.buckets(),
			rows: self.lookup.rows(),
		}
	}
}

impl Storage for UnspentDatabase {
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
	use chain::{Hash, OutputPoint};
	use databases::Storage;
	use memory::MemoryMap;
	use super::UnspentDatabase;

	#[test]
	fn test_store_contains_remove() {
		let temp = TempDir::new("test_unspent_store_contains_remove").unwrap();
		let path = temp.path().join("unspent_table");
		MemoryMap::touch(&path).unwrap();
		let db = UnspentDatabase::new(path, 16, 150);
		db.create().unwrap();

		let point = OutputPoint::new(Hash([4u8; 32]), 1);
		assert!(!db.contains(&point).unwrap());
		db.store(&point).unwrap();
		assert!(db.contains(&point).unwrap());
		assert!(db.remove(&point).unwrap());
		assert!(!db.remove(&point).unwrap());
		assert!(!db.contains(&point).unwrap());
	}
}
