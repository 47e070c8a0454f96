use std::path::Path;
use std::sync::Arc;

use chain::{Hash, OutputPoint, Transaction};
use databases::{Storage, new_map};
use error::Result;
use memory::MemoryMap;
use primitives::SlabHashTable;
use result::{TransactionResult, NOT_SPENT};

/// Transactions by hash, with the spender height of every output.
pub struct TransactionDatabase {
	lookup_map: Arc<MemoryMap>,
	lookup: SlabHashTable,
}

impl TransactionDatabase {
	pub fn new<P: AsRef<Path>>(lookup_path: P, buckets: usize, expansion: usize) -> Self {
		let lookup_map = new_map(lookup_path, expansion);
		TransactionDatabase {
			lookup: SlabHashTable::slab_table(lookup_map.clone(), buckets, Hash::SIZE),
			lookup_map,
		}
	}

	pub fn store(&self, tx: &Transaction, height: u32, position: u32) -> Result<()> {
		let data = TransactionResult::serialize(tx, height, position);
		self.lookup.store(&tx.hash().0, &data).map(|_| ())
	}

	pub fn get(&self, hash: &Hash) -> Result<Option<TransactionResult>> {
		Ok(self.lookup.find(&hash.0)?.map(TransactionResult::new))
	}

	pub fn exists(&self, hash: &Hash) -> Result<bool> {
		Ok(self.lookup.find_link(&hash.0)?.is_some())
	}

	/// Marks the output as spent at `height`. Returns false if the output is unknown.
	pub fn spend(&self, point: &OutputPoint, height: u32) -> Result<bool> {
		match self.get(&point.hash)? {
			Some(tx) => tx.set_spender_height(point.index, height),
			None => Ok(false),
		}
	}

	pub fn unspend(&self, point: &OutputPoint) -> Result<bool> {
		self.spend(point, NOT_SPENT)
	}

	pub fn unlink(&self, hash: &Hash) -> Result<bool> {
		self.lookup.unlink(&hash.0)
	}

	pub fn buckets(&self) -> usize {
		self.lookup.buckets()
	}
}

impl Storage for TransactionDatabase {
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
	use chain::{Hash, Input, Output, OutputPoint, Script, Transaction};
	use databases::Storage;
	use memory::MemoryMap;
	use result::NOT_SPENT;
	use super::TransactionDatabase;

	fn database(temp: &TempDir) -> TransactionDatabase {
		let path = temp.path().join("transaction_table");
		MemoryMap::touch(&path).unwrap();
		let db = TransactionDatabase::new(path, 16, 150);
		db.create().unwrap();
		db
	}

	fn transaction() -> Transaction {
		Transaction::new(
			1,
			vec![Input::new(OutputPoint::new(Hash([8u8; 32]), 0), Script::default())],
			vec![Output::new(5, Script::default()), Output::new(6, Script::default())],
			0,
		)
	}

	#[test]
	fn test_store_spend_unspend() {
		let temp = TempDir::new("test_store_spend_unspend").unwrap();
		let db = database(&temp);
		let tx = transaction();
		let hash = tx.hash();
		db.store(&tx, 3, 1).unwrap();

		let result = db.get(&hash).unwrap().unwrap();
		assert_eq!(result.height().unwrap(), 3);
		assert_eq!(result.position().unwrap(), 1);
		assert_eq!(result.transaction().unwrap(), tx);

		assert!(db.spend(&OutputPoint::new(hash, 1), 10).unwrap());
		assert!(!db.spend(&OutputPoint::new(hash, 2), 10).unwrap());
		assert!(!db.spend(&OutputPoint::new(Hash::default(), 0), 10).unwrap());
		assert_eq!(result.spender_height(1).unwrap(), Some(10));

		assert!(db.unspend(&OutputPoint::new(hash, 1)).unwrap());
		assert_eq!(result.spender_height(1).unwrap(), Some(NOT_SPENT));
	}

	#[test]
	fn test_unlink() {
		let temp = TempDir::new("test_transaction_unlink").unwrap();
		let db = database(&temp);
		let tx = transaction();
		db.store(&tx, 0, 0).unwrap();
		assert!(db.exists(&tx.hash()).unwrap());
		assert!(db.unlink(&tx.hash()).unwrap());
		assert!(!db.exists(&tx.hash()).unwrap());
		assert!(!db.unlink(&tx.hash()).unwrap());
	}
}
