use std::path::Path;
use std::sync::Arc;

use chain::{Block, Hash};
use databases::{Storage, new_map};
use error::Result;
use memory::MemoryMap;
use primitives::{Link, RecordManager, SlabHashTable, StatInfo};
use result::BlockResult;

/// Blocks by hash and by height.
///
/// The index file holds one slab link per height, empty links mark gaps.
pub struct BlockDatabase {
	lookup_map: Arc<MemoryMap>,
	index_map: Arc<MemoryMap>,
	lookup: SlabHashTable,
	index: RecordManager,
}

impl BlockDatabase {
	pub fn new<P: AsRef<Path>>(lookup_path: P, index_path: P, buckets: usize, expansion: usize) -> Self {
		let lookup_map = new_map(lookup_path, expansion);
		let index_map = new_map(index_path, expansion);
		BlockDatabase {
			lookup: SlabHashTable::slab_table(lookup_map.clone(), buckets, Hash::SIZE),
			index: RecordManager::new(index_map.clone(), 0, u64::SIZE),
			lookup_map,
			index_map,
		}
	}

	fn read_index(&self, height: u32) -> Result<u64> {
		self.index.get(height).read_u64(0)
	}

	/// Stores the block at `height`, extending the index with gaps if needed.
	pub fn store(&self, block: &Block, height: u32) -> Result<()> {
		let hashes: Vec<Hash> = block.transactions.iter().map(|tx| tx.hash()).collect();
		let data = BlockResult::serialize(&block.header, height, &hashes);
		let link = self.lookup.store(&block.hash().0, &data)?;

		let count = self.index.count();
		if height >= count {
			let first = self.index.new_records(height - count + 1)?;
			for gap in first..height {
				self.index.get(gap).write_u64(0, u64::EMPTY)?;
			}
		}
		self.index.get(height).write_u64(0, link)
	}

	pub fn get(&self, height: u32) -> Result<Option<BlockResult>> {
		if height >= self.index.count() {
			return Ok(None);
		}

		match self.read_index(height)? {
			link if link == u64::EMPTY => Ok(None),
			link => Ok(Some(BlockResult::new(self.lookup.value(link)))),
		}
	}

	pub fn get_by_hash(&self, hash: &Hash) -> Result<Option<BlockResult>> {
		Ok(self.lookup.find(&hash.0)?.map(BlockResult::new))
	}

	pub fn exists(&self, height: u32) -> Result<bool> {
		Ok(self.get(height)?.is_some())
	}

	/// Highest stored height, gaps below it notwithstanding.
	pub fn top(&self) -> Option<u32> {
		match self.index.count() {
			0 => None,
			count => Some(count - 1),
		}
	}

	/// Heights below the top without a block.
	pub fn gaps(&self) -> Result<Vec<u32>> {
		let mut gaps = Vec::new();
		for height in 0..self.index.count() {
			if self.read_index(height)? == u64::EMPTY {
				gaps.push(height);
			}
		}
		Ok(gaps)
	}

	/// Removes the blocks at and above `from_height`. Returns false if there are none.
	pub fn unlink(&self, from_height: u32) -> Result<bool> {
		let count = self.index.count();
		if from_height >= count {
			return Ok(false);
		}

		for height in from_height..count {
			if let Some(block) = self.get(height)? {
				self.lookup.unlink(&block.hash()?.0)?;
			}
		}

		// the top is never a gap
		let mut new_count = from_height;
		while new_count > 0 && self.read_index(new_count - 1)? == u64::EMPTY {
			new_count -= 1;
		}
		self.index.set_count(new_count)?;
		Ok(true)
	}

	pub fn statinfo(&self) -> StatInfo {
		StatInfo {
			buckets: self.lookup.buckets(),
			rows: self.index.count() as usize,
		}
	}
}

impl Storage for BlockDatabase {
	fn maps(&self) -> Vec<&Arc<MemoryMap>> {
		vec![&self.lookup_map, &self.index_map]
	}

	fn create_structures(&self) -> Result<()> {
		self.lookup.create()?;
		self.index.create()
	}

	fn start_structures(&self) -> Result<()> {
		self.lookup.start()?;
		self.index.start()
	}

	fn sync(&self) -> Result<()> {
		self.lookup.sync()?;
		self.index.sync()
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use chain::{Block, Header, Hash};
	use databases::Storage;
	use memory::MemoryMap;
	use super::BlockDatabase;

	fn database(temp: &TempDir) -> BlockDatabase {
		let lookup = temp.path().join("block_table");
		let index = temp.path().join("block_index");
		MemoryMap::touch(&lookup).unwrap();
		MemoryMap::touch(&index).unwrap();
		let db = BlockDatabase::new(lookup, index, 16, 150);
		db.create().unwrap();
		db
	}

	fn block(nonce: u32) -> Block {
		Block::new(Header { nonce, ..Header::default() }, vec![])
	}

	#[test]
	fn test_store_and_get() {
		let temp = TempDir::new("test_block_store_and_get").unwrap();
		let db = database(&temp);
		let block = block(1);
		db.store(&block, 0).unwrap();

		let by_height = db.get(0).unwrap().unwrap();
		assert_eq!(by_height.header().unwrap(), block.header);
		assert_eq!(by_height.height().unwrap(), 0);
		let by_hash = db.get_by_hash(&block.hash()).unwrap().unwrap();
		assert_eq!(by_hash.height().unwrap(), 0);
		assert!(db.get(1).unwrap().is_none());
		assert!(db.get_by_hash(&Hash::default()).unwrap().is_none());
	}

	#[test]
	fn test_gaps_and_top() {
		let temp = TempDir::new("test_gaps_and_top").unwrap();
		let db = database(&temp);
		assert_eq!(db.top(), None);
		db.store(&block(0), 0).unwrap();
		db.store(&block(1), 1).unwrap();
		db.store(&block(3), 3).unwrap();

		assert_eq!(db.top(), Some(3));
		assert_eq!(db.gaps().unwrap(), vec![2]);
		assert!(!db.exists(2).unwrap());

		// unlinking the top trims the gap below it
		assert!(db.unlink(3).unwrap());
		assert_eq!(db.top(), Some(1));
		assert_eq!(db.gaps().unwrap(), Vec::<u32>::new());
		assert!(db.get_by_hash(&block(3).hash()).unwrap().is_none());
		assert!(!db.unlink(2).unwrap());
	}

	#[test]
	fn test_survives_restart() {
		let temp = TempDir::new("test_block_survives_restart").unwrap();
		let db = database(&temp);
		db.store(&block(5), 0).unwrap();
		db.sync().unwrap();
		db.close().unwrap();

		db.start().unwrap();
		assert_eq!(db.top(), Some(0));
		assert_eq!(db.get(0).unwrap().unwrap().header().unwrap().nonce, 5);
	}
}
