use error::{corrupted, Result};
use memory::MemoryRef;
use primitives::{Link, RecordHashTable, RecordManager};

/// One key to many rows.
///
/// The table maps a key to the index of its newest row. Rows form a list
/// from newest to oldest.
///
/// ```text
///  next  payload
///   /     /
/// |....|.......|
/// ```
pub struct RecordMultimap {
	table: RecordHashTable,
	rows: RecordManager,
}

/// Payloads of one key, newest first.
pub struct RowIterator<'a> {
	rows: &'a RecordManager,
	current: u32,
	remaining: u32,
}

impl<'a> Iterator for RowIterator<'a> {
	type Item = Result<MemoryRef>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.current == u32::EMPTY {
			return None;
		}

		// a cycle would never end
		if self.remaining == 0 {
			self.current = u32::EMPTY;
			return Some(Err(corrupted("multimap row list is cyclic")));
		}
		self.remaining -= 1;

		let row = self.rows.get(self.current);
		match row.read_u32(0) {
			Ok(next) => {
				self.current = next;
				Some(Ok(row.advance(u32::SIZE)))
			},
			Err(err) => {
				self.current = u32::EMPTY;
				Some(Err(err))
			},
		}
	}
}

impl RecordMultimap {
	/// The table must store `u32` values, the rows manager `u32` prefixed payloads.
	pub fn new(table: RecordHashTable, rows: RecordManager) -> Self {
		RecordMultimap { table, rows }
	}

	pub fn table(&self) -> &RecordHashTable {
		&self.table
	}

	pub fn rows(&self) -> &RecordManager {
		&self.rows
	}

	pub fn create(&self) -> Result<()> {
		self.table.create()?;
		self.rows.create()
	}

	pub fn start(&self) -> Result<()> {
		self.table.start()?;
		self.rows.start()
	}

	pub fn sync(&self) -> Result<()> {
		self.table.sync()?;
		self.rows.sync()
	}

	pub fn lookup(&self, key: &[u8]) -> Result<RowIterator> {
		let head = match self.table.find(key)? {
			Some(value) => value.read_u32(0)?,
			None => u32::EMPTY,
		};

		Ok(RowIterator {
			rows: &self.rows,
			current: head,
			remaining: self.rows.count(),
		})
	}

	/// Prepends a row to the key's list.
	pub fn add_row(&self, key: &[u8], payload: &[u8]) -> Result<()> {
		let index = self.rows.new_records(1)?;
		let row = self.rows.get(index);

		match self.table.find(key)? {
			Some(head) => {
				let next = head.read_u32(0)?;
				row.write_u32(0, next)?;
				row.write(u32::SIZE, payload)?;
				head.write_u32(0, index)
			},
			None => {
				row.write_u32(0, u32::EMPTY)?;
				row.write(u32::SIZE, payload)?;
				self.table.store(key, &index.to_bytes()).map(|_| ())
			},
		}
	}

	/// Removes the newest row of the key. The key is unlinked with its last row.
	pub fn delete_last_row(&self, key: &[u8]) -> Result<bool> {
		let head = match self.table.find(key)? {
			Some(head) => head,
			None => return Ok(false),
		};

		let index = head.read_u32(0)?;
		let next = self.rows.get(index).read_u32(0)?;
		if next == u32::EMPTY {
			self.table.unlink(key)?;
		} else {
			head.write_u32(0, next)?;
		}

		// the newest row overall is reused by the next add
		if index + 1 == self.rows.count() {
			self.rows.set_count(index)?;
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use error::Result;
	use memory::MemoryMap;
	use primitives::{RecordHashTable, RecordManager};
	use super::RecordMultimap;

	fn open_map(temp: &TempDir, name: &str) -> Arc<MemoryMap> {
		let path = temp.path().join(name);
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 150));
		map.open().unwrap();
		map
	}

	fn multimap(temp: &TempDir) -> RecordMultimap {
		let table = RecordHashTable::record_table(open_map(temp, "table"), 8, 2, 4);
		let rows = RecordManager::new(open_map(temp, "rows"), 0, 4 + 1);
		let multimap = RecordMultimap::new(table, rows);
		multimap.create().unwrap();
		multimap
	}

	fn values(multimap: &RecordMultimap, key: &[u8]) -> Vec<u8> {
		multimap.lookup(key).unwrap()
			.map(|row| row.and_then(|row| row.read_u8(0)))
			.collect::<Result<Vec<_>>>()
			.unwrap()
	}

	#[test]
	fn test_rows_are_newest_first() {
		let temp = TempDir::new("test_rows_are_newest_first").unwrap();
		let multimap = multimap(&temp);
		multimap.add_row(b"aa", &[1]).unwrap();
		multimap.add_row(b"bb", &[9]).unwrap();
		multimap.add_row(b"aa", &[2]).unwrap();
		multimap.add_row(b"aa", &[3]).unwrap();

		assert_eq!(values(&multimap, b"aa"), vec![3, 2, 1]);
		assert_eq!(values(&multimap, b"bb"), vec![9]);
		assert_eq!(values(&multimap, b"cc"), Vec::<u8>::new());
	}

	#[test]
	fn test_delete_last_row_restores_previous_state() {
		let temp = TempDir::new("test_delete_last_row_restores_previous_state").unwrap();
		let multimap = multimap(&temp);
		multimap.add_row(b"aa", &[1]).unwrap();
		multimap.add_row(b"aa", &[2]).unwrap();

		assert!(multimap.delete_last_row(b"aa").unwrap());
		assert_eq!(values(&multimap, b"aa"), vec![1]);
		assert!(multimap.delete_last_row(b"aa").unwrap());
		assert_eq!(values(&multimap, b"aa"), Vec::<u8>::new());
		assert!(multimap.table().find(b"aa").unwrap().is_none());
		assert!(!multimap.delete_last_row(b"aa").unwrap());

		multimap.add_row(b"aa", &[4]).unwrap();
		assert_eq!(values(&multimap, b"aa"), vec![4]);
	}
}
