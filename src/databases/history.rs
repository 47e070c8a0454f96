use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};

use chain::{InputPoint, OutputPoint, ShortHash};
use databases::{Storage, new_map};
use error::{corrupted, Result};
use memory::MemoryMap;
use primitives::{Link, RecordHashTable, RecordManager, RecordMultimap, StatInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
	Output,
	Spend,
}

impl PointKind {
	fn to_byte(self) -> u8 {
		match self {
			PointKind::Output => 0,
			PointKind::Spend => 1,
		}
	}

	fn from_byte(byte: u8) -> Result<Self> {
		match byte {
			0 => Ok(PointKind::Output),
			1 => Ok(PointKind::Spend),
			other => Err(corrupted(format!("unknown history row kind {}", other))),
		}
	}
}

/// Payment to or spend from an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRow {
	pub kind: PointKind,
	/// Output paying the address, or input spending from it.
	pub point: OutputPoint,
	pub height: u32,
	/// Output value, or checksum of the spent output for spends.
	pub value: u64,
}

impl HistoryRow {
	/// kind, point, height, value
	const SIZE: usize = 1 + OutputPoint::SIZE + 4 + 8;

	fn to_bytes(&self) -> Vec<u8> {
		let mut data = Vec::with_capacity(Self::SIZE);
		data.push(self.kind.to_byte());
		self.point.write_to(&mut data);
		data.extend_from_slice(&self.height.to_le_bytes());
		data.extend_from_slice(&self.value.to_le_bytes());
		data
	}

	fn from_bytes(bytes: &[u8]) -> Result<Self> {
		let mut cursor = Cursor::new(bytes);
		let kind = PointKind::from_byte(cursor.read_u8()?)?;
		let point = OutputPoint::read_from(&mut cursor)?;
		Ok(HistoryRow {
			kind,
			point,
			height: cursor.read_u32::<LittleEndian>()?,
			value: cursor.read_u64::<LittleEndian>()?,
		})
	}
}

/// Outputs and spends by address, newest first.
pub struct HistoryDatabase {
	lookup_map: Arc<MemoryMap>,
	rows_map: Arc<MemoryMap>,
	multimap: RecordMultimap,
}

impl HistoryDatabase {
	pub fn new<P: AsRef<Path>>(lookup_path: P, rows_path: P, buckets: usize, expansion: usize) -> Self {
		let lookup_map = new_map(lookup_path, expansion);
		let rows_map = new_map(rows_path, expansion);
		let table = RecordHashTable::record_table(lookup_map.clone(), buckets, ShortHash::SIZE, u32::SIZE);
		let rows = RecordManager::new(rows_map.clone(), 0, u32::SIZE + HistoryRow::SIZE);
		HistoryDatabase {
			lookup_map,
			rows_map,
			multimap: RecordMultimap::new(table, rows),
		}
	}

	pub fn add_output(&self, address: &ShortHash, outpoint: &OutputPoint, height: u32, value: u64) -> Result<()> {
		let row = HistoryRow {
			kind: PointKind::Output,
			point: *outpoint,
			height,
			value,
		};
		self.multimap.add_row(&address.0, &row.to_bytes())
	}

	pub fn add_input(&self, address: &ShortHash, inpoint: &InputPoint, height: u32, previous: &OutputPoint) -> Result<()> {
		let row = HistoryRow {
			kind: PointKind::Spend,
			point: *inpoint,
			height,
			value: previous.checksum(),
		};
		self.multimap.add_row(&address.0, &row.to_bytes())
	}

	/// Removes the newest row of the address.
	pub fn delete_last_row(&self, address: &ShortHash) -> Result<bool> {
		self.multimap.delete_last_row(&address.0)
	}

	/// Up to `limit` rows at or above `from_height`, newest first. A zero limit returns all rows.
	pub fn get(&self, address: &ShortHash, limit: usize, from_height: u32) -> Result<Vec<HistoryRow>> {
		let mut result = Vec::new();
		for row in self.multimap.lookup(&address.0)? {
			let row = row?.with(0, HistoryRow::SIZE, HistoryRow::from_bytes)??;
			if row.height < from_height {
				continue;
			}

			result.push(row);
			if limit != 0 && result.len() == limit {
				break;
			}
		}
		Ok(result)
	}

	pub fn statinfo(&self) -> StatInfo {
		StatInfo {
			buckets: self.multimap.table().buckets(),
			rows: self.multimap.rows().count() as usize,
		}
	}
}

impl Storage for HistoryDatabase {
	fn maps(&self) -> Vec<&Arc<MemoryMap>> {
		vec![&self.lookup_map, &self.rows_map]
	}

	fn create_structures(&self) -> Result<()> {
		self.multimap.create()
	}

	fn start_structures(&self) -> Result<()> {
		self.multimap.start()
	}

	fn sync(&self) -> Result<()> {
		self.multimap.sync()
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use chain::{Hash, OutputPoint, ShortHash};
	use databases::Storage;
	use memory::MemoryMap;
	use super::{HistoryDatabase, HistoryRow, PointKind};

	fn database(temp: &TempDir) -> HistoryDatabase {
		let lookup = temp.path().join("history_table");
		let rows = temp.path().join("history_rows");
		MemoryMap::touch(&lookup).unwrap();
		MemoryMap::touch(&rows).unwrap();
		let db = HistoryDatabase::new(lookup, rows, 16, 150);
		db.create().unwrap();
		db
	}

	#[test]
	fn test_rows_newest_first() {
		let temp = TempDir::new("test_history_rows_newest_first").unwrap();
		let db = database(&temp);
		let address = ShortHash([1u8; 20]);
		let output = OutputPoint::new(Hash([2u8; 32]), 0);
		let spend = OutputPoint::new(Hash([3u8; 32]), 1);

		db.add_output(&address, &output, 10, 5000).unwrap();
		db.add_input(&address, &spend, 12, &output).unwrap();

		let rows = db.get(&address, 0, 0).unwrap();
		assert_eq!(rows, vec![
			HistoryRow { kind: PointKind::Spend, point: spend, height: 12, value: output.checksum() },
			HistoryRow { kind: PointKind::Output, point: output, height: 10, value: 5000 },
		]);

		assert_eq!(db.get(&address, 1, 0).unwrap().len(), 1);
		assert_eq!(db.get(&address, 0, 11).unwrap().len(), 1);
		assert!(db.get(&ShortHash([9u8; 20]), 0, 0).unwrap().is_empty());
	}

	#[test]
	fn test_delete_last_row_is_lifo() {
		let temp = TempDir::new("test_history_delete_last_row_is_lifo").unwrap();
		let db = database(&temp);
		let address = ShortHash([1u8; 20]);
		for height in 0..3 {
			db.add_output(&address, &OutputPoint::new(Hash([height as u8; 32]), 0), height, 1).unwrap();
		}

		assert!(db.delete_last_row(&address).unwrap());
		let heights: Vec<u32> = db.get(&address, 0, 0).unwrap().iter().map(|row| row.height).collect();
		assert_eq!(heights, vec![1, 0]);

		assert!(db.delete_last_row(&address).unwrap());
		assert!(db.delete_last_row(&address).unwrap());
		assert!(!db.delete_last_row(&address).unwrap());
		assert!(db.get(&address, 0, 0).unwrap().is_empty());
	}
}
