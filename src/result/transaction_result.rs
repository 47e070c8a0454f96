use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use chain::{Input, Output, Script, Transaction};
use chain::encode::{read_length, read_bytes, write_compact_size, write_bytes};
use error::Result;
use memory::MemoryRef;

/// Spender height of an unspent output.
pub const NOT_SPENT: u32 = u32::MAX;

/// Stored transaction, decoded on demand.
///
/// ```text
///  height  position  version  locktime  inputs  outputs
///   /       /         /        /         /       /
/// |....|....|....|....|... ... |... ... |
/// ```
///
/// Every output is prefixed with the height of the block spending it.
#[derive(Debug, Clone)]
pub struct TransactionResult {
	slab: MemoryRef,
}

impl TransactionResult {
	const HEIGHT_OFFSET: usize = 0;
	const POSITION_OFFSET: usize = 4;
	const VERSION_OFFSET: usize = 8;
	const LOCKTIME_OFFSET: usize = 12;
	const INPUTS_OFFSET: usize = 16;

	pub fn new(slab: MemoryRef) -> Self {
		TransactionResult { slab }
	}

	pub(crate) fn serialize(tx: &Transaction, height: u32, position: u32) -> Vec<u8> {
		let mut data = Vec::with_capacity(tx.serialized_size() + 8 + tx.outputs.len() * 4);
		data.extend_from_slice(&height.to_le_bytes());
		data.extend_from_slice(&position.to_le_bytes());
		data.extend_from_slice(&tx.version.to_le_bytes());
		data.extend_from_slice(&tx.locktime.to_le_bytes());
		write_compact_size(&mut data, tx.inputs.len() as u64);
		for input in &tx.inputs {
			input.write_to(&mut data);
		}
		write_compact_size(&mut data, tx.outputs.len() as u64);
		for output in &tx.outputs {
			data.extend_from_slice(&NOT_SPENT.to_le_bytes());
			data.extend_from_slice(&output.value.to_le_bytes());
			write_bytes(&mut data, output.script.as_bytes());
		}
		data
	}

	pub fn height(&self) -> Result<u32> {
		self.slab.read_u32(Self::HEIGHT_OFFSET)
	}

	pub fn position(&self) -> Result<u32> {
		self.slab.read_u32(Self::POSITION_OFFSET)
	}

	pub fn version(&self) -> Result<u32> {
		self.slab.read_u32(Self::VERSION_OFFSET)
	}

	pub fn locktime(&self) -> Result<u32> {
		self.slab.read_u32(Self::LOCKTIME_OFFSET)
	}

	/// Runs `f` over a cursor positioned at the first output.
	fn with_outputs<F, T>(&self, f: F) -> Result<T> where
		F: FnOnce(&mut Cursor<&[u8]>, usize) -> Result<T>,
	{
		self.slab.with_tail(Self::INPUTS_OFFSET, |bytes| {
			let mut cursor = Cursor::new(bytes);
			for _ in 0..read_length(&mut cursor)? {
				Input::read_from(&mut cursor)?;
			}
			let count = read_length(&mut cursor)?;
			f(&mut cursor, count)
		})?
	}

	fn read_output(cursor: &mut Cursor<&[u8]>) -> Result<(u32, Output)> {
		let spender_height = cursor.read_u32::<LittleEndian>()?;
		let value = cursor.read_u64::<LittleEndian>()?;
		let script = Script(read_bytes(cursor)?);
		Ok((spender_height, Output::new(value, script)))
	}

	pub fn output_count(&self) -> Result<usize> {
		self.with_outputs(|_, count| Ok(count))
	}

	/// Output `index` with its spender height, `None` if out of range.
	fn spendable(&self, index: u32) -> Result<Option<(u32, Output)>> {
		self.with_outputs(|cursor, count| {
			if index as usize >= count {
				return Ok(None);
			}
			for _ in 0..index {
				Self::read_output(cursor)?;
			}
			Self::read_output(cursor).map(Some)
		})
	}

	pub fn output(&self, index: u32) -> Result<Option<Output>> {
		Ok(self.spendable(index)?.map(|(_, output)| output))
	}

	/// Height of the block spending output `index`, `NOT_SPENT` if unspent.
	pub fn spender_height(&self, index: u32) -> Result<Option<u32>> {
		Ok(self.spendable(index)?.map(|(height, _)| height))
	}

	/// Offset of the spender height of output `index` within the slab.
	pub(crate) fn spender_height_offset(&self, index: u32) -> Result<Option<usize>> {
		self.with_outputs(|cursor, count| {
			if index as usize >= count {
				return Ok(None);
			}
			for _ in 0..index {
				Self::read_output(cursor)?;
			}
			Ok(Some(Self::INPUTS_OFFSET + cursor.position() as usize))
		})
	}

	pub(crate) fn set_spender_height(&self, index: u32, height: u32) -> Result<bool> {
		match self.spender_height_offset(index)? {
			Some(offset) => {
				self.slab.write_u32(offset, height)?;
				Ok(true)
			},
			None => Ok(false),
		}
	}

	/// True if every output is spent at or below `fork_height`.
	pub fn is_spent(&self, fork_height: u32) -> Result<bool> {
		self.with_outputs(|cursor, count| {
			for _ in 0..count {
				let (spender_height, _) = Self::read_output(cursor)?;
				if spender_height == NOT_SPENT || spender_height > fork_height {
					return Ok(false);
				}
			}
			Ok(true)
		})
	}

	pub fn transaction(&self) -> Result<Transaction> {
		let version = self.version()?;
		let locktime = self.locktime()?;
		self.slab.with_tail(Self::INPUTS_OFFSET, |bytes| {
			let mut cursor = Cursor::new(bytes);
			let inputs = (0..read_length(&mut cursor)?)
				.map(|_| Input::read_from(&mut cursor))
				.collect::<Result<Vec<_>>>()?;
			let outputs = (0..read_length(&mut cursor)?)
				.map(|_| Self::read_output(&mut cursor).map(|(_, output)| output))
				.collect::<Result<Vec<_>>>()?;
			Ok(Transaction::new(version, inputs, outputs, locktime))
		})?
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use std::sync::Arc;
	use self::tempdir::TempDir;
	use chain::{Hash, Input, Output, OutputPoint, Script, Transaction};
	use memory::{MemoryMap, MemoryRef};
	use super::{TransactionResult, NOT_SPENT};

	fn stored(temp: &TempDir, tx: &Transaction) -> TransactionResult {
		let path = temp.path().join("tx");
		MemoryMap::touch(&path).unwrap();
		let map = Arc::new(MemoryMap::new(&path, 100));
		map.open().unwrap();

		let data = TransactionResult::serialize(tx, 5, 1);
		map.resize(data.len()).unwrap();
		let slab = MemoryRef::new(map, 0);
		slab.write(0, &data).unwrap();
		TransactionResult::new(slab)
	}

	fn transaction() -> Transaction {
		Transaction::new(
			2,
			vec![Input::new(OutputPoint::new(Hash([3u8; 32]), 1), Script::new(vec![1, 2, 3]))],
			vec![Output::new(10, Script::new(vec![0x51])), Output::new(20, Script::default())],
			99,
		)
	}

	#[test]
	fn test_fields() {
		let temp = TempDir::new("test_fields").unwrap();
		let tx = transaction();
		let result = stored(&temp, &tx);
		assert_eq!(result.height().unwrap(), 5);
		assert_eq!(result.position().unwrap(), 1);
		assert_eq!(result.version().unwrap(), 2);
		assert_eq!(result.locktime().unwrap(), 99);
		assert_eq!(result.output_count().unwrap(), 2);
		assert_eq!(result.output(1).unwrap(), Some(tx.outputs[1].clone()));
		assert_eq!(result.output(2).unwrap(), None);
		assert_eq!(result.transaction().unwrap(), tx);
	}

	#[test]
	fn test_is_spent_respects_fork_height() {
		let temp = TempDir::new("test_is_spent_respects_fork_height").unwrap();
		let result = stored(&temp, &transaction());
		assert!(!result.is_spent(100).unwrap());

		assert!(result.set_spender_height(0, 10).unwrap());
		assert_eq!(result.spender_height(0).unwrap(), Some(10));
		assert_eq!(result.spender_height(1).unwrap(), Some(NOT_SPENT));
		assert!(!result.is_spent(100).unwrap());

		assert!(result.set_spender_height(1, 20).unwrap());
		assert!(result.is_spent(20).unwrap());
		assert!(!result.is_spent(19).unwrap());
		assert!(!result.set_spender_height(2, 1).unwrap());

		// spending does not change the decoded transaction
		assert_eq!(result.transaction().unwrap(), transaction());
	}
}
