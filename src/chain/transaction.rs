use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use chain::{Hash, OutputPoint, Script, sha256d};
use chain::encode::{compact_size_len, write_compact_size, read_length, write_bytes, read_bytes};
use error::{corrupted, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
	pub previous_output: OutputPoint,
	pub script: Script,
	pub sequence: u32,
}

impl Input {
	pub fn new(previous_output: OutputPoint, script: Script) -> Self {
		Input {
			previous_output,
			script,
			sequence: u32::max_value(),
		}
	}

	pub fn serialized_size(&self) -> usize {
		OutputPoint::SIZE + compact_size_len(self.script.len() as u64) + self.script.len() + 4
	}

	pub fn write_to(&self, out: &mut Vec<u8>) {
		self.previous_output.write_to(out);
		write_bytes(out, self.script.as_bytes());
		let _ = out.write_u32::<LittleEndian>(self.sequence);
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
		let previous_output = OutputPoint::read_from(reader)?;
		let script = Script(read_bytes(reader)?);
		let sequence = reader.read_u32::<LittleEndian>()?;
		Ok(Input { previous_output, script, sequence })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
	pub value: u64,
	pub script: Script,
}

impl Output {
	pub fn new(value: u64, script: Script) -> Self {
		Output { value, script }
	}

	pub fn serialized_size(&self) -> usize {
		8 + compact_size_len(self.script.len() as u64) + self.script.len()
	}

	pub fn write_to(&self, out: &mut Vec<u8>) {
		let _ = out.write_u64::<LittleEndian>(self.value);
		write_bytes(out, self.script.as_bytes());
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
		let value = reader.read_u64::<LittleEndian>()?;
		let script = Script(read_bytes(reader)?);
		Ok(Output { value, script })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	pub version: u32,
	pub inputs: Vec<Input>,
	pub outputs: Vec<Output>,
	pub locktime: u32,
}

impl Transaction {
	pub fn new(version: u32, inputs: Vec<Input>, outputs: Vec<Output>, locktime: u32) -> Self {
		Transaction { version, inputs, outputs, locktime }
	}

	pub fn hash(&self) -> Hash {
		sha256d(&self.to_data())
	}

	pub fn is_coinbase(&self) -> bool {
		self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
	}

	pub fn total_output_value(&self) -> u64 {
		self.outputs.iter().fold(0u64, |total, output| total.saturating_add(output.value))
	}

	pub fn serialized_size(&self) -> usize {
		4 + compact_size_len(self.inputs.len() as u64)
			+ self.inputs.iter().map(Input::serialized_size).sum::<usize>()
			+ compact_size_len(self.outputs.len() as u64)
			+ self.outputs.iter().map(Output::serialized_size).sum::<usize>()
			+ 4
	}

	pub fn to_data(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.serialized_size());
		let _ = out.write_u32::<LittleEndian>(self.version);
		write_compact_size(&mut out, self.inputs.len() as u64);
		for input in &self.inputs {
			input.write_to(&mut out);
		}
		write_compact_size(&mut out, self.outputs.len() as u64);
		for output in &self.outputs {
			output.write_to(&mut out);
		}
		let _ = out.write_u32::<LittleEndian>(self.locktime);
		out
	}

	pub fn from_data(data: &[u8]) -> Result<Self> {
		let mut cursor = Cursor::new(data);
		let tx = Self::read_from(&mut cursor)?;
		if cursor.position() as usize != data.len() {
			return Err(corrupted("trailing bytes after transaction"));
		}
		Ok(tx)
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
		let version = reader.read_u32::<LittleEndian>()?;
		let inputs = (0..read_length(reader)?)
			.map(|_| Input::read_from(reader))
			.collect::<Result<Vec<_>>>()?;
		let outputs = (0..read_length(reader)?)
			.map(|_| Output::read_from(reader))
			.collect::<Result<Vec<_>>>()?;
		let locktime = reader.read_u32::<LittleEndian>()?;
		Ok(Transaction { version, inputs, outputs, locktime })
	}
}

#[cfg(test)]
mod tests {
	use chain::{Hash, OutputPoint, Script, ShortHash};
	use super::{Input, Output, Transaction};

	fn coinbase() -> Transaction {
		Transaction::new(
			1,
			vec![Input::new(OutputPoint::null(), Script::new(vec![0x04, 0xff, 0xff, 0x00, 0x1d]))],
			vec![Output::new(50, Script::to_pay_key_hash(&ShortHash([1u8; 20])))],
			0,
		)
	}

	#[test]
	fn test_transaction_data() {
		let tx = coinbase();
		let data = tx.to_data();
		assert_eq!(data.len(), tx.serialized_size());
		assert_eq!(Transaction::from_data(&data).unwrap(), tx);
	}

	#[test]
	fn test_transaction_trailing_bytes() {
		let mut data = coinbase().to_data();
		data.push(0);
		assert!(Transaction::from_data(&data).is_err());
		data.truncate(10);
		assert!(Transaction::from_data(&data).is_err());
	}

	#[test]
	fn test_is_coinbase() {
		assert!(coinbase().is_coinbase());
		let spend = Transaction::new(
			1,
			vec![Input::new(OutputPoint::new(Hash([1u8; 32]), 0), Script::default())],
			vec![],
			0,
		);
		assert!(!spend.is_coinbase());
	}
}
