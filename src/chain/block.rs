use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use chain::{Hash, Transaction, sha256d};
use chain::encode::{write_compact_size, read_length};
use error::{corrupted, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
	pub version: u32,
	pub previous_block_hash: Hash,
	pub merkle: Hash,
	pub timestamp: u32,
	pub bits: u32,
	pub nonce: u32,
}

impl Header {
	pub const SIZE: usize = 80;

	pub fn hash(&self) -> Hash {
		sha256d(&self.to_data())
	}

	pub fn to_data(&self) -> [u8; 80] {
		let mut out = Vec::with_capacity(Self::SIZE);
		let _ = out.write_u32::<LittleEndian>(self.version);
		out.extend_from_slice(&self.previous_block_hash.0);
		out.extend_from_slice(&self.merkle.0);
		let _ = out.write_u32::<LittleEndian>(self.timestamp);
		let _ = out.write_u32::<LittleEndian>(self.bits);
		let _ = out.write_u32::<LittleEndian>(self.nonce);

		let mut data = [0u8; 80];
		data.copy_from_slice(&out);
		data
	}

	pub fn from_data(data: &[u8]) -> Result<Self> {
		if data.len() != Self::SIZE {
			return Err(corrupted(format!("header of {} bytes", data.len())));
		}
		Self::read_from(&mut Cursor::new(data))
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
		let version = reader.read_u32::<LittleEndian>()?;
		let mut previous_block_hash = [0u8; 32];
		reader.read_exact(&mut previous_block_hash)?;
		let mut merkle = [0u8; 32];
		reader.read_exact(&mut merkle)?;

		Ok(Header {
			version,
			previous_block_hash: Hash(previous_block_hash),
			merkle: Hash(merkle),
			timestamp: reader.read_u32::<LittleEndian>()?,
			bits: reader.read_u32::<LittleEndian>()?,
			nonce: reader.read_u32::<LittleEndian>()?,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	pub header: Header,
	pub transactions: Vec<Transaction>,
}

impl Block {
	pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
		Block { header, transactions }
	}

	pub fn hash(&self) -> Hash {
		self.header.hash()
	}

	/// Merkle root over the transaction hashes.
	pub fn generate_merkle_root(&self) -> Hash {
		let mut level: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
		if level.is_empty() {
			return Hash::default();
		}

		while level.len() > 1 {
			if level.len() % 2 != 0 {
				let last = level[level.len() - 1];
				level.push(last);
			}

			level = level.chunks(2)
				.map(|pair| {
					let mut concat = [0u8; 64];
					concat[..32].copy_from_slice(&pair[0].0);
					concat[32..].copy_from_slice(&pair[1].0);
					sha256d(&concat)
				})
				.collect();
		}

		level[0]
	}

	pub fn to_data(&self) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend_from_slice(&self.header.to_data());
		write_compact_size(&mut out, self.transactions.len() as u64);
		for tx in &self.transactions {
			out.extend_from_slice(&tx.to_data());
		}
		out
	}

	pub fn from_data(data: &[u8]) -> Result<Self> {
		let mut cursor = Cursor::new(data);
		let header = Header::read_from(&mut cursor)?;
		let transactions = (0..read_length(&mut cursor)?)
			.map(|_| Transaction::read_from(&mut cursor))
			.collect::<Result<Vec<_>>>()?;
		if cursor.position() as usize != data.len() {
			return Err(corrupted("trailing bytes after block"));
		}
		Ok(Block { header, transactions })
	}
}
