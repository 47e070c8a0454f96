use std::fmt;

use byteorder::{LittleEndian, ByteOrder};
use hex_slice::AsHex;

use chain::{Hash, ShortHash, sha256d, hash160};

pub mod opcode {
	pub const OP_0: u8 = 0x00;
	pub const OP_PUSHDATA1: u8 = 0x4c;
	pub const OP_PUSHDATA2: u8 = 0x4d;
	pub const OP_PUSHDATA4: u8 = 0x4e;
	pub const OP_RETURN: u8 = 0x6a;
	pub const OP_DUP: u8 = 0x76;
	pub const OP_EQUAL: u8 = 0x87;
	pub const OP_EQUALVERIFY: u8 = 0x88;
	pub const OP_HASH160: u8 = 0xa9;
	pub const OP_CHECKSIG: u8 = 0xac;
}

use self::opcode::*;

/// A single script operation. Push operations carry their data.
#[derive(Debug, PartialEq)]
pub struct Instruction<'a> {
	pub opcode: u8,
	pub data: Option<&'a [u8]>,
}

/// Iterator over script operations, stops at the first malformed push.
pub struct Instructions<'a> {
	bytes: &'a [u8],
	position: usize,
}

impl<'a> Iterator for Instructions<'a> {
	type Item = Instruction<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let bytes = self.bytes;
		let opcode = *bytes.get(self.position)?;
		self.position += 1;

		let (prefix, len) = match opcode {
			0x01..=0x4b => (0, opcode as usize),
			OP_PUSHDATA1 => (1, *bytes.get(self.position)? as usize),
			OP_PUSHDATA2 => (2, LittleEndian::read_u16(bytes.get(self.position..self.position + 2)?) as usize),
			OP_PUSHDATA4 => (4, LittleEndian::read_u32(bytes.get(self.position..self.position + 4)?) as usize),
			_ => return Some(Instruction { opcode, data: None }),
		};

		let start = self.position + prefix;
		let data = bytes.get(start..start + len)?;
		self.position = start + len;
		Some(Instruction { opcode, data: Some(data) })
	}
}

#[derive(Clone, PartialEq, Eq, Default)]
pub struct Script(pub Vec<u8>);

impl fmt::Debug for Script {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Script({:02x})", self.0.as_hex())
	}
}

impl Script {
	pub fn new(bytes: Vec<u8>) -> Self {
		Script(bytes)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn instructions(&self) -> Instructions {
		Instructions {
			bytes: &self.0,
			position: 0,
		}
	}

	/// Pushes `data` with the shortest push operation.
	pub fn push_data(mut self, data: &[u8]) -> Self {
		let len = data.len();
		if len <= 0x4b {
			self.0.push(len as u8);
		} else if len <= 0xff {
			self.0.push(OP_PUSHDATA1);
			self.0.push(len as u8);
		} else if len <= 0xffff {
			self.0.push(OP_PUSHDATA2);
			let mut buf = [0u8; 2];
			LittleEndian::write_u16(&mut buf, len as u16);
			self.0.extend_from_slice(&buf);
		} else {
			self.0.push(OP_PUSHDATA4);
			let mut buf = [0u8; 4];
			LittleEndian::write_u32(&mut buf, len as u32);
			self.0.extend_from_slice(&buf);
		}
		self.0.extend_from_slice(data);
		self
	}

	pub fn push_opcode(mut self, opcode: u8) -> Self {
		self.0.push(opcode);
		self
	}

	pub fn to_pay_key_hash(hash: &ShortHash) -> Self {
		Script::default()
			.push_opcode(OP_DUP)
			.push_opcode(OP_HASH160)
			.push_data(&hash.0)
			.push_opcode(OP_EQUALVERIFY)
			.push_opcode(OP_CHECKSIG)
	}

	pub fn to_pay_script_hash(hash: &ShortHash) -> Self {
		Script::default()
			.push_opcode(OP_HASH160)
			.push_data(&hash.0)
			.push_opcode(OP_EQUAL)
	}

	pub fn to_null_data(data: &[u8]) -> Self {
		Script::default()
			.push_opcode(OP_RETURN)
			.push_data(data)
	}

	/// Data of a `OP_RETURN <data>` output script.
	pub fn null_data(&self) -> Option<&[u8]> {
		let mut ops = self.instructions();
		match (ops.next(), ops.next(), ops.next()) {
			(Some(Instruction { opcode: OP_RETURN, .. }), Some(Instruction { data: Some(data), .. }), None) => Some(data),
			_ => None,
		}
	}

	/// Ephemeral key of a stealth metadata output.
	pub fn extract_ephemeral_key(&self) -> Option<Hash> {
		match self.null_data() {
			Some(data) if data.len() >= Hash::SIZE => Hash::from_slice(data),
			_ => None,
		}
	}

	/// Prefix of a stealth metadata output, matched against stealth filters.
	pub fn to_stealth_prefix(&self) -> Option<u32> {
		self.extract_ephemeral_key()?;
		let hash = sha256d(&self.0);
		Some(LittleEndian::read_u32(&hash.0[..4]))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
	KeyHash,
	ScriptHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentAddress {
	pub kind: AddressKind,
	pub hash: ShortHash,
}

fn is_public_key(data: &[u8]) -> bool {
	match data.len() {
		33 => data[0] == 0x02 || data[0] == 0x03,
		65 => data[0] == 0x04,
		_ => false,
	}
}

impl PaymentAddress {
	/// Extracts the address paid by an output script or spent by an input script.
	pub fn extract(script: &Script) -> Option<PaymentAddress> {
		Self::extract_output(script).or_else(|| Self::extract_input(script))
	}

	fn extract_output(script: &Script) -> Option<PaymentAddress> {
		let bytes = script.as_bytes();
		if bytes.len() == 25 && bytes[0] == OP_DUP && bytes[1] == OP_HASH160 && bytes[2] == 20
			&& bytes[23] == OP_EQUALVERIFY && bytes[24] == OP_CHECKSIG {
			return Some(PaymentAddress {
				kind: AddressKind::KeyHash,
				hash: ShortHash::from_slice(&bytes[3..23])?,
			});
		}

		if bytes.len() == 23 && bytes[0] == OP_HASH160 && bytes[1] == 20 && bytes[22] == OP_EQUAL {
			return Some(PaymentAddress {
				kind: AddressKind::ScriptHash,
				hash: ShortHash::from_slice(&bytes[2..22])?,
			});
		}

		let mut ops = script.instructions();
		match (ops.next(), ops.next(), ops.next()) {
			(Some(Instruction { data: Some(key), .. }), Some(Instruction { opcode: OP_CHECKSIG, .. }), None) if is_public_key(key) => {
				Some(PaymentAddress {
					kind: AddressKind::KeyHash,
					hash: hash160(key),
				})
			},
			_ => None,
		}
	}

	fn extract_input(script: &Script) -> Option<PaymentAddress> {
		let ops: Vec<_> = script.instructions().collect();
		match ops.as_slice() {
			[Instruction { data: Some(_), .. }, Instruction { data: Some(key), .. }] if is_public_key(key) => {
				Some(PaymentAddress {
					kind: AddressKind::KeyHash,
					hash: hash160(key),
				})
			},
			[Instruction { opcode: OP_0, .. }, .., Instruction { data: Some(redeem), .. }] if !redeem.is_empty() => {
				Some(PaymentAddress {
					kind: AddressKind::ScriptHash,
					hash: hash160(redeem),
				})
			},
			_ => None,
		}
	}
}
