//! Bitcoin wire encoding helpers.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use error::{corrupted, Result};

/// Upper bound for a single length prefix. Anything larger means the bytes
/// are not a serialized value.
const MAX_LENGTH: u64 = 0x0200_0000;

pub fn compact_size_len(value: u64) -> usize {
	match value {
		0..=0xfc => 1,
		0xfd..=0xffff => 3,
		0x1_0000..=0xffff_ffff => 5,
		_ => 9,
	}
}

pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
	// writes into a Vec never fail
	match value {
		0..=0xfc => out.push(value as u8),
		0xfd..=0xffff => {
			out.push(0xfd);
			let _ = out.write_u16::<LittleEndian>(value as u16);
		},
		0x1_0000..=0xffff_ffff => {
			out.push(0xfe);
			let _ = out.write_u32::<LittleEndian>(value as u32);
		},
		_ => {
			out.push(0xff);
			let _ = out.write_u64::<LittleEndian>(value);
		},
	}
}

pub fn read_compact_size<R: Read>(reader: &mut R) -> Result<u64> {
	let value = match reader.read_u8()? {
		0xfd => reader.read_u16::<LittleEndian>()? as u64,
		0xfe => reader.read_u32::<LittleEndian>()? as u64,
		0xff => reader.read_u64::<LittleEndian>()?,
		byte => byte as u64,
	};
	Ok(value)
}

/// Reads a compact size used as an element count or byte length.
pub fn read_length<R: Read>(reader: &mut R) -> Result<usize> {
	let len = read_compact_size(reader)?;
	if len > MAX_LENGTH {
		return Err(corrupted(format!("length prefix {} is too large", len)));
	}
	Ok(len as usize)
}

pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
	write_compact_size(out, bytes.len() as u64);
	out.extend_from_slice(bytes);
}

pub fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
	let len = read_length(reader)?;
	let mut bytes = vec![0u8; len];
	reader.read_exact(&mut bytes)?;
	Ok(bytes)
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use super::{compact_size_len, write_compact_size, read_compact_size, read_length};

	#[test]
	fn test_compact_size_boundaries() {
		for value in &[0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
			let mut out = Vec::new();
			write_compact_size(&mut out, *value);
			assert_eq!(out.len(), compact_size_len(*value));
			assert_eq!(read_compact_size(&mut Cursor::new(&out)).unwrap(), *value);
		}
	}

	#[test]
	fn test_read_length_rejects_huge_prefix() {
		let data = [0xffu8, 0, 0, 0, 0, 1, 0, 0, 0];
		assert!(read_length(&mut Cursor::new(&data[..])).is_err());
	}

	#[test]
	fn test_read_compact_size_truncated() {
		let data = [0xfdu8, 0x01];
		assert!(read_compact_size(&mut Cursor::new(&data[..])).is_err());
	}
}
