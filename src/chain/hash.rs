use std::fmt;
use std::str::FromStr;

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

macro_rules! impl_hash {
	($name: ident, $size: expr) => {
		#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(pub [u8; $size]);

		impl $name {
			pub const SIZE: usize = $size;

			/// Copies the hash out of the first `SIZE` bytes of `data`.
			/// Returns `None` if `data` is too short.
			pub fn from_slice(data: &[u8]) -> Option<Self> {
				if data.len() < $size {
					return None;
				}

				let mut hash = [0u8; $size];
				hash.copy_from_slice(&data[..$size]);
				Some($name(hash))
			}

			#[inline]
			pub fn is_zero(&self) -> bool {
				self.0.iter().all(|b| *b == 0)
			}
		}

		impl Default for $name {
			fn default() -> Self {
				$name([0u8; $size])
			}
		}

		impl AsRef<[u8]> for $name {
			fn as_ref(&self) -> &[u8] {
				&self.0
			}
		}

		impl From<[u8; $size]> for $name {
			fn from(bytes: [u8; $size]) -> Self {
				$name(bytes)
			}
		}

		/// Hashes are displayed byte-reversed, the way block explorers show them.
		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
				for byte in self.0.iter().rev() {
					write!(f, "{:02x}", byte)?;
				}
				Ok(())
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
				fmt::Display::fmt(self, f)
			}
		}

		impl FromStr for $name {
			type Err = HexError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let bytes = s.as_bytes();
				if bytes.len() != $size * 2 {
					return Err(HexError::InvalidLength(bytes.len()));
				}

				let mut hash = [0u8; $size];
				for (i, pair) in bytes.chunks(2).enumerate() {
					let byte = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
					hash[$size - 1 - i] = byte;
				}

				Ok($name(hash))
			}
		}
	}
}

impl_hash!(Hash, 32);
impl_hash!(ShortHash, 20);

#[derive(Debug, PartialEq)]
pub enum HexError {
	InvalidLength(usize),
	InvalidCharacter(char),
}

fn hex_value(c: u8) -> Result<u8, HexError> {
	match c {
		b'0'..=b'9' => Ok(c - b'0'),
		b'a'..=b'f' => Ok(c - b'a' + 10),
		b'A'..=b'F' => Ok(c - b'A' + 10),
		_ => Err(HexError::InvalidCharacter(c as char)),
	}
}

/// Double SHA-256, the Bitcoin block and transaction hash.
pub fn sha256d(data: &[u8]) -> Hash {
	let first = Sha256::digest(data);
	let second = Sha256::digest(&first);
	let mut out = [0u8; 32];
	out.copy_from_slice(&second);
	Hash(out)
}

/// RIPEMD160(SHA256(data)), the payment address hash.
pub fn hash160(data: &[u8]) -> ShortHash {
	let sha = Sha256::digest(data);
	let ripemd = Ripemd160::digest(&sha);
	let mut out = [0u8; 20];
	out.copy_from_slice(&ripemd);
	ShortHash(out)
}

#[cfg(test)]
mod tests {
	use super::{sha256d, hash160, Hash, HexError};

	#[test]
	fn test_hash_display_is_reversed() {
		let mut bytes = [0u8; 32];
		bytes[0] = 0xab;
		let hash = Hash(bytes);
		let text = hash.to_string();
		assert!(text.ends_with("ab"));
		assert_eq!(text.parse::<Hash>().unwrap(), hash);
	}

	#[test]
	fn test_hash_parse_errors() {
		assert_eq!("00".parse::<Hash>().unwrap_err(), HexError::InvalidLength(2));
		let bad = format!("{}zz", "0".repeat(62));
		assert_eq!(bad.parse::<Hash>().unwrap_err(), HexError::InvalidCharacter('z'));
	}

	#[test]
	fn test_sha256d_of_empty_input() {
		let expected: Hash = "56944c5d3f98413ef45cf54545538103cc9f298e0575820ad3591376e2e0f65d".parse().unwrap();
		assert_eq!(sha256d(b""), expected);
	}

	#[test]
	fn test_hash160_length() {
		let hash = hash160(b"public key");
		assert!(!hash.is_zero());
	}
}
