use std::ops::Deref;
use std::path::PathBuf;

use chain::Hash;
use error::{ErrorKind, Result};
use memory::MemoryMap;

/// Block identified by height and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
	pub height: u32,
	pub hash: Hash,
}

impl Checkpoint {
	pub fn new(height: u32, hash: Hash) -> Self {
		Checkpoint { height, hash }
	}
}

/// Mainnet blocks whose coinbase duplicates an earlier coinbase.
pub fn mainnet_bip30_exceptions() -> Vec<Checkpoint> {
	let parse = |hex: &str| hex.parse::<Hash>().unwrap_or_default();
	vec![
		Checkpoint::new(91842, parse("00000000000a4d0a398161ffc163c503763b1f4360639393e0e4c8e300e0caec")),
		Checkpoint::new(91880, parse("00000000000743f190a18c5577a3c2d2a1f610ae9601ac046a38084ccb7cd721")),
	]
}

#[derive(Debug, PartialEq)]
pub struct Options {
	/// Directory holding the database files.
	pub directory: PathBuf,
	/// Unspent outputs and history rows are indexed from this height.
	pub history_start_height: u32,
	/// Stealth rows are indexed from this height.
	pub stealth_start_height: u32,
	/// Files grow to this percentage of the requested size.
	pub file_growth_rate: usize,
	pub block_table_buckets: usize,
	pub transaction_table_buckets: usize,
	pub spend_table_buckets: usize,
	pub unspent_table_buckets: usize,
	pub history_table_buckets: usize,
	/// Number of transactions kept in the unconfirmed pool.
	pub unconfirmed_capacity: usize,
	/// Flush every file after each write.
	pub flush_writes: bool,
	pub bip30_exceptions: Vec<Checkpoint>,
}

impl Default for Options {
	fn default() -> Self {
		Options {
			directory: PathBuf::from("blockchain"),
			history_start_height: 0,
			stealth_start_height: 0,
			file_growth_rate: MemoryMap::DEFAULT_EXPANSION,
			block_table_buckets: 650_000,
			transaction_table_buckets: 10_000_000,
			spend_table_buckets: 10_000_000,
			unspent_table_buckets: 10_000_000,
			history_table_buckets: 10_000_000,
			unconfirmed_capacity: 10_000,
			flush_writes: false,
			bip30_exceptions: mainnet_bip30_exceptions(),
		}
	}
}

impl Options {
	pub fn with<F>(f: F) -> Self where
		F: FnOnce(&mut Self),
	{
		let mut options = Options::default();
		f(&mut options);
		options
	}
}

#[derive(Debug, PartialEq)]
pub(crate) struct InternalOptions {
	pub external: Options,
}

impl Deref for InternalOptions {
	type Target = Options;

	fn deref(&self) -> &Self::Target {
		&self.external
	}
}

impl InternalOptions {
	pub fn from_external(external: Options) -> Result<Self> {
		if external.file_growth_rate < 100 {
			return Err(ErrorKind::InvalidOptions("file_growth_rate", "must be at least 100 percent".into()).into());
		}

		let buckets = [
			("block_table_buckets", external.block_table_buckets),
			("transaction_table_buckets", external.transaction_table_buckets),
			("spend_table_buckets", external.spend_table_buckets),
			("unspent_table_buckets", external.unspent_table_buckets),
			("history_table_buckets", external.history_table_buckets),
		];

		for &(field, count) in &buckets {
			if count == 0 || count > u32::max_value() as usize {
				return Err(ErrorKind::InvalidOptions(field, format!("{} is not a valid bucket count", count)).into());
			}
		}

		Ok(InternalOptions {
			external,
		})
	}

	/// Whether the block at `height` with `hash` may repeat an existing coinbase.
	pub fn is_bip30_exception(&self, height: u32, hash: &Hash) -> bool {
		self.bip30_exceptions.iter().any(|checkpoint| checkpoint.height == height && checkpoint.hash == *hash)
	}
}

#[cfg(test)]
mod tests {
	use error::ErrorKind;
	use super::{Options, InternalOptions, mainnet_bip30_exceptions};

	#[test]
	fn test_default_options_are_valid() {
		let options = InternalOptions::from_external(Options::default()).unwrap();
		let exceptions = mainnet_bip30_exceptions();
		assert!(options.is_bip30_exception(91842, &exceptions[0].hash));
		assert!(!options.is_bip30_exception(91843, &exceptions[0].hash));
		assert!(!exceptions[1].hash.is_zero());
	}

	#[test]
	fn test_invalid_options() {
		let err = InternalOptions::from_external(Options::with(|o| o.file_growth_rate = 99)).unwrap_err();
		assert!(matches!(*err.kind(), ErrorKind::InvalidOptions("file_growth_rate", _)));

		let err = InternalOptions::from_external(Options::with(|o| o.spend_table_buckets = 0)).unwrap_err();
		assert!(matches!(*err.kind(), ErrorKind::InvalidOptions("spend_table_buckets", _)));
	}
}
