//! Names of the database files and the process lock.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use error::{ErrorKind, Result};
use memory::MemoryMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Store {
	directory: PathBuf,
}

impl Store {
	pub const BLOCK_TABLE: &'static str = "block_table";
	pub const BLOCK_INDEX: &'static str = "block_index";
	pub const TRANSACTION_TABLE: &'static str = "transaction_table";
	pub const SPEND_TABLE: &'static str = "spend_table";
	pub const UNSPENT_TABLE: &'static str = "unspent_table";
	pub const HISTORY_TABLE: &'static str = "history_table";
	pub const HISTORY_ROWS: &'static str = "history_rows";
	pub const STEALTH_ROWS: &'static str = "stealth_rows";
	pub const PROCESS_LOCK: &'static str = "process_lock";

	const DATA_FILES: [&'static str; 8] = [
		Self::BLOCK_TABLE,
		Self::BLOCK_INDEX,
		Self::TRANSACTION_TABLE,
		Self::SPEND_TABLE,
		Self::UNSPENT_TABLE,
		Self::HISTORY_TABLE,
		Self::HISTORY_ROWS,
		Self::STEALTH_ROWS,
	];

	pub fn new<P: AsRef<Path>>(directory: P) -> Self {
		Store {
			directory: directory.as_ref().to_path_buf(),
		}
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	pub fn path(&self, name: &str) -> PathBuf {
		self.directory.join(name)
	}

	/// Creates the directory and empties every data file.
	pub fn touch_all(&self) -> Result<()> {
		fs::create_dir_all(&self.directory)?;
		for name in &Self::DATA_FILES {
			MemoryMap::touch(self.path(name))?;
		}
		Ok(())
	}

	/// Takes the exclusive lock guarding the directory against other processes.
	pub fn acquire_lock_file(&self) -> Result<File> {
		let lock_file_path = self.path(Self::PROCESS_LOCK);
		let lock_file = fs::OpenOptions::new()
			.write(true)
			.create(true)
			.open(&lock_file_path)?;
		lock_file.try_lock_exclusive().map_err(|_| {
			warn!(path = %lock_file_path.display(), "database is locked by another process");
			ErrorKind::DatabaseLocked(lock_file_path.clone())
		})?;

		Ok(lock_file)
	}
}
