//! Per-entity databases, each backed by its own memory-mapped files.

use std::sync::Arc;

use error::Result;
use memory::MemoryMap;

mod block;
mod history;
mod spend;
mod stealth;
mod transaction;
mod unconfirmed;
mod unspent;

pub use self::block::BlockDatabase;
pub use self::history::{HistoryDatabase, HistoryRow, PointKind};
pub use self::spend::SpendDatabase;
pub use self::stealth::{StealthDatabase, StealthRow, StealthFilter};
pub use self::transaction::TransactionDatabase;
pub use self::unconfirmed::UnconfirmedPool;
pub use self::unspent::UnspentDatabase;

/// Lifecycle shared by the file-backed databases.
pub trait Storage {
	fn maps(&self) -> Vec<&Arc<MemoryMap>>;

	/// Initializes empty structures in freshly touched files.
	fn create_structures(&self) -> Result<()>;

	/// Loads the structures persisted by the last `sync`.
	fn start_structures(&self) -> Result<()>;

	/// Persists logical sizes into the files.
	fn sync(&self) -> Result<()>;

	fn create(&self) -> Result<()> {
		self.open_maps()?;
		self.create_structures()?;
		self.sync()
	}

	fn start(&self) -> Result<()> {
		self.open_maps()?;
		self.start_structures()
	}

	fn open_maps(&self) -> Result<()> {
		for map in self.maps() {
			map.open()?;
		}
		Ok(())
	}

	fn close(&self) -> Result<()> {
		for map in self.maps() {
			map.close()?;
		}
		Ok(())
	}
}

pub(crate) fn new_map<P: AsRef<::std::path::Path>>(path: P, expansion: usize) -> Arc<MemoryMap> {
	Arc::new(MemoryMap::new(path, expansion))
}
