use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use fs2::FileExt;
use memmap::{MmapMut, MmapOptions};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard, RwLockUpgradableReadGuard};

use error::{ErrorKind, Result};

/// An open file together with its writable mapping.
struct Mapping {
	file: File,
	map: MmapMut,
}

impl Mapping {
	fn map(file: File) -> Result<Self> {
		let map = unsafe { MmapOptions::new().map_mut(&file)? };
		Ok(Mapping { file, map })
	}
}

/// Growable memory-mapped file.
///
/// The mapping lives behind a reader-writer lock. Growing the file takes the lock
/// upgradably and upgrades only to remap, so accessors never observe a stale mapping.
/// Accessors must not be held across calls that may grow the file.
pub struct MemoryMap {
	path: PathBuf,
	/// Growth in percent of the requested size.
	expansion: usize,
	logical_size: AtomicUsize,
	mapping: RwLock<Option<Mapping>>,
}

impl MemoryMap {
	/// Files are never mapped empty.
	const MINIMUM_SIZE: u64 = 1;

	pub const DEFAULT_EXPANSION: usize = 150;

	pub fn new<P: AsRef<Path>>(path: P, expansion: usize) -> Self {
		MemoryMap {
			path: path.as_ref().to_path_buf(),
			expansion: if expansion < 100 { 100 } else { expansion },
			logical_size: AtomicUsize::new(0),
			mapping: RwLock::new(None),
		}
	}

	/// Creates an empty backing file, truncating an existing one.
	pub fn touch<P: AsRef<Path>>(path: P) -> Result<()> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path.as_ref())?;
		file.set_len(Self::MINIMUM_SIZE)?;
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Maps the file. Opening an open map is a no-op.
	pub fn open(&self) -> Result<()> {
		let mut mapping = self.mapping.write();
		if mapping.is_some() {
			return Ok(());
		}

		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.open(&self.path)?;
		let len = file.metadata()?.len();
		if len < Self::MINIMUM_SIZE {
			file.set_len(Self::MINIMUM_SIZE)?;
		}

		let new_mapping = Mapping::map(file)?;
		self.logical_size.store(new_mapping.map.len(), Ordering::SeqCst);
		debug!(path = %self.path.display(), size = new_mapping.map.len(), "mapped file");
		*mapping = Some(new_mapping);
		Ok(())
	}

	/// Flushes and unmaps the file, truncating it to its logical size.
	/// Closing a closed map is a no-op.
	pub fn close(&self) -> Result<()> {
		let mut mapping = self.mapping.write();
		let old = match mapping.take() {
			Some(old) => old,
			None => return Ok(()),
		};

		old.map.flush()?;
		let Mapping { file, map } = old;
		drop(map);

		let logical = self.logical_size.load(Ordering::SeqCst) as u64;
		file.set_len(if logical < Self::MINIMUM_SIZE { Self::MINIMUM_SIZE } else { logical })?;
		debug!(path = %self.path.display(), size = logical, "unmapped file");
		Ok(())
	}

	pub fn is_open(&self) -> bool {
		self.mapping.read().is_some()
	}

	pub fn flush(&self) -> Result<()> {
		match *self.mapping.read() {
			Some(ref mapping) => Ok(mapping.map.flush()?),
			None => Err(ErrorKind::Closed(self.path.clone()).into()),
		}
	}

	/// Number of bytes in use.
	pub fn size(&self) -> usize {
		self.logical_size.load(Ordering::SeqCst)
	}

	/// Number of bytes mapped.
	pub fn file_size(&self) -> usize {
		self.mapping.read().as_ref().map(|m| m.map.len()).unwrap_or(0)
	}

	/// Ensures `size` bytes are usable, growing the file by the expansion ratio if needed.
	pub fn reserve(&self, size: usize) -> Result<()> {
		let target = size.saturating_mul(self.expansion) / 100;
		self.grow(size, if target < size { size } else { target })
	}

	/// Sets the logical size to exactly `size`, growing or truncating the file.
	pub fn resize(&self, size: usize) -> Result<()> {
		self.grow(size, size)?;
		self.shrink(size)
	}

	fn shrink(&self, size: usize) -> Result<()> {
		let mapping = self.mapping.upgradable_read();
		let current = match *mapping {
			Some(ref m) => m.map.len(),
			None => return Err(ErrorKind::Closed(self.path.clone()).into()),
		};

		let target = if (size as u64) < Self::MINIMUM_SIZE { Self::MINIMUM_SIZE as usize } else { size };
		if target < current {
			let mut mapping = RwLockUpgradableReadGuard::upgrade(mapping);
			let old = mapping.take().ok_or_else(|| ErrorKind::Closed(self.path.clone()))?;
			old.map.flush()?;
			let Mapping { file, map } = old;
			drop(map);

			file.set_len(target as u64)?;
			*mapping = Some(Mapping::map(file)?);
			debug!(path = %self.path.display(), from = current, to = target, "truncated file");
		}

		self.logical_size.store(size, Ordering::SeqCst);
		Ok(())
	}

	fn grow(&self, required: usize, target: usize) -> Result<()> {
		let mapping = self.mapping.upgradable_read();
		let current = match *mapping {
			Some(ref m) => m.map.len(),
			None => return Err(ErrorKind::Closed(self.path.clone()).into()),
		};

		if required > current {
			let mut mapping = RwLockUpgradableReadGuard::upgrade(mapping);
			let old = mapping.take().ok_or_else(|| ErrorKind::Closed(self.path.clone()))?;
			old.map.flush()?;
			let Mapping { file, map } = old;
			drop(map);

			if file.allocate(target as u64).is_err() {
				// keep the old mapping usable
				*mapping = Some(Mapping::map(file)?);
				return Err(ErrorKind::OutOfSpace(self.path.clone(), target).into());
			}
			file.set_len(target as u64)?;

			*mapping = Some(Mapping::map(file)?);
			debug!(path = %self.path.display(), from = current, to = target, "remapped file");
		}

		self.logical_size.fetch_max(required, Ordering::SeqCst);
		Ok(())
	}

	/// Shared, bounds-checked view of the mapping.
	pub fn access(&self) -> Result<Accessor> {
		let guard = self.mapping.read();
		if guard.is_none() {
			return Err(ErrorKind::Closed(self.path.clone()).into());
		}
		Ok(Accessor { guard })
	}

	/// Exclusive, bounds-checked view of the mapping.
	pub fn access_mut(&self) -> Result<AccessorMut> {
		let guard = self.mapping.write();
		if guard.is_none() {
			return Err(ErrorKind::Closed(self.path.clone()).into());
		}
		Ok(AccessorMut { guard })
	}
}

impl Drop for MemoryMap {
	fn drop(&mut self) {
		if let Err(err) = self.close() {
			warn!(path = %self.path.display(), error = %err, "failed to close memory map");
		}
	}
}

fn check_bounds(offset: usize, len: usize, size: usize) -> Result<()> {
	match offset.checked_add(len) {
		Some(end) if end <= size => Ok(()),
		_ => Err(ErrorKind::OutOfBounds(offset, len, size).into()),
	}
}

pub struct Accessor<'a> {
	guard: RwLockReadGuard<'a, Option<Mapping>>,
}

impl<'a> Accessor<'a> {
	fn bytes(&self) -> &[u8] {
		self.guard.as_ref().map(|m| &m.map[..]).unwrap_or(&[])
	}

	pub fn len(&self) -> usize {
		self.bytes().len()
	}

	pub fn get(&self, offset: usize, len: usize) -> Result<&[u8]> {
		let bytes = self.bytes();
		check_bounds(offset, len, bytes.len())?;
		Ok(&bytes[offset..offset + len])
	}

	/// Everything from `offset` up to `end`.
	pub fn range(&self, offset: usize, end: usize) -> Result<&[u8]> {
		self.get(offset, end.saturating_sub(offset))
	}
}

impl<'a> fmt::Debug for Accessor<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Accessor").field("len", &self.len()).finish()
	}
}

pub struct AccessorMut<'a> {
	guard: RwLockWriteGuard<'a, Option<Mapping>>,
}

impl<'a> AccessorMut<'a> {
	pub fn get(&self, offset: usize, len: usize) -> Result<&[u8]> {
		let bytes = self.guard.as_ref().map(|m| &m.map[..]).unwrap_or(&[]);
		check_bounds(offset, len, bytes.len())?;
		Ok(&bytes[offset..offset + len])
	}

	pub fn get_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
		let bytes = match self.guard.as_mut() {
			Some(m) => &mut m.map[..],
			None => return Err(ErrorKind::OutOfBounds(offset, len, 0).into()),
		};
		check_bounds(offset, len, bytes.len())?;
		Ok(&mut bytes[offset..offset + len])
	}

	pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
		self.get_mut(offset, data.len())?.copy_from_slice(data);
		Ok(())
	}
}

impl<'a> fmt::Debug for AccessorMut<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let len = self.guard.as_ref().map(|m| m.map.len()).unwrap_or(0);
		f.debug_struct("AccessorMut").field("len", &len).finish()
	}
}
