use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use chain::{Block, Hash, InputPoint, Input, Output, OutputPoint, PaymentAddress, Transaction};
use databases::{
	BlockDatabase, HistoryDatabase, SpendDatabase, StealthDatabase, StealthRow,
	Storage, TransactionDatabase, UnconfirmedPool, UnspentDatabase,
};
use error::{corrupted, ErrorKind, Result, ResultExt};
use memory::MemoryMap;
use options::{InternalOptions, Options};
use sequential_lock::{ReadHandle, SequentialLock};
use store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Closed,
	Started,
	Stopped,
}

/// Top-level store owning every per-entity database.
///
/// Writers are serialized internally. Readers validate what they read against
/// the sequential lock and retry reads overlapping a write, see `read`.
pub struct DataBase {
	options: InternalOptions,
	store: Store,
	blocks: BlockDatabase,
	transactions: TransactionDatabase,
	spends: SpendDatabase,
	unspents: UnspentDatabase,
	history: HistoryDatabase,
	stealth: StealthDatabase,
	unconfirmed: UnconfirmedPool,
	sequential_lock: SequentialLock,
	write_mutex: Mutex<()>,
	state: Mutex<State>,
	lock_file: Mutex<Option<File>>,
}

impl DataBase {
	pub fn new(options: Options) -> Result<Self> {
		let options = InternalOptions::from_external(options)?;
		let store = Store::new(&options.directory);
		let growth = options.file_growth_rate;

		Ok(DataBase {
			blocks: BlockDatabase::new(store.path(Store::BLOCK_TABLE), store.path(Store::BLOCK_INDEX), options.block_table_buckets, growth),
			transactions: TransactionDatabase::new(store.path(Store::TRANSACTION_TABLE), options.transaction_table_buckets, growth),
			spends: SpendDatabase::new(store.path(Store::SPEND_TABLE), options.spend_table_buckets, growth),
			unspents: UnspentDatabase::new(store.path(Store::UNSPENT_TABLE), options.unspent_table_buckets, growth),
			history: HistoryDatabase::new(store.path(Store::HISTORY_TABLE), store.path(Store::HISTORY_ROWS), options.history_table_buckets, growth),
			stealth: StealthDatabase::new(store.path(Store::STEALTH_ROWS), growth),
			unconfirmed: UnconfirmedPool::new(options.unconfirmed_capacity),
			sequential_lock: SequentialLock::new(),
			write_mutex: Mutex::new(()),
			state: Mutex::new(State::Closed),
			lock_file: Mutex::new(None),
			store,
			options,
		})
	}

	pub fn directory(&self) -> &Path {
		self.store.directory()
	}

	fn storages(&self) -> [&dyn Storage; 6] {
		[&self.blocks, &self.transactions, &self.spends, &self.unspents, &self.history, &self.stealth]
	}

	fn maps(&self) -> Vec<&Arc<MemoryMap>> {
		self.storages().iter().flat_map(|&storage| storage.maps()).collect()
	}

	fn check_started(&self) -> Result<()> {
		match *self.state.lock() {
			State::Started => Ok(()),
			_ => Err(ErrorKind::NotStarted.into()),
		}
	}

	fn check_closed(&self) -> Result<()> {
		match *self.state.lock() {
			State::Closed => Ok(()),
			_ => Err(ErrorKind::AlreadyOpen(self.store.directory().to_path_buf()).into()),
		}
	}

	/// Runs `f`. If it fails before the database is started, unmaps whatever
	/// was opened and releases the process lock.
	fn with_lock_released_on_error<F>(&self, f: F) -> Result<()> where
		F: FnOnce() -> Result<()>,
	{
		let result = f();
		if let Err(ref err) = result {
			let mut state = self.state.lock();
			if *state != State::Started {
				for storage in self.storages().iter() {
					if let Err(close_err) = storage.close() {
						warn!(error = %close_err, "failed to close storage");
					}
				}
				*state = State::Closed;
				*self.lock_file.lock() = None;
				warn!(directory = %self.store.directory().display(), error = %err, "failed to open database");
			}
		}
		result
	}

	fn acquire_lock(&self) -> Result<()> {
		let mut lock_file = self.lock_file.lock();
		if lock_file.is_none() {
			*lock_file = Some(self.store.acquire_lock_file()?);
		}
		Ok(())
	}

	/// Creates empty databases in the directory and starts them.
	///
	/// Fails with `AlreadyOpen` unless the database is closed.
	pub fn create(&self) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_closed()?;
		self.acquire_lock()?;
		let _epoch = self.sequential_lock.write();

		self.with_lock_released_on_error(|| {
			self.store.touch_all()?;
			for storage in self.storages().iter() {
				storage.create()?;
			}
			Ok(())
		})?;
		self.unconfirmed.clear();

		*self.state.lock() = State::Started;
		info!(directory = %self.store.directory().display(), "created database");
		Ok(())
	}

	/// Opens the existing databases. Fails if another process holds the directory.
	pub fn start(&self) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.acquire_lock()?;
		let _epoch = self.sequential_lock.write();

		self.with_lock_released_on_error(|| {
			for storage in self.storages().iter() {
				storage.start()?;
			}
			Ok(())
		})?;

		*self.state.lock() = State::Started;
		info!(directory = %self.store.directory().display(), top = ?self.blocks.top(), "started database");
		Ok(())
	}

	/// Persists and flushes everything and releases the directory.
	pub fn stop(&self) -> Result<()> {
		let _write = self.write_mutex.lock();
		if *self.state.lock() != State::Started {
			return Ok(());
		}

		{
			let _epoch = self.sequential_lock.write();
			self.synchronize()?;
			self.flush_maps()?;
		}

		*self.lock_file.lock() = None;
		*self.state.lock() = State::Stopped;
		info!(directory = %self.store.directory().display(), "stopped database");
		Ok(())
	}

	/// Stops and unmaps everything. Closing a closed database is a no-op.
	pub fn close(&self) -> Result<()> {
		self.stop()?;

		let _write = self.write_mutex.lock();
		if *self.state.lock() == State::Closed {
			return Ok(());
		}

		for storage in self.storages().iter() {
			storage.close()?;
		}

		*self.state.lock() = State::Closed;
		info!(directory = %self.store.directory().display(), "closed database");
		Ok(())
	}

	fn flush_maps(&self) -> Result<()> {
		self.maps()
			.par_iter()
			.map(|map| map.flush())
			.collect::<Result<Vec<_>>>()
			.map(|_| ())
	}

	/// Flushes every memory map to disk.
	pub fn flush(&self) -> Result<()> {
		self.check_started()?;
		self.flush_maps()
	}

	/// Persists the logical sizes of every database.
	fn synchronize(&self) -> Result<()> {
		for storage in self.storages().iter() {
			storage.sync()?;
		}
		Ok(())
	}

	fn commit(&self) -> Result<()> {
		self.synchronize()?;
		if self.options.flush_writes {
			self.flush_maps()?;
		}
		Ok(())
	}

	pub fn blocks(&self) -> &BlockDatabase {
		&self.blocks
	}

	pub fn transactions(&self) -> &TransactionDatabase {
		&self.transactions
	}

	pub fn spends(&self) -> &SpendDatabase {
		&self.spends
	}

	pub fn unspents(&self) -> &UnspentDatabase {
		&self.unspents
	}

	pub fn history(&self) -> &HistoryDatabase {
		&self.history
	}

	pub fn stealth(&self) -> &StealthDatabase {
		&self.stealth
	}

	pub fn unconfirmed(&self) -> &UnconfirmedPool {
		&self.unconfirmed
	}

	pub fn begin_read(&self) -> ReadHandle {
		self.sequential_lock.begin_read()
	}

	pub fn is_read_valid(&self, handle: ReadHandle) -> bool {
		self.sequential_lock.is_read_valid(handle)
	}

	pub fn is_write_locked(&self) -> bool {
		self.sequential_lock.is_write_locked()
	}

	/// Runs `f` until it completes without a write overlapping it.
	///
	/// `f` may observe a write in progress and must not act on what it reads
	/// before returning.
	pub fn read<F, T>(&self, f: F) -> T where
		F: Fn(&Self) -> T,
	{
		loop {
			let handle = self.begin_read();
			if handle.is_write_locked() {
				::std::thread::yield_now();
				continue;
			}

			let result = f(self);
			if self.is_read_valid(handle) {
				return result;
			}
		}
	}

	/// Height the next pushed block must have.
	fn next_height(&self) -> u32 {
		self.blocks.top().map(|top| top + 1).unwrap_or(0)
	}

	fn check_bip30(&self, block: &Block, height: u32) -> Result<()> {
		let exception = self.options.is_bip30_exception(height, &block.hash());
		for (position, tx) in block.transactions.iter().enumerate() {
			if position == 0 && exception {
				continue;
			}

			let hash = tx.hash();
			if let Some(existing) = self.transactions.get(&hash)? {
				if !existing.is_spent(u32::MAX)? {
					return Err(ErrorKind::UnspentDuplicate(hash).into());
				}
			}
		}
		Ok(())
	}

	/// Pushes `block` on top of the chain, without taking any lock.
	fn push_block(&self, block: &Block, height: u32) -> Result<()> {
		let expected = self.next_height();
		if height != expected {
			return Err(ErrorKind::InvalidHeight(expected, height).into());
		}

		if height > 0 {
			let parent = self.blocks.get(height - 1)?;
			let linked = match parent {
				Some(parent) => parent.hash()? == block.header.previous_block_hash,
				None => false,
			};
			if !linked {
				return Err(ErrorKind::MissingParent(height).into());
			}
		}

		self.check_bip30(block, height)?;
		self.store_block(block, height)?;
		debug!(height, hash = %block.hash(), transactions = block.transactions.len(), "pushed block");
		Ok(())
	}

	/// Stores the block and every index row it creates.
	fn store_block(&self, block: &Block, height: u32) -> Result<()> {
		let exception = self.options.is_bip30_exception(height, &block.hash());
		for (position, tx) in block.transactions.iter().enumerate() {
			if position == 0 && exception {
				warn!(height, hash = %tx.hash(), "skipped duplicate coinbase");
				continue;
			}
			self.push_transaction_rows(tx, height, position as u32)?;
		}

		self.blocks.store(block, height)
	}

	fn push_transaction_rows(&self, tx: &Transaction, height: u32, position: u32) -> Result<()> {
		let hash = tx.hash();
		if !tx.is_coinbase() {
			self.push_inputs(&hash, height, &tx.inputs)?;
		}
		self.push_outputs(&hash, height, &tx.outputs)?;
		self.push_stealth(&hash, height, &tx.outputs)?;
		self.transactions.store(tx, height, position)
	}

	fn push_inputs(&self, hash: &Hash, height: u32, inputs: &[Input]) -> Result<()> {
		for (index, input) in inputs.iter().enumerate() {
			let inpoint = InputPoint::new(*hash, index as u32);
			let previous = &input.previous_output;
			self.spends.store(previous, &inpoint)?;
			self.unspents.remove(previous)?;
			self.transactions.spend(previous, height)?;

			if height < self.options.history_start_height {
				continue;
			}

			if let Some(address) = PaymentAddress::extract(&input.script) {
				self.history.add_input(&address.hash, &inpoint, height, previous)?;
			}
		}
		Ok(())
	}

	fn push_outputs(&self, hash: &Hash, height: u32, outputs: &[Output]) -> Result<()> {
		if height < self.options.history_start_height {
			return Ok(());
		}

		for (index, output) in outputs.iter().enumerate() {
			let outpoint = OutputPoint::new(*hash, index as u32);
			self.unspents.store(&outpoint)?;

			if let Some(address) = PaymentAddress::extract(&output.script) {
				self.history.add_output(&address.hash, &outpoint, height, output.value)?;
			}
		}
		Ok(())
	}

	/// Stores a row for every metadata output followed by a payment output.
	fn push_stealth(&self, hash: &Hash, height: u32, outputs: &[Output]) -> Result<()> {
		if height < self.options.stealth_start_height {
			return Ok(());
		}

		for pair in outputs.windows(2) {
			let (ephemeral_script, payment_script) = (&pair[0].script, &pair[1].script);
			let prefix = match ephemeral_script.to_stealth_prefix() {
				Some(prefix) => prefix,
				None => continue,
			};
			let ephemeral_key = match ephemeral_script.extract_ephemeral_key() {
				Some(key) => key,
				None => continue,
			};
			let address = match PaymentAddress::extract(payment_script) {
				Some(address) => address,
				None => continue,
			};

			self.stealth.store(&StealthRow {
				prefix,
				height,
				ephemeral_key,
				address: address.hash,
				transaction_hash: *hash,
			})?;
		}
		Ok(())
	}

	/// Removes the top block and every index row it created, without taking any lock.
	fn pop_block(&self) -> Result<Block> {
		let height = self.blocks.top().ok_or(ErrorKind::EmptyChain)?;
		let stored = self.blocks.get(height)?
			.ok_or_else(|| corrupted(format!("top block {} is missing", height)))?;
		let header = stored.header()?;
		let hashes = stored.transaction_hashes()?;
		let exception = self.options.is_bip30_exception(height, &header.hash());

		let mut transactions = Vec::with_capacity(hashes.len());
		for (position, hash) in hashes.iter().enumerate() {
			let tx = self.transactions.get(hash)?
				.ok_or_else(|| corrupted(format!("transaction {} of block {} is missing", hash, height)))?;

			// the excepted coinbase is stored with the block it duplicates
			if !(position == 0 && exception) && (tx.height()? != height || tx.position()? != position as u32) {
				return Err(corrupted(format!("transaction {} is not stored at {}:{}", hash, height, position)));
			}
			transactions.push(tx.transaction()?);
		}

		for (position, tx) in transactions.iter().enumerate().rev() {
			if position == 0 && exception {
				warn!(height, hash = %hashes[0], "kept duplicate coinbase");
				continue;
			}
			self.pop_transaction_rows(tx, &hashes[position], height)?;
		}

		self.stealth.unlink(height)?;
		if !self.blocks.unlink(height)? {
			return Err(corrupted(format!("block {} could not be unlinked", height)));
		}

		debug!(height, hash = %header.hash(), "popped block");
		Ok(Block::new(header, transactions))
	}

	/// Undoes `push_transaction_rows` in exact reverse order.
	fn pop_transaction_rows(&self, tx: &Transaction, hash: &Hash, height: u32) -> Result<()> {
		if !self.transactions.unlink(hash)? {
			return Err(corrupted(format!("transaction {} could not be unlinked", hash)));
		}

		self.pop_outputs(hash, height, &tx.outputs)?;
		if !tx.is_coinbase() {
			self.pop_inputs(height, &tx.inputs)?;
		}
		Ok(())
	}

	fn pop_outputs(&self, hash: &Hash, height: u32, outputs: &[Output]) -> Result<()> {
		if height < self.options.history_start_height {
			return Ok(());
		}

		for (index, output) in outputs.iter().enumerate().rev() {
			self.unspents.remove(&OutputPoint::new(*hash, index as u32))?;

			if let Some(address) = PaymentAddress::extract(&output.script) {
				self.history.delete_last_row(&address.hash)?;
			}
		}
		Ok(())
	}

	fn pop_inputs(&self, height: u32, inputs: &[Input]) -> Result<()> {
		for input in inputs.iter().rev() {
			let previous = &input.previous_output;
			self.spends.unlink(previous)?;
			self.transactions.unspend(previous)?;

			// restore only outputs that were indexed when pushed
			if let Some(previous_tx) = self.transactions.get(&previous.hash)? {
				if previous_tx.height()? >= self.options.history_start_height {
					self.unspents.store(previous)?;
				}
			}

			if height < self.options.history_start_height {
				continue;
			}

			if let Some(address) = PaymentAddress::extract(&input.script) {
				self.history.delete_last_row(&address.hash)?;
			}
		}
		Ok(())
	}

	/// Pushes `block` at `height`, which must be the height above the top.
	pub fn push(&self, block: &Block, height: u32) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		{
			let _epoch = self.sequential_lock.write();
			self.push_block(block, height)?;
			self.commit()?;
		}

		for tx in &block.transactions {
			self.unconfirmed.unlink(&tx.hash());
		}
		Ok(())
	}

	/// Stores `block` above the top, leaving gaps below it if needed.
	///
	/// Heights at or below the top are rejected, rows must stay in height
	/// order for `pop` to undo them.
	pub fn insert(&self, block: &Block, height: u32) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		if self.blocks.exists(height)? {
			return Err(ErrorKind::DuplicateBlock(height).into());
		}

		let lowest = self.next_height();
		if height < lowest {
			return Err(ErrorKind::InvalidHeight(lowest, height).into());
		}

		let _epoch = self.sequential_lock.write();
		self.check_bip30(block, height)?;
		self.store_block(block, height)?;
		debug!(height, hash = %block.hash(), "inserted block");
		self.commit()
	}

	/// Removes the top block and returns it.
	pub fn pop(&self) -> Result<Block> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		let _epoch = self.sequential_lock.write();
		let block = self.pop_block()?;
		self.commit()?;
		Ok(block)
	}

	fn pop_above_unlocked(&self, fork_height: u32, outgoing: &mut Vec<Block>) -> Result<()> {
		let top = match self.blocks.top() {
			Some(top) if top >= fork_height => top,
			_ => return Err(ErrorKind::UnknownForkPoint(fork_height).into()),
		};
		if !self.blocks.exists(fork_height)? {
			return Err(ErrorKind::UnknownForkPoint(fork_height).into());
		}

		let mut popped = Vec::with_capacity((top - fork_height) as usize);
		for _ in fork_height..top {
			popped.push(self.pop_block()?);
		}

		// lowest block first
		popped.reverse();
		outgoing.extend(popped);
		Ok(())
	}

	fn push_all_unlocked(&self, blocks: &[Block], first_height: u32) -> Result<()> {
		let expected = self.next_height();
		if first_height != expected {
			return Err(ErrorKind::InvalidHeight(expected, first_height).into());
		}

		for (pushed, block) in blocks.iter().enumerate() {
			self.push_block(block, first_height + pushed as u32)
				.chain_err(|| ErrorKind::PartialPush(pushed))?;
		}
		Ok(())
	}

	/// Pops every block above `fork_height` into `outgoing`, lowest first.
	pub fn pop_above(&self, fork_height: u32, outgoing: &mut Vec<Block>) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		let _epoch = self.sequential_lock.write();
		let result = self.pop_above_unlocked(fork_height, outgoing);
		self.commit()?;
		result
	}

	/// Pushes `blocks` starting at `first_height`.
	///
	/// Stops at the first failure, reported as `PartialPush` with the number of
	/// blocks pushed before it.
	pub fn push_all(&self, blocks: &[Block], first_height: u32) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		let result = {
			let _epoch = self.sequential_lock.write();
			let result = self.push_all_unlocked(blocks, first_height);
			self.commit()?;
			result
		};

		for block in blocks {
			for tx in &block.transactions {
				self.unconfirmed.unlink(&tx.hash());
			}
		}
		result
	}

	/// Replaces the blocks above `fork_height` with `incoming` in one write.
	pub fn reorganize(&self, fork_height: u32, incoming: &[Block], outgoing: &mut Vec<Block>) -> Result<()> {
		let _write = self.write_mutex.lock();
		self.check_started()?;
		debug!(fork_height, incoming = incoming.len(), "reorganizing");

		let result = {
			let _epoch = self.sequential_lock.write();
			let result = self.pop_above_unlocked(fork_height, outgoing)
				.and_then(|_| self.push_all_unlocked(incoming, fork_height + 1));
			self.commit()?;
			result
		};

		if result.is_ok() {
			for block in incoming {
				for tx in &block.transactions {
					self.unconfirmed.unlink(&tx.hash());
				}
			}
		}
		result
	}

	/// Adds a transaction to the unconfirmed pool.
	///
	/// Its fee is computed from previous outputs in the chain or the pool.
	pub fn push_transaction(&self, tx: &Transaction) -> Result<()> {
		self.check_started()?;
		let hash = tx.hash();
		if self.unconfirmed.contains(&hash) {
			return Err(ErrorKind::UnspentDuplicate(hash).into());
		}

		let input_value = self.read(|db| db.unconfirmed_input_value(&hash, tx))?;
		let fee = input_value.saturating_sub(tx.total_output_value());
		if !self.unconfirmed.store(tx.clone(), fee) {
			debug!(hash = %hash, fee, "unconfirmed transaction was not kept");
		}
		Ok(())
	}
}

impl DataBase {
	/// Sum of the previous outputs of an unconfirmed transaction.
	fn unconfirmed_input_value(&self, hash: &Hash, tx: &Transaction) -> Result<u64> {
		if let Some(existing) = self.transactions.get(hash)? {
			if !existing.is_spent(u32::MAX)? {
				return Err(ErrorKind::UnspentDuplicate(*hash).into());
			}
		}

		let mut input_value = 0u64;
		for input in &tx.inputs {
			let previous = &input.previous_output;
			let output = match self.transactions.get(&previous.hash)? {
				Some(stored) => stored.output(previous.index)?,
				None => self.unconfirmed.get(&previous.hash)
					.and_then(|pooled| pooled.outputs.get(previous.index as usize).cloned()),
			};
			let output = output.ok_or_else(|| ErrorKind::MissingPreviousOutput(*previous))?;
			input_value = input_value.saturating_add(output.value);
		}
		Ok(input_value)
	}
}

impl Drop for DataBase {
	fn drop(&mut self) {
		if let Err(err) = self.close() {
			warn!(error = %err, "failed to close database");
		}
	}
}
