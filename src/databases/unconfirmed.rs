use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use chain::{Hash, Transaction};

struct Entry {
	transaction: Transaction,
	fee: u64,
	rate: u64,
}

#[derive(Default)]
struct Pool {
	entries: HashMap<Hash, Entry>,
	/// Fee rate and hash, lowest rate first.
	by_rate: BTreeSet<(u64, Hash)>,
}

/// In-memory pool of unconfirmed transactions, bounded by capacity.
///
/// When full, the transaction paying the lowest fee per byte is evicted.
pub struct UnconfirmedPool {
	capacity: usize,
	pool: RwLock<Pool>,
}

impl UnconfirmedPool {
	pub fn new(capacity: usize) -> Self {
		UnconfirmedPool {
			capacity,
			pool: RwLock::new(Pool::default()),
		}
	}

	/// Fee per serialized byte in thousandths of a unit.
	fn rate(fee: u64, size: usize) -> u64 {
		fee.saturating_mul(1000) / size.max(1) as u64
	}

	/// Stores the transaction. Returns false if it is already stored or was evicted at once.
	pub fn store(&self, transaction: Transaction, fee: u64) -> bool {
		let hash = transaction.hash();
		let rate = Self::rate(fee, transaction.serialized_size());
		let mut pool = self.pool.write();
		if pool.entries.contains_key(&hash) {
			return false;
		}

		pool.by_rate.insert((rate, hash));
		pool.entries.insert(hash, Entry { transaction, fee, rate });

		while pool.entries.len() > self.capacity {
			let lowest = match pool.by_rate.iter().next() {
				Some(lowest) => *lowest,
				None => break,
			};
			pool.by_rate.remove(&lowest);
			pool.entries.remove(&lowest.1);
			debug!(hash = %lowest.1, rate = lowest.0, "evicted unconfirmed transaction");
		}

		pool.entries.contains_key(&hash)
	}

	pub fn get(&self, hash: &Hash) -> Option<Transaction> {
		self.pool.read().entries.get(hash).map(|entry| entry.transaction.clone())
	}

	pub fn fee(&self, hash: &Hash) -> Option<u64> {
		self.pool.read().entries.get(hash).map(|entry| entry.fee)
	}

	pub fn contains(&self, hash: &Hash) -> bool {
		self.pool.read().entries.contains_key(hash)
	}

	pub fn unlink(&self, hash: &Hash) -> bool {
		let mut pool = self.pool.write();
		match pool.entries.remove(hash) {
			Some(entry) => {
				pool.by_rate.remove(&(entry.rate, *hash));
				true
			},
			None => false,
		}
	}

	/// Visits transactions from the highest fee rate down.
	pub fn for_each<F>(&self, mut f: F) where
		F: FnMut(&Transaction),
	{
		let pool = self.pool.read();
		for &(_, ref hash) in pool.by_rate.iter().rev() {
			if let Some(entry) = pool.entries.get(hash) {
				f(&entry.transaction);
			}
		}
	}

	pub fn len(&self) -> usize {
		self.pool.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		*self.pool.write() = Pool::default();
	}
}

#[cfg(test)]
mod tests {
	use chain::{Hash, Input, Output, OutputPoint, Script, Transaction};
	use super::UnconfirmedPool;

	fn transaction(seed: u8) -> Transaction {
		Transaction::new(
			1,
			vec![Input::new(OutputPoint::new(Hash([seed; 32]), 0), Script::default())],
			vec![Output::new(1, Script::default())],
			0,
		)
	}

	#[test]
	fn test_store_get_unlink() {
		let pool = UnconfirmedPool::new(10);
		let tx = transaction(1);
		assert!(pool.store(tx.clone(), 100));
		assert!(!pool.store(tx.clone(), 100));
		assert_eq!(pool.get(&tx.hash()), Some(tx.clone()));
		assert_eq!(pool.fee(&tx.hash()), Some(100));
		assert!(pool.unlink(&tx.hash()));
		assert!(!pool.unlink(&tx.hash()));
		assert!(pool.is_empty());
	}

	#[test]
	fn test_lowest_rate_is_evicted() {
		let pool = UnconfirmedPool::new(2);
		assert!(pool.store(transaction(1), 300));
		assert!(pool.store(transaction(2), 100));
		assert!(pool.store(transaction(3), 200));
		assert_eq!(pool.len(), 2);
		assert!(!pool.contains(&transaction(2).hash()));

		// cheaper than everything stored
		assert!(!pool.store(transaction(4), 1));

		let mut order = Vec::new();
		pool.for_each(|tx| order.push(tx.hash()));
		assert_eq!(order, vec![transaction(1).hash(), transaction(3).hash()]);
	}
}
