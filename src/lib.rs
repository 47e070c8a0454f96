//! Memory-mapped storage for a blockchain and its indexes.
//!
//! Assumptions:
//!
//! - a single writer pushes and pops blocks at the top of the chain
//!
//! - many readers query concurrently and retry reads overlapping a write
//!
//! - every push can be undone by a pop, in reverse order
//!
//! Each database lives in its own file inside one directory.
//!
//! ```text
//! block_table        hash -> header, height, transaction hashes
//! block_index        height -> block_table link
//! transaction_table  hash -> height, position, transaction, spender heights
//! spend_table        output point -> spending input point
//! unspent_table      set of unspent output points
//! history_table      address -> newest history row
//! history_rows       rows linked newest to oldest
//! stealth_rows       stealth rows in height order
//! process_lock       exclusive lock held while the database is started
//! ```
//!
//! Every file starts with a size or count, followed by its structure.
//! Files only grow while the database is open and are truncated to their
//! logical size when closed.

extern crate byteorder;
#[macro_use]
extern crate error_chain;
extern crate fs2;
extern crate hex_slice;
extern crate memmap;
extern crate parking_lot;
extern crate rayon;
extern crate ripemd;
extern crate sha2;
extern crate tiny_keccak;
#[macro_use]
extern crate tracing;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod chain;
pub mod databases;
pub mod error;
pub mod memory;
pub mod primitives;
pub mod result;

mod data_base;
mod options;
mod sequential_lock;
mod store;

pub use data_base::DataBase;
pub use error::{Error, ErrorKind, Result};
pub use options::{Checkpoint, Options, mainnet_bip30_exceptions};
pub use sequential_lock::ReadHandle;
pub use store::Store;
