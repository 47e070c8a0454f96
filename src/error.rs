#![allow(unknown_lints)]
#![allow(missing_docs)]

use std::io;
use std::path::PathBuf;

use chain::{Hash, OutputPoint};

error_chain! {
	foreign_links {
		Io(io::Error);
	}

	errors {
		InvalidKeyLen(expected: usize, got: usize) {
			description("invalid key length"),
			display("invalid key length, expected {}, got {}", expected, got),
		}
		InvalidOptions(field: &'static str, reason: String) {
			description("invalid options"),
			display("invalid option `{}`: {}", field, reason),
		}
		OutOfBounds(offset: usize, len: usize, size: usize) {
			description("access out of bounds"),
			display("access of {} bytes at {} exceeds mapped size {}", len, offset, size),
		}
		OutOfSpace(path: PathBuf, size: usize) {
			description("insufficient disk space"),
			display("cannot grow {} to {} bytes", path.display(), size),
		}
		Closed(path: PathBuf) {
			description("memory map is closed"),
			display("memory map {} is closed", path.display()),
		}
		DatabaseLocked(path: PathBuf) {
			description("database is locked by another process"),
			display("database lock {} is held by another process", path.display()),
		}
		AlreadyOpen(path: PathBuf) {
			description("database is already open"),
			display("database {} is already open", path.display()),
		}
		NotStarted {
			description("database is not started"),
			display("database is not started"),
		}
		Corrupted(reason: String) {
			description("database is corrupted"),
			display("database is corrupted: {}", reason),
		}
		InvalidHeight(expected: u32, got: u32) {
			description("invalid block height"),
			display("invalid block height, expected {}, got {}", expected, got),
		}
		MissingParent(height: u32) {
			description("block parent is missing"),
			display("block at height {} does not link to its parent", height),
		}
		DuplicateBlock(height: u32) {
			description("block already exists"),
			display("block already exists at height {}", height),
		}
		UnspentDuplicate(hash: Hash) {
			description("duplicate of an unspent transaction"),
			display("transaction {} duplicates an unspent transaction", hash),
		}
		MissingPreviousOutput(point: OutputPoint) {
			description("previous output is missing"),
			display("previous output {}:{} is missing", point.hash, point.index),
		}
		EmptyChain {
			description("chain is empty"),
			display("chain is empty"),
		}
		UnknownForkPoint(height: u32) {
			description("unknown fork point"),
			display("fork point at height {} does not match the stored chain", height),
		}
		PartialPush(pushed: usize) {
			description("block batch partially pushed"),
			display("block batch failed after {} blocks were pushed", pushed),
		}
	}
}

pub fn corrupted<S: Into<String>>(reason: S) -> Error {
	ErrorKind::Corrupted(reason.into()).into()
}
