//! Bitcoin value types persisted by the databases.

pub mod encode;
mod block;
mod hash;
mod point;
mod script;
mod transaction;

pub use self::block::{Block, Header};
pub use self::hash::{Hash, ShortHash, HexError, sha256d, hash160};
pub use self::point::{OutputPoint, InputPoint};
pub use self::script::{Script, Instruction, Instructions, PaymentAddress, AddressKind, opcode};
pub use self::transaction::{Input, Output, Transaction};
