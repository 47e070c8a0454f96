//! Lazily decoded views over stored blocks and transactions.

mod block_result;
mod transaction_result;

pub use self::block_result::BlockResult;
pub use self::transaction_result::{TransactionResult, NOT_SPENT};
