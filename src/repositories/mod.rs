pub mod ledger;
pub mod readings;
pub mod retry;

pub use ledger::{DailyLedgerEntry, LedgerStore, MemoryLedgerStore, PgLedgerStore};
pub use readings::{MemoryReadingStore, PgReadingStore, ReadingStore};
pub use retry::{RetryPolicy, RetryingLedgerStore};
