//! Sequential document numbering for invoices, bills and catalog items.
//!
//! Numbers are drawn from a [`CounterStore`] through a [`SequenceAllocator`],
//! scoped per document type and, for invoices and bills, per fiscal year.

mod allocator;
mod document;
mod error;
mod fiscal;
mod format;
mod memory;
mod scope;
mod sqlite;
mod store;

pub use allocator::{RetryPolicy, SequenceAllocator};
pub use document::DocumentType;
pub use error::{SequenceError, SequenceResult, StoreError, StoreResult};
pub use fiscal::{
    fiscal_year_label, Clock, FiscalYear, FixedClock, SystemClock, FISCAL_YEAR_START_MONTH,
};
pub use format::{format_number, DocumentNumber, SEQUENCE_WIDTH};
pub use memory::InMemoryCounterStore;
pub use scope::ScopeKey;
pub use sqlite::SqliteCounterStore;
pub use store::{Counter, CounterStore};
