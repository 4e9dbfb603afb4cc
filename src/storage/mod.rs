//! Local Mailbox Store (spec §4.3): content-addressed, atomically-written
//! record files plus an aggregate index, and the per-account advisory lock
//! (spec §5) that guards writes to both.

pub mod aggregate;
pub mod lock;
pub mod lms;
pub mod record;

pub use aggregate::AggregateIndex;
pub use lms::LocalMailboxStore;
pub use lock::AccountLock;
pub use record::MessageRecord;
