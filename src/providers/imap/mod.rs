//! IMAP Session Manager (spec §4.4): connects, authenticates, selects
//! folders, and issues FETCH/SEARCH/STORE/APPEND/EXPUNGE. At most one session
//! per (account, folder) within a process; sessions are not `Send` across an
//! await boundary shared with another session, mirroring "IMAP is not
//! thread-safe per connection" (spec §5).

mod ops;
mod session;

pub use ops::{resolve_folder, search, fetch, store, append, expunge, FetchParts, SearchCriteria, StoreOp};
pub use session::{ImapSession, Selected};
