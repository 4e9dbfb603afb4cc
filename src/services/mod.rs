//! Services layer: composes the Provider Registry, IMAP Session Manager,
//! SMTP/Draft Transmitter, Local Mailbox Store, and Query Engine into the
//! six spec §6 operations behind one `Engine` facade.

pub mod compose;
pub mod draft;
pub mod engine;
pub mod sync;

pub use compose::{ComposeRequest, Signature};
pub use draft::{dispatch_drafts, parse_draft_file, DispatchSummary, DraftFrontmatter, ParsedDraft, Priority};
pub use engine::{Engine, SearchScope, SendMode, SendOutcome};
pub use sync::{sync_folder, SyncOutcome, FIRST_SYNC_LOOKBACK_DAYS};
