//! Credential/Account Store (spec §4.2): two-tier config root resolution
//! and the on-disk account document.

pub mod paths;
pub mod store;

pub use paths::{resolve_from_cwd, ConfigRoot, Tier};
pub use store::{AccountStoreDocument, StoredAccount};
