//! Domain layer: the plain data types shared by every other module.
//!
//! This module contains the canonical [`Message`]/[`Account`] types and the
//! small set of newtype identifiers used to keep UIDs, UIDVALIDITYs,
//! Message-IDs and folder names from being accidentally confused with one
//! another.

mod account;
mod message;
mod types;

pub use account::Account;
pub use message::{Address, Attachment, Flag, Flags, Message};
pub use types::{FolderName, MessageId, Uid, UidValidity};
