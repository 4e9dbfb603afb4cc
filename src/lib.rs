//! MSSQE — Mail Synchronization, Storage, and Query Engine.
//!
//! The core of a command-line email client: a local mirror of one or more
//! IMAP mailboxes, an SMTP/draft transmitter, and a query engine over the
//! local mirror. See `SPEC_FULL.md` for the full design.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod license;
pub mod providers;
pub mod query;
pub mod services;
pub mod storage;

pub use error::{MssqeError, Result};
pub use services::Engine;
