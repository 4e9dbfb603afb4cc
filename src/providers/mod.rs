//! Wire-protocol providers: the Provider Registry, IMAP Session Manager, and
//! SMTP/Draft transmitter (spec §4.1, §4.4, §4.5).

pub mod imap;
pub mod registry;
pub mod smtp;

pub use registry::Provider;
