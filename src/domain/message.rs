//! Canonical message representation.
//!
//! A [`Message`] is the in-memory form shared by the IMAP provider (on
//! fetch), the SMTP/draft transmitter (on compose), the Local Mailbox
//! Store (on persist) and the Query Engine (on evaluation). It is
//! addressable within an account by (folder, UID) even when no
//! `Message-ID` header is present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{FolderName, MessageId, Uid};

/// One of the five flags IMAP tracks per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Draft,
    Deleted,
}

impl Flag {
    /// The literal IMAP flag token, e.g. `\Seen`.
    pub fn imap_token(self) -> &'static str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Draft => "\\Draft",
            Flag::Deleted => "\\Deleted",
        }
    }
}

/// A set of message flags. Thin wrapper so callers get set semantics
/// (dedup, `contains`) without reaching for a raw `Vec`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(pub HashSet<Flag>);

impl Flags {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    pub fn insert(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: Flag) -> bool {
        self.0.remove(&flag)
    }

    pub fn is_seen(&self) -> bool {
        self.contains(Flag::Seen)
    }

    pub fn is_draft(&self) -> bool {
        self.contains(Flag::Draft)
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Email address, e.g. `jane@example.com`.
    pub email: String,
    /// Display name, e.g. `Jane Doe`.
    pub name: Option<String>,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Creates a new address with email and display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Returns the domain portion of the address, if the address is well-formed.
    pub fn domain(&self) -> Option<&str> {
        self.email.split('@').nth(1)
    }

    /// Returns the local-part portion of the address, if well-formed.
    pub fn local_part(&self) -> Option<&str> {
        self.email.split('@').next()
    }

    /// Returns the display representation of this address.
    ///
    /// If a name is present, returns "Name <email>", otherwise just the email.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A file attachment on a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Relative path to the payload file beside the message record, when the
    /// attachment is large enough to be stored out-of-line. `None` means the
    /// payload (if any) is carried inline on this struct via `inline_data`.
    pub payload_path: Option<String>,
    /// Inline base64-free payload for small attachments (<= 8 KiB). `None`
    /// until lazily fetched.
    pub inline_data: Option<Vec<u8>>,
}

impl Attachment {
    /// Threshold, in bytes, below which attachment payloads are stored
    /// inline in the message record rather than beside it.
    pub const INLINE_THRESHOLD_BYTES: u64 = 8 * 1024;
}

/// The canonical, provider-agnostic message form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Per-folder UID assigned by the IMAP server. Not globally unique.
    pub uid: Uid,
    /// The folder this message currently lives in.
    pub folder: FolderName,
    /// RFC 5322 Message-ID header, when present.
    pub message_id: Option<MessageId>,
    /// Sender address.
    pub from: Address,
    /// Primary recipients.
    pub to: Vec<Address>,
    /// Carbon-copy recipients.
    pub cc: Vec<Address>,
    /// Blind carbon-copy recipients. Never present on a message fetched
    /// from a server (BCC is stripped from the transmitted DATA block);
    /// only populated on locally composed, not-yet-sent messages.
    pub bcc: Vec<Address>,
    /// Decoded UTF-8 subject line.
    pub subject: Option<String>,
    /// Message send time, with timezone.
    pub date: DateTime<Utc>,
    /// Decoded plain-text body, when present.
    pub body_text: Option<String>,
    /// Decoded HTML body, when present.
    pub body_html: Option<String>,
    /// Current IMAP flags.
    pub flags: Flags,
    /// Attachment metadata (payload bytes fetched lazily).
    pub attachments: Vec<Attachment>,
    /// Total message size in bytes as reported by IMAP `RFC822.SIZE`.
    pub size: u64,
}

impl Message {
    /// Whether this message carries the `Draft` flag.
    pub fn is_draft(&self) -> bool {
        self.flags.is_draft()
    }

    /// A short preview of the message body, for listings.
    pub fn snippet(&self, max_chars: usize) -> String {
        self.body_text
            .as_deref()
            .map(|s| s.chars().take(max_chars).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display_with_name() {
        let addr = Address::with_name("test@example.com", "Test User");
        assert_eq!(addr.display(), "Test User <test@example.com>");
    }

    #[test]
    fn address_display_without_name() {
        let addr = Address::new("test@example.com");
        assert_eq!(addr.display(), "test@example.com");
    }

    #[test]
    fn address_domain_and_local_part() {
        let addr = Address::new("support@raggle.co");
        assert_eq!(addr.domain(), Some("raggle.co"));
        assert_eq!(addr.local_part(), Some("support"));
    }

    #[test]
    fn flags_insert_and_contains() {
        let mut flags = Flags::new();
        assert!(!flags.is_seen());
        flags.insert(Flag::Seen);
        assert!(flags.is_seen());
        flags.remove(Flag::Seen);
        assert!(!flags.is_seen());
    }

    #[test]
    fn flag_imap_tokens() {
        assert_eq!(Flag::Seen.imap_token(), "\\Seen");
        assert_eq!(Flag::Deleted.imap_token(), "\\Deleted");
    }

    #[test]
    fn attachment_serialization() {
        let attachment = Attachment {
            filename: "document.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 1024,
            payload_path: None,
            inline_data: Some(vec![0x25, 0x50, 0x44, 0x46]),
        };

        let json = serde_json::to_string(&attachment).unwrap();
        let deserialized: Attachment = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.filename, "document.pdf");
        assert_eq!(deserialized.size_bytes, 1024);
    }

    #[test]
    fn message_without_message_id_is_still_constructible() {
        let msg = Message {
            uid: Uid(7),
            folder: FolderName::inbox(),
            message_id: None,
            from: Address::new("sender@example.com"),
            to: vec![Address::new("recipient@example.com")],
            cc: vec![],
            bcc: vec![],
            subject: Some("Hi".to_string()),
            date: Utc::now(),
            body_text: Some("hello".to_string()),
            body_html: None,
            flags: Flags::new(),
            attachments: vec![],
            size: 128,
        };

        assert!(msg.message_id.is_none());
        assert_eq!(msg.uid, Uid(7));
    }

    #[test]
    fn snippet_truncates() {
        let msg = Message {
            uid: Uid(1),
            folder: FolderName::inbox(),
            message_id: None,
            from: Address::new("a@b.com"),
            to: vec![],
            cc: vec![],
            bcc: vec![],
            subject: None,
            date: Utc::now(),
            body_text: Some("hello world this is a long body".to_string()),
            body_html: None,
            flags: Flags::new(),
            attachments: vec![],
            size: 10,
        };

        assert_eq!(msg.snippet(5), "hello");
    }
}
