//! On-disk message record format (spec §4.3): one JSON file per message,
//! named so a directory listing sorts by UID, with large attachment
//! payloads split into sibling files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Attachment, Message};

fn default_schema_version() -> u32 {
    1
}

/// A persisted message: the canonical [`Message`] plus the time it was
/// fetched, so staleness can be reasoned about independently of the
/// message's own `date` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub message: Message,
    pub fetched_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(message: Message) -> Self {
        Self {
            schema_version: default_schema_version(),
            message,
            fetched_at: Utc::now(),
        }
    }
}

/// Builds the record filename for `uid`/`subject`: `{uid:010}-{slug}.json`.
/// Zero-padding the UID keeps a plain directory listing in UID order without
/// relying on the filesystem's sort being numeric-aware.
pub fn record_filename(uid: u32, subject: Option<&str>) -> String {
    format!("{:010}-{}.json", uid, subject_slug(subject))
}

/// Builds an out-of-line attachment payload filename for the `index`-th
/// attachment of the message with the given `uid`.
pub fn attachment_filename(uid: u32, index: usize, attachment: &Attachment) -> String {
    format!(
        "{:010}-att-{}-{}",
        uid,
        index,
        subject_slug(Some(&attachment.filename))
    )
}

/// Whether this attachment's payload should be stored inline on the record
/// (spec §4.3: attachments at or under 8 KiB are inlined; larger ones are
/// written as sibling files and referenced by relative path).
pub fn should_inline(attachment: &Attachment) -> bool {
    attachment.size_bytes <= Attachment::INLINE_THRESHOLD_BYTES
}

/// Lowercases, collapses whitespace, strips non-alphanumeric characters, and
/// truncates to 40 bytes. An empty or absent subject slugs to `no-subject`.
fn subject_slug(subject: Option<&str>) -> String {
    let raw = subject.unwrap_or("").trim();
    if raw.is_empty() {
        return "no-subject".to_string();
    }

    let mut slug = String::new();
    let mut last_was_sep = false;
    for ch in raw.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }

    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        return "no-subject".to_string();
    }

    let mut end = trimmed.len().min(40);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Flags, FolderName, Uid};

    fn sample_message(uid: u32, subject: Option<&str>) -> Message {
        Message {
            uid: Uid(uid),
            folder: FolderName::inbox(),
            message_id: None,
            from: Address::new("a@b.com"),
            to: vec![],
            cc: vec![],
            bcc: vec![],
            subject: subject.map(|s| s.to_string()),
            date: Utc::now(),
            body_text: None,
            body_html: None,
            flags: Flags::new(),
            attachments: vec![],
            size: 0,
        }
    }

    #[test]
    fn record_filename_zero_pads_uid() {
        assert_eq!(
            record_filename(7, Some("Hello World")),
            "0000000007-hello-world.json"
        );
    }

    #[test]
    fn record_filename_empty_subject_uses_no_subject() {
        assert_eq!(record_filename(1, None), "0000000001-no-subject.json");
        assert_eq!(record_filename(1, Some("   ")), "0000000001-no-subject.json");
    }

    #[test]
    fn subject_slug_strips_punctuation() {
        assert_eq!(subject_slug(Some("Re: Invoice #42!!")), "re-invoice-42");
    }

    #[test]
    fn subject_slug_truncates_to_40_bytes() {
        let long = "a".repeat(100);
        let slug = subject_slug(Some(&long));
        assert!(slug.len() <= 40);
    }

    #[test]
    fn should_inline_respects_threshold() {
        let small = Attachment {
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 1024,
            payload_path: None,
            inline_data: None,
        };
        let large = Attachment {
            size_bytes: 9 * 1024,
            ..small.clone()
        };
        assert!(should_inline(&small));
        assert!(!should_inline(&large));
    }

    #[test]
    fn message_record_new_stamps_fetched_at() {
        let record = MessageRecord::new(sample_message(1, Some("hi")));
        assert_eq!(record.schema_version, 1);
        assert_eq!(record.message.uid, Uid(1));
    }

    #[test]
    fn attachment_filename_includes_index() {
        let att = Attachment {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 20_000,
            payload_path: None,
            inline_data: None,
        };
        assert_eq!(attachment_filename(3, 0, &att), "0000000003-att-0-report-pdf");
    }
}
