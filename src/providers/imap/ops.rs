//! SEARCH/FETCH/STORE/APPEND/EXPUNGE (spec §4.4), generalized from the
//! teacher's Gmail-only `fetch_threads`/`fetch_thread` into provider-agnostic
//! operations over the canonical [`Message`] type.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use mail_parser::{Addr, Message as ParsedMessage, MessageParser};

use crate::domain::{Address, Attachment, Flag, Flags, FolderName, Message, MessageId, Uid};
use crate::error::{MssqeError, Result};

use super::session::ImapSession;

/// Which parts of a message to retrieve on fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchParts {
    /// Envelope and flags only (cheap; used by incremental sync indexing).
    EnvelopeAndFlags,
    /// Envelope, flags, and the full `BODY[]` (used when reading a message).
    Full,
}

/// A STORE mutation: add or remove the given flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Add,
    Remove,
}

/// Structured SEARCH criteria translated into an IMAP SEARCH expression
/// (spec §4.4 `search`, §4.6 structured predicates).
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub larger: Option<u64>,
    pub smaller: Option<u64>,
    pub require_flags: Vec<Flag>,
    pub exclude_flags: Vec<Flag>,
    pub uid_from: Option<u32>,
}

impl SearchCriteria {
    /// Criteria that matches every message; used for a first-ever sync's
    /// 30-day lookback is expressed via `since`, not this helper.
    pub fn all() -> Self {
        Self::default()
    }

    fn to_imap_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(since) = self.since {
            parts.push(format!("SINCE {}", since.format("%d-%b-%Y")));
        }
        if let Some(before) = self.before {
            parts.push(format!("BEFORE {}", before.format("%d-%b-%Y")));
        }
        if let Some(from) = &self.from {
            parts.push(format!("FROM \"{}\"", escape_quotes(from)));
        }
        if let Some(to) = &self.to {
            parts.push(format!("TO \"{}\"", escape_quotes(to)));
        }
        if let Some(subject) = &self.subject {
            parts.push(format!("SUBJECT \"{}\"", escape_quotes(subject)));
        }
        if let Some(larger) = self.larger {
            parts.push(format!("LARGER {larger}"));
        }
        if let Some(smaller) = self.smaller {
            parts.push(format!("SMALLER {smaller}"));
        }
        if let Some(uid_from) = self.uid_from {
            parts.push(format!("UID {uid_from}:*"));
        }
        for flag in &self.require_flags {
            parts.push(imap_search_flag_token(*flag, true).to_string());
        }
        for flag in &self.exclude_flags {
            parts.push(imap_search_flag_token(*flag, false).to_string());
        }
        if parts.is_empty() {
            "ALL".to_string()
        } else {
            parts.join(" ")
        }
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn imap_search_flag_token(flag: Flag, present: bool) -> &'static str {
    match (flag, present) {
        (Flag::Seen, true) => "SEEN",
        (Flag::Seen, false) => "UNSEEN",
        (Flag::Answered, true) => "ANSWERED",
        (Flag::Answered, false) => "UNANSWERED",
        (Flag::Flagged, true) => "FLAGGED",
        (Flag::Flagged, false) => "UNFLAGGED",
        (Flag::Draft, true) => "DRAFT",
        (Flag::Draft, false) => "UNDRAFT",
        (Flag::Deleted, true) => "DELETED",
        (Flag::Deleted, false) => "UNDELETED",
    }
}

/// Translates `criteria` into an IMAP SEARCH and returns matching UIDs in
/// server order (spec §4.4 `search`).
pub async fn search(session: &mut ImapSession, criteria: &SearchCriteria) -> Result<Vec<Uid>> {
    let inner = session.session_mut()?;
    let query = criteria.to_imap_query();
    let uids = inner
        .uid_search(&query)
        .await
        .map_err(|e| MssqeError::ProtocolError(format!("SEARCH failed: {e}")))?;
    let mut sorted: Vec<u32> = uids.into_iter().collect();
    sorted.sort_unstable();
    Ok(sorted.into_iter().map(Uid).collect())
}

/// Fetches envelope (+ optionally body) and flags for `uids` in `folder`
/// (spec §4.4 `fetch`). Collects eagerly into a `Vec`; callers that want to
/// stop early should pre-trim `uids`.
pub async fn fetch(
    session: &mut ImapSession,
    folder: &FolderName,
    uids: &[Uid],
    parts: FetchParts,
) -> Result<Vec<Message>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let seq = uids
        .iter()
        .map(|u| u.0.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let fetch_items = match parts {
        FetchParts::EnvelopeAndFlags => "(UID FLAGS ENVELOPE RFC822.SIZE)",
        FetchParts::Full => "(UID FLAGS ENVELOPE RFC822.SIZE BODY[])",
    };

    let inner = session.session_mut()?;
    let mut stream = inner
        .uid_fetch(&seq, fetch_items)
        .await
        .map_err(|e| MssqeError::ProtocolError(format!("FETCH failed: {e}")))?;

    let mut messages = Vec::with_capacity(uids.len());
    while let Some(item) = stream.next().await {
        let item = item.map_err(|e| MssqeError::ProtocolError(format!("FETCH item: {e}")))?;
        if let Some(message) = parse_fetch(&item, folder) {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// Adds or removes `flags` on `uids` (spec §4.4 `store`).
pub async fn store(
    session: &mut ImapSession,
    uids: &[Uid],
    op: StoreOp,
    flags: &[Flag],
) -> Result<()> {
    if uids.is_empty() || flags.is_empty() {
        return Ok(());
    }
    let seq = uids
        .iter()
        .map(|u| u.0.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let tokens: Vec<&str> = flags.iter().map(|f| f.imap_token()).collect();
    let prefix = match op {
        StoreOp::Add => "+FLAGS",
        StoreOp::Remove => "-FLAGS",
    };
    let query = format!("{prefix} ({})", tokens.join(" "));

    let inner = session.session_mut()?;
    let mut stream = inner
        .uid_store(&seq, &query)
        .await
        .map_err(|e| MssqeError::ProtocolError(format!("STORE failed: {e}")))?;
    while let Some(item) = stream.next().await {
        item.map_err(|e| MssqeError::ProtocolError(format!("STORE item: {e}")))?;
    }
    Ok(())
}

/// Uploads `raw_message` into `folder` with `flags`, returning the assigned
/// UID (spec §4.4 `append`).
///
/// `async-imap`'s high-level API does not surface the server's `APPENDUID`
/// response code directly, so UID capture uniformly uses the spec's
/// documented fallback: a `UID SEARCH HEADER Message-ID` against the same
/// folder immediately after a successful APPEND. `message_id` must be the
/// exact value placed in the uploaded message's `Message-ID` header.
pub async fn append(
    session: &mut ImapSession,
    folder: &str,
    raw_message: &[u8],
    flags: &[Flag],
    message_id: &str,
) -> Result<Uid> {
    {
        let inner = session.session_mut()?;
        let imap_flags: Vec<async_imap::types::Flag<'static>> = flags
            .iter()
            .map(|f| imap_client_flag(*f))
            .collect();
        inner
            .append(folder, raw_message)
            .flags(imap_flags)
            .finish()
            .await
            .map_err(|e| MssqeError::ProtocolError(format!("APPEND failed: {e}")))?;
    }

    session.select(folder).await?;
    let inner = session.session_mut()?;
    let query = format!("HEADER \"Message-ID\" \"{}\"", escape_quotes(message_id));
    let uids = inner
        .uid_search(&query)
        .await
        .map_err(|e| MssqeError::ProtocolError(format!("post-APPEND SEARCH failed: {e}")))?;

    uids.into_iter()
        .max()
        .map(Uid)
        .ok_or_else(|| MssqeError::ProtocolError("APPEND succeeded but UID not found".to_string()))
}

fn imap_client_flag(flag: Flag) -> async_imap::types::Flag<'static> {
    match flag {
        Flag::Seen => async_imap::types::Flag::Seen,
        Flag::Answered => async_imap::types::Flag::Answered,
        Flag::Flagged => async_imap::types::Flag::Flagged,
        Flag::Draft => async_imap::types::Flag::Draft,
        Flag::Deleted => async_imap::types::Flag::Deleted,
    }
}

/// Async counterpart to `registry::resolve_special_folder`: tries each
/// candidate folder name against a live session in order, returning the
/// first one that SELECTs successfully. The registry's `FolderProbe` trait
/// is synchronous (kept that way so it stays unit-testable without a
/// server); real resolution against a live IMAP connection goes through
/// this function instead. `kind` (e.g. `"drafts"`, `"sent"`) names which
/// special folder is being resolved, so a failure reports the right one.
pub async fn resolve_folder(session: &mut ImapSession, kind: &str, candidates: &[&str]) -> Result<String> {
    for candidate in candidates {
        if session.try_select(candidate).await {
            return Ok((*candidate).to_string());
        }
    }
    Err(MssqeError::NoDraftsFolder {
        kind: kind.to_string(),
        candidates: candidates.join(", "),
    })
}

/// Removes every `\Deleted`-flagged message from the selected folder,
/// returning the UIDs that were removed (spec §4.4 `expunge`).
pub async fn expunge(session: &mut ImapSession) -> Result<Vec<Uid>> {
    let inner = session.session_mut()?;
    let mut stream = inner
        .uid_expunge("1:*")
        .await
        .map_err(|e| MssqeError::ProtocolError(format!("EXPUNGE failed: {e}")))?;

    let mut removed = Vec::new();
    while let Some(item) = stream.next().await {
        if let Ok(uid) = item {
            removed.push(Uid(uid));
        }
    }
    Ok(removed)
}

fn parse_fetch(item: &async_imap::types::Fetch, folder: &FolderName) -> Option<Message> {
    let uid = item.uid?;
    let envelope = item.envelope();
    let size = item.size.unwrap_or(0) as u64;

    let mut flags = Flags::new();
    for f in item.flags() {
        match f {
            async_imap::types::Flag::Seen => {
                flags.insert(Flag::Seen);
            }
            async_imap::types::Flag::Answered => {
                flags.insert(Flag::Answered);
            }
            async_imap::types::Flag::Flagged => {
                flags.insert(Flag::Flagged);
            }
            async_imap::types::Flag::Draft => {
                flags.insert(Flag::Draft);
            }
            async_imap::types::Flag::Deleted => {
                flags.insert(Flag::Deleted);
            }
            _ => {}
        }
    }

    // When the full body was fetched, prefer parsing it with mail-parser for
    // decoded text/html parts and attachment metadata; otherwise fall back
    // to the cheaper ENVELOPE fields only.
    if let Some(body) = item.body() {
        if let Some(parsed) = MessageParser::default().parse(body) {
            return Some(from_parsed(uid, folder.clone(), size, flags, &parsed));
        }
    }

    let envelope = envelope?;
    let from = envelope
        .from
        .as_ref()
        .and_then(|addrs| addrs.first())
        .map(|addr| Address {
            email: build_email(addr.mailbox.as_deref(), addr.host.as_deref()),
            name: addr.name.as_ref().map(|b| bytes_to_string(b)),
        })
        .unwrap_or_else(|| Address::new(""));

    let to = envelope
        .to
        .as_ref()
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| Address {
                    email: build_email(a.mailbox.as_deref(), a.host.as_deref()),
                    name: a.name.as_ref().map(|b| bytes_to_string(b)),
                })
                .collect()
        })
        .unwrap_or_default();

    let cc = envelope
        .cc
        .as_ref()
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| Address {
                    email: build_email(a.mailbox.as_deref(), a.host.as_deref()),
                    name: a.name.as_ref().map(|b| bytes_to_string(b)),
                })
                .collect()
        })
        .unwrap_or_default();

    let subject = envelope.subject.as_ref().map(|b| bytes_to_string(b));
    let message_id = envelope
        .message_id
        .as_ref()
        .map(|b| MessageId::from(bytes_to_string(b)));

    let date = envelope
        .date
        .as_ref()
        .and_then(|d| DateTime::parse_from_rfc2822(&bytes_to_string(d)).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(Message {
        uid: Uid(uid),
        folder: folder.clone(),
        message_id,
        from,
        to,
        cc,
        bcc: Vec::new(),
        subject,
        date,
        body_text: None,
        body_html: None,
        flags,
        attachments: Vec::new(),
        size,
    })
}

fn from_parsed(
    uid: u32,
    folder: FolderName,
    size: u64,
    flags: Flags,
    parsed: &ParsedMessage,
) -> Message {
    let from = parsed
        .from()
        .and_then(|a| a.as_list())
        .and_then(|list| list.first())
        .map(parse_addr)
        .unwrap_or_else(|| Address::new(""));

    let to = parsed
        .to()
        .and_then(|a| a.as_list())
        .map(|list| list.iter().map(parse_addr).collect())
        .unwrap_or_default();

    let cc = parsed
        .cc()
        .and_then(|a| a.as_list())
        .map(|list| list.iter().map(parse_addr).collect())
        .unwrap_or_default();

    let subject = parsed.subject().map(|s| s.to_string());
    let message_id = parsed.message_id().map(|s| MessageId::from(s.to_string()));

    let date = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    let body_text = parsed.body_text(0).map(|s| s.to_string());
    let body_html = parsed.body_html(0).map(|s| s.to_string());

    let attachments = parsed
        .attachments()
        .map(|att| Attachment {
            filename: att.attachment_name().unwrap_or("attachment").to_string(),
            content_type: att
                .content_type()
                .map(|ct| {
                    ct.subtype()
                        .map(|st| format!("{}/{}", ct.ctype(), st))
                        .unwrap_or_else(|| ct.ctype().to_string())
                })
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            size_bytes: att.contents().len() as u64,
            payload_path: None,
            inline_data: if att.contents().len() as u64 <= Attachment::INLINE_THRESHOLD_BYTES {
                Some(att.contents().to_vec())
            } else {
                None
            },
        })
        .collect();

    Message {
        uid: Uid(uid),
        folder,
        message_id,
        from,
        to,
        cc,
        bcc: Vec::new(),
        subject,
        date,
        body_text,
        body_html,
        flags,
        attachments,
        size,
    }
}

fn parse_addr(addr: &Addr) -> Address {
    Address {
        email: addr.address().unwrap_or("").to_string(),
        name: addr.name().map(|s| s.to_string()),
    }
}

fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

fn build_email(mailbox: Option<&[u8]>, host: Option<&[u8]>) -> String {
    match (mailbox, host) {
        (Some(m), Some(h)) => format!("{}@{}", bytes_to_string(m), bytes_to_string(h)),
        (Some(m), None) => bytes_to_string(m),
        _ => String::new(),
    }
}
