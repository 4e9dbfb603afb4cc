//! Internal command surface (spec §6): a minimal `clap`-derived CLI so the
//! crate is runnable end to end in this exercise. The richer external CLI
//! wrapper (flag ergonomics, interactive prompts, AI-driven query
//! generation) is an out-of-scope collaborator per spec.md §1 — this is
//! just enough surface to drive [`crate::services::Engine`] from a
//! terminal, with each command given its own disjoint flag namespace (spec
//! §9 "Open question (flag ambiguity between `send` and `search`)").

use clap::{Parser, Subcommand};

use crate::domain::{Flag, FolderName, Uid};
use crate::providers::imap::StoreOp;
use crate::query::{parse as parse_query, parse_date_expr, parse_size, StructuredFilter};
use crate::services::SearchScope;

#[derive(Debug, Parser)]
#[command(name = "mssqe", about = "Mail synchronization, storage, and query engine", version)]
pub struct Cli {
    /// Account selector (exact email or a wildcard-domain address). Defaults
    /// to the active account when omitted.
    #[arg(long, global = true)]
    pub account: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Incrementally sync a folder from the server into the local mirror.
    Sync {
        #[arg(long)]
        folder: Option<String>,
    },
    /// Fetch one message's full body and attachments by UID.
    Read {
        #[arg(long, default_value = "INBOX")]
        folder: String,
        uid: u32,
    },
    /// Query the local mirror (or the live server) for matching messages.
    Search {
        /// Free-text query (boolean/fuzzy grammar, spec §4.6).
        query: Option<String>,
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        min_size: Option<String>,
        #[arg(long)]
        max_size: Option<String>,
        #[arg(long)]
        unread: bool,
        #[arg(long)]
        live: bool,
        #[arg(long)]
        no_fuzzy: bool,
        #[arg(long)]
        case_sensitive: bool,
    },
    /// Mark messages with a flag.
    Mark {
        #[arg(long, default_value = "INBOX")]
        folder: String,
        uids: Vec<u32>,
        #[arg(long, value_enum)]
        flag: CliFlag,
        #[arg(long)]
        remove: bool,
    },
    /// Delete (EXPUNGE) messages by UID.
    Delete {
        #[arg(long, default_value = "INBOX")]
        folder: String,
        uids: Vec<u32>,
    },
    /// Compose and transmit or draft a message (spec §4.5, §6 `send`).
    Send {
        #[arg(long = "to", required = true)]
        to: Vec<String>,
        #[arg(long = "cc")]
        cc: Vec<String>,
        #[arg(long = "bcc")]
        bcc: Vec<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        /// APPEND to Drafts instead of transmitting over SMTP.
        #[arg(long)]
        draft: bool,
        /// When set with `--draft`, replaces this existing draft UID
        /// (append-then-expunge, spec §4.5 "draft edit-by-UID").
        #[arg(long)]
        edit_uid: Option<u32>,
    },
    /// Send all pending drafts under a directory (spec §4.5 bulk dispatch).
    SendDrafts {
        #[arg(long)]
        dir: std::path::PathBuf,
    },
    /// Set the active account.
    Activate { email: String },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFlag {
    Seen,
    Answered,
    Flagged,
    Draft,
    Deleted,
}

impl From<CliFlag> for Flag {
    fn from(f: CliFlag) -> Self {
        match f {
            CliFlag::Seen => Flag::Seen,
            CliFlag::Answered => Flag::Answered,
            CliFlag::Flagged => Flag::Flagged,
            CliFlag::Draft => Flag::Draft,
            CliFlag::Deleted => Flag::Deleted,
        }
    }
}

impl Commands {
    /// Resolves a `--folder` string into a [`FolderName`], defaulting to
    /// `INBOX`.
    pub fn folder_name(folder: Option<&str>) -> FolderName {
        folder.map(FolderName::from).unwrap_or_else(FolderName::inbox)
    }
}

/// Builds the structured filter half of a `search` invocation from its CLI
/// flags (spec §4.6 structured predicates).
pub fn build_structured_filter(
    folder: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    subject: Option<&str>,
    since: Option<&str>,
    min_size: Option<&str>,
    max_size: Option<&str>,
    unread: bool,
) -> StructuredFilter {
    let date_range = since.and_then(parse_date_expr).unwrap_or_default();

    StructuredFilter {
        folder: folder.map(FolderName::from),
        from: from.map(str::to_string),
        to: to.map(str::to_string),
        subject_contains: subject.map(str::to_string),
        date_range,
        min_size: min_size.and_then(parse_size),
        max_size: max_size.and_then(parse_size),
        has_attachments: None,
        unread_only: unread,
    }
}

/// Parses a free-text query string, returning `None` for an empty/absent
/// query rather than surfacing an empty-query parse error.
pub fn build_free_text(query: Option<&str>) -> crate::error::Result<Option<crate::query::QueryNode>> {
    match query {
        None => Ok(None),
        Some(q) if q.trim().is_empty() => Ok(None),
        Some(q) => parse_query(q)
            .map(Some)
            .map_err(|e| crate::error::MssqeError::ProtocolError(e.to_string())),
    }
}

pub fn search_scope(live: bool) -> SearchScope {
    if live {
        SearchScope::Live
    } else {
        SearchScope::Local
    }
}

pub fn store_op(remove: bool) -> StoreOp {
    if remove {
        StoreOp::Remove
    } else {
        StoreOp::Add
    }
}

pub fn uids(raw: &[u32]) -> Vec<Uid> {
    raw.iter().copied().map(Uid).collect()
}

/// Builds a [`crate::services::ComposeRequest`] from `send`'s CLI flags.
pub fn build_compose_request(
    to: &[String],
    cc: &[String],
    bcc: &[String],
    subject: &str,
    body: &str,
) -> crate::services::ComposeRequest {
    use crate::domain::Address;
    use crate::services::{ComposeRequest, Signature};

    ComposeRequest {
        to: to.iter().map(|s| Address::new(s.as_str())).collect(),
        cc: cc.iter().map(|s| Address::new(s.as_str())).collect(),
        bcc: bcc.iter().map(|s| Address::new(s.as_str())).collect(),
        subject: subject.to_string(),
        body_text: body.to_string(),
        body_html: None,
        attachments: Vec::new(),
        signature: Signature::Default,
    }
}
