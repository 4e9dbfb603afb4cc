//! The `Engine` facade (spec §6): the six operations (`sync`, `read`,
//! `search`, `send`, `mark`, `delete`) that every external interface (the
//! CLI in this exercise, or a future UI) drives the MSSQE through.

use chrono::Utc;

use crate::domain::{Account, Flag, FolderName, Message, Uid};
use crate::error::{MssqeError, Result};
use crate::license::{self, OperationKind};
use crate::providers::imap::{self, FetchParts, ImapSession, StoreOp};
use crate::providers::smtp::{render, send as smtp_send, OutgoingMessage};
use crate::providers::{registry, Provider};
use crate::storage::{AccountLock, LocalMailboxStore};

use super::compose::ComposeRequest;
use super::draft::{dispatch_drafts, DispatchSummary};
use super::sync::sync_folder;
use crate::query::{evaluate, sort_results, MatchOptions, QueryNode, StructuredFilter};

/// Whether a `search` reads the local mirror or hits the live server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Local,
    Live,
}

/// Whether `send` transmits immediately or APPENDs a draft (spec §6
/// `send(account, composed-message, mode=send|draft, edit-uid?)`).
#[derive(Debug, Clone, Copy)]
pub enum SendMode {
    Send,
    Draft,
}

/// The outcome of a `send` call: either a transmission receipt or a new
/// draft's assigned UID.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent,
    Drafted(Uid),
}

/// Owns the on-disk root (config + Local Mailbox Store) and exposes the six
/// spec-level operations as async methods, composing the Provider Registry,
/// IMAP Session Manager, SMTP/Draft Transmitter, and Query Engine.
pub struct Engine {
    root: std::path::PathBuf,
}

impl Engine {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn lms(&self, account: &Account) -> LocalMailboxStore {
        LocalMailboxStore::new(&self.root, &account.email)
    }

    fn provider_for(&self, account: &Account) -> Result<Provider> {
        registry::lookup(&account.provider_key)
    }

    /// `sync(account, folder?, limit?)` (spec §6): syncs one folder if
    /// given, otherwise INBOX only — syncing every folder is left to a
    /// caller that enumerates folders itself via repeated calls, since the
    /// spec's data model only tracks a `LastEmailDate` cursor per folder,
    /// not a cross-folder one.
    pub async fn sync(&self, account: &Account, folder: Option<FolderName>) -> Result<usize> {
        license::gate(OperationKind::Mutating, Utc::now())?;

        let _lock = AccountLock::acquire(&self.root, &account.email)?;
        let provider = self.provider_for(account)?;
        let lms = self.lms(account);
        let folder = folder.unwrap_or_else(FolderName::inbox);

        let mut session = ImapSession::open(account, &provider).await?;
        let outcome = sync_folder(&mut session, &lms, &folder).await;
        session.close().await?;

        Ok(outcome?.fetched)
    }

    /// `read(account, id-or-uid)` (spec §6): returns one message with full
    /// body and attachments, fetching live if the cached record lacks a
    /// body, and marking it `\Seen` both on the server and in the local
    /// record.
    pub async fn read(&self, account: &Account, folder: &FolderName, uid: Uid) -> Result<Message> {
        license::gate(OperationKind::ReadOnly, Utc::now())?;

        let lms = self.lms(account);
        if let Some(record) = lms.read_record(folder, uid)? {
            if record.message.body_text.is_some() || record.message.body_html.is_some() {
                self.mark(account, folder, &[uid], Flag::Seen, StoreOp::Add).await?;
                let mut message = record.message;
                message.flags.insert(Flag::Seen);
                return Ok(message);
            }
        }

        let provider = self.provider_for(account)?;
        let mut session = ImapSession::open(account, &provider).await?;
        session.select(&folder.0).await?;
        let mut messages = imap::fetch(&mut session, folder, &[uid], FetchParts::Full).await?;
        imap::store(&mut session, &[uid], StoreOp::Add, &[Flag::Seen]).await?;
        session.close().await?;

        let message = messages
            .pop()
            .ok_or_else(|| MssqeError::ProtocolError(format!("no such message: UID {}", uid.0)))?;
        lms.write_record(&message)?;
        Ok(message)
    }

    /// `search(account, criteria, free-text?, scope=local|live)` (spec §6).
    /// A live scope delegates expressible structured criteria to IMAP
    /// SEARCH (spec §4.6 step 1) and always fetches envelopes only; a local
    /// scope evaluates directly against the Local Mailbox Store, which is
    /// the only place fuzzy/free-text matching can run.
    pub async fn search(
        &self,
        account: &Account,
        folder: &FolderName,
        filter: &StructuredFilter,
        free_text: Option<&QueryNode>,
        scope: SearchScope,
        match_options: &MatchOptions,
    ) -> Result<Vec<Message>> {
        license::gate(OperationKind::ReadOnly, Utc::now())?;

        let mut messages = match scope {
            SearchScope::Local => self
                .lms(account)
                .list_records(folder)?
                .into_iter()
                .map(|r| r.message)
                .collect(),
            SearchScope::Live => {
                let provider = self.provider_for(account)?;
                let mut session = ImapSession::open(account, &provider).await?;
                session.select(&folder.0).await?;
                let uids = imap::search(&mut session, &filter.to_search_criteria()).await?;
                let messages = imap::fetch(&mut session, folder, &uids, FetchParts::EnvelopeAndFlags).await?;
                session.close().await?;
                messages
            }
        };

        messages.retain(|m| filter.matches(m));
        if let Some(node) = free_text {
            messages.retain(|m| evaluate(node, m, match_options));
        }

        sort_results(&mut messages);
        Ok(messages)
    }

    /// `send(account, composed-message, mode=send|draft, edit-uid?)` (spec
    /// §6, §4.5). `edit_uid`, when set with `mode=draft`, performs the
    /// append-then-expunge draft replacement (spec §4.5 "draft edit-by-UID").
    pub async fn send(
        &self,
        account: &Account,
        request: ComposeRequest,
        mode: SendMode,
        edit_uid: Option<Uid>,
        default_signature: Option<&str>,
        append_to_sent: bool,
    ) -> Result<SendOutcome> {
        license::gate(OperationKind::Mutating, Utc::now())?;

        let provider = self.provider_for(account)?;
        let outgoing: OutgoingMessage = super::compose::compose(request, account, default_signature);
        let raw = render(&outgoing)?;

        match mode {
            SendMode::Send => {
                smtp_send(account, &provider, &outgoing, &raw).await?;
                if append_to_sent {
                    self.append_to_special(account, &provider, "sent", provider.sent_folder_candidates, &raw, &[Flag::Seen])
                        .await?;
                }
                Ok(SendOutcome::Sent)
            }
            SendMode::Draft => {
                let mut session = ImapSession::open(account, &provider).await?;
                let drafts_folder =
                    imap::resolve_folder(&mut session, "drafts", provider.drafts_folder_candidates).await?;

                let new_uid = imap::append(
                    &mut session,
                    &drafts_folder,
                    &raw,
                    &[Flag::Draft],
                    &outgoing.message_id,
                )
                .await?;

                if let Some(old_uid) = edit_uid {
                    session.select(&drafts_folder).await?;
                    imap::store(&mut session, &[old_uid], StoreOp::Add, &[Flag::Deleted]).await?;
                    imap::expunge(&mut session).await?;
                }

                session.close().await?;
                Ok(SendOutcome::Drafted(new_uid))
            }
        }
    }

    async fn append_to_special(
        &self,
        account: &Account,
        provider: &Provider,
        kind: &str,
        candidates: &[&str],
        raw: &[u8],
        flags: &[Flag],
    ) -> Result<()> {
        let mut session = ImapSession::open(account, provider).await?;
        let folder = imap::resolve_folder(&mut session, kind, candidates).await?;
        imap::append(&mut session, &folder, raw, flags, "").await.ok();
        session.close().await?;
        Ok(())
    }

    /// `mark(account, uids, flag, op=add|remove)` (spec §6): applies a flag
    /// mutation on the server and mirrors it into the cached record
    /// immediately, rather than waiting for the next sync.
    pub async fn mark(
        &self,
        account: &Account,
        folder: &FolderName,
        uids: &[Uid],
        flag: Flag,
        op: StoreOp,
    ) -> Result<usize> {
        license::gate(OperationKind::Mutating, Utc::now())?;

        let provider = self.provider_for(account)?;
        let mut session = ImapSession::open(account, &provider).await?;
        session.select(&folder.0).await?;
        imap::store(&mut session, uids, op, &[flag]).await?;
        session.close().await?;

        let lms = self.lms(account);
        let mut applied = 0usize;
        for uid in uids {
            if let Some(record) = lms.read_record(folder, *uid)? {
                let mut message = record.message;
                match op {
                    StoreOp::Add => message.flags.insert(flag),
                    StoreOp::Remove => message.flags.remove(flag),
                };
                lms.write_record(&message)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// `delete(account, folder, uids, confirm=true)` (spec §6): marks
    /// `\Deleted`, EXPUNGEs, and tombstones the matching local records.
    pub async fn delete(&self, account: &Account, folder: &FolderName, uids: &[Uid]) -> Result<usize> {
        license::gate(OperationKind::Mutating, Utc::now())?;

        let lms = self.lms(account);
        let mut subjects = std::collections::HashMap::new();
        for uid in uids {
            if let Some(record) = lms.read_record(folder, *uid)? {
                subjects.insert(*uid, record.message.subject.clone());
            }
        }

        let provider = self.provider_for(account)?;
        let mut session = ImapSession::open(account, &provider).await?;
        session.select(&folder.0).await?;
        imap::store(&mut session, uids, StoreOp::Add, &[Flag::Deleted]).await?;
        let expunged = imap::expunge(&mut session).await?;
        session.close().await?;

        for uid in &expunged {
            let subject = subjects.get(uid).cloned().flatten();
            lms.tombstone(folder, *uid, subject.as_deref())?;
        }
        Ok(expunged.len())
    }

    /// `send --drafts` (spec §4.5 "Bulk draft dispatch").
    pub async fn send_drafts(
        &self,
        drafts_dir: &std::path::Path,
        account: &Account,
        default_signature: Option<&str>,
    ) -> Result<DispatchSummary> {
        license::gate(OperationKind::Mutating, Utc::now())?;

        let provider = self.provider_for(account)?;
        dispatch_drafts(drafts_dir, account, &provider, default_signature, Utc::now()).await
    }
}

impl StructuredFilter {
    /// Translates the structured subset of this filter into IMAP SEARCH
    /// criteria for a live-scope search (spec §4.6 step 1). `subject_contains`
    /// maps onto IMAP's substring `SUBJECT`; `from`/`to` likewise. Free-text
    /// and fuzzy matching have no IMAP equivalent and are always applied
    /// locally after fetch, regardless of scope.
    pub fn to_search_criteria(&self) -> imap::SearchCriteria {
        imap::SearchCriteria {
            since: self.date_range.since,
            before: self.date_range.before,
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject_contains.clone(),
            larger: self.min_size,
            smaller: self.max_size,
            require_flags: vec![],
            exclude_flags: if self.unread_only { vec![Flag::Seen] } else { vec![] },
            uid_from: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_search_criteria_maps_unread_only_to_exclude_seen() {
        let filter = StructuredFilter {
            unread_only: true,
            ..Default::default()
        };
        let criteria = filter.to_search_criteria();
        assert_eq!(criteria.exclude_flags, vec![Flag::Seen]);
    }

    #[test]
    fn to_search_criteria_maps_subject_and_from() {
        let filter = StructuredFilter {
            from: Some("alice".to_string()),
            subject_contains: Some("invoice".to_string()),
            ..Default::default()
        };
        let criteria = filter.to_search_criteria();
        assert_eq!(criteria.from.as_deref(), Some("alice"));
        assert_eq!(criteria.subject.as_deref(), Some("invoice"));
    }
}
