//! Aggregate index (spec §4.3 `inbox.json`): the account-wide summary that
//! lets sync and query answer "what do we already have" without scanning
//! every per-message record file.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FolderName, MessageId, Uid, UidValidity};

fn default_schema_version() -> u32 {
    1
}

/// The account-wide index persisted as `inbox.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateIndex {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Most recent `date` header seen across every synced folder.
    pub last_email_date: Option<DateTime<Utc>>,
    /// Highest UID observed per folder, used to bound incremental
    /// `UID SEARCH` ranges.
    pub max_uid_seen: HashMap<String, u32>,
    /// UIDVALIDITY last observed per folder; a mismatch on sync invalidates
    /// that folder's cached records.
    pub uid_validity: HashMap<String, u32>,
    /// Message-ID to (folder, UID) lookup, used to resolve a draft's prior
    /// location when replacing it in-place.
    pub message_id_index: HashMap<String, (String, u32)>,
    /// Message counts per folder, for quick account summaries.
    pub counts: HashMap<String, u64>,
}

impl Default for AggregateIndex {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            last_email_date: None,
            max_uid_seen: HashMap::new(),
            uid_validity: HashMap::new(),
            message_id_index: HashMap::new(),
            counts: HashMap::new(),
        }
    }
}

impl AggregateIndex {
    pub fn max_uid(&self, folder: &FolderName) -> Option<Uid> {
        self.max_uid_seen.get(&folder.0).copied().map(Uid)
    }

    pub fn uid_validity_for(&self, folder: &FolderName) -> Option<UidValidity> {
        self.uid_validity.get(&folder.0).copied().map(UidValidity)
    }

    pub fn count_for(&self, folder: &FolderName) -> u64 {
        self.counts.get(&folder.0).copied().unwrap_or(0)
    }

    pub fn lookup_message_id(&self, id: &MessageId) -> Option<(FolderName, Uid)> {
        self.message_id_index
            .get(&id.0)
            .map(|(folder, uid)| (FolderName(folder.clone()), Uid(*uid)))
    }

    /// Records that `folder`'s UIDVALIDITY changed, discarding any
    /// previously cached max-UID watermark, message count, and Message-ID
    /// entries for it so the next sync rebuilds all three from scratch
    /// (spec §4.4 UIDVALIDITY-change handling; §4.3 invariant that the
    /// aggregate count equals the records physically present).
    pub fn invalidate_folder(&mut self, folder: &FolderName, new_validity: UidValidity) {
        self.uid_validity.insert(folder.0.clone(), new_validity.0);
        self.max_uid_seen.remove(&folder.0);
        self.counts.insert(folder.0.clone(), 0);
        self.message_id_index.retain(|_, (f, _)| f != &folder.0);
    }

    /// Folds a freshly fetched message's metadata into the index: bumps the
    /// max-UID watermark, indexes its Message-ID, advances
    /// `last_email_date`, and increments the folder count.
    pub fn record_seen(
        &mut self,
        folder: &FolderName,
        uid: Uid,
        message_id: Option<&MessageId>,
        date: DateTime<Utc>,
        is_new: bool,
    ) {
        let watermark = self.max_uid_seen.entry(folder.0.clone()).or_insert(0);
        if uid.0 > *watermark {
            *watermark = uid.0;
        }

        if let Some(id) = message_id {
            self.message_id_index
                .insert(id.0.clone(), (folder.0.clone(), uid.0));
        }

        if self.last_email_date.map(|d| date > d).unwrap_or(true) {
            self.last_email_date = Some(date);
        }

        if is_new {
            *self.counts.entry(folder.0.clone()).or_insert(0) += 1;
        }
    }

    /// Removes bookkeeping for a message that was expunged from `folder`.
    pub fn record_expunged(&mut self, folder: &FolderName, message_id: Option<&MessageId>) {
        if let Some(id) = message_id {
            self.message_id_index.remove(&id.0);
        }
        if let Some(count) = self.counts.get_mut(&folder.0) {
            *count = count.saturating_sub(1);
        }
    }
}
