//! Incremental sync algorithm (spec §4.4), orchestrating the IMAP Session
//! Manager and the Local Mailbox Store per (account, folder):
//!
//! 1. Load the aggregate record; read `LastEmailDate` and stored UIDVALIDITY.
//! 2. SELECT the folder. A UIDVALIDITY mismatch invalidates the local mirror
//!    and resets the lookback to 30 days.
//! 3. Build `SINCE (LastEmailDate + 1s)` (or a 30-day lookback on first
//!    sync).
//! 4. Fetch envelope+flags for returned UIDs, persisting any not already
//!    cached (deduped by UID, then by Message-ID).
//! 5. Fall back to a UID-range fetch when SEARCH under-reports (spec §4.4
//!    edge case: EXISTS > local count but SEARCH returned nothing).

use chrono::{Duration, Utc};

use crate::domain::FolderName;
use crate::error::Result;
use crate::providers::imap::{fetch, search, FetchParts, ImapSession, SearchCriteria};
use crate::storage::LocalMailboxStore;

/// How far back a never-before-synced folder looks (spec §4.4 step 2/3).
pub const FIRST_SYNC_LOOKBACK_DAYS: i64 = 30;

/// The outcome of syncing a single folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    /// Number of messages newly persisted to the Local Mailbox Store.
    pub fetched: usize,
}

/// Runs one incremental sync pass against `folder` on an already-open
/// `session`, updating `lms`'s per-account aggregate index and folder
/// records. Does not acquire the per-account advisory lock itself — callers
/// (the `Engine` facade) hold it for the duration of the whole sync
/// operation, potentially across several folders.
pub async fn sync_folder(
    session: &mut ImapSession,
    lms: &LocalMailboxStore,
    folder: &FolderName,
) -> Result<SyncOutcome> {
    let mut aggregate = lms.load_aggregate()?;
    let stored_validity = aggregate.uid_validity_for(folder);

    let selected = session.select(&folder.0).await?;

    if let Some(stored) = stored_validity {
        if stored != selected.uid_validity {
            lms.invalidate_folder(folder)?;
            aggregate.invalidate_folder(folder, selected.uid_validity);
        }
    } else {
        aggregate.invalidate_folder(folder, selected.uid_validity);
    }

    let since = match aggregate.last_email_date {
        Some(last) if stored_validity == Some(selected.uid_validity) => last + Duration::seconds(1),
        _ => Utc::now() - Duration::days(FIRST_SYNC_LOOKBACK_DAYS),
    };

    let mut criteria = SearchCriteria {
        since: Some(since),
        ..SearchCriteria::all()
    };

    let mut uids = search(session, &criteria).await?;

    let local_count = aggregate.count_for(folder);
    if uids.is_empty() && (selected.exists as u64) > local_count {
        let uid_from = aggregate.max_uid(folder).map(|u| u.0 + 1).unwrap_or(1);
        criteria = SearchCriteria {
            uid_from: Some(uid_from),
            ..SearchCriteria::all()
        };
        uids = search(session, &criteria).await?;
    }

    let mut fetched = 0usize;
    for uid in uids {
        if lms.read_record(folder, uid)?.is_some() {
            continue;
        }

        let messages = fetch(session, folder, &[uid], FetchParts::EnvelopeAndFlags).await?;
        let Some(message) = messages.into_iter().next() else {
            continue;
        };

        lms.write_record(&message)?;
        aggregate.record_seen(folder, uid, message.message_id.as_ref(), message.date, true);
        fetched += 1;
    }

    lms.save_aggregate(&aggregate)?;
    Ok(SyncOutcome { fetched })
}
