//! Local Mailbox Store facade (spec §4.3): the on-disk mirror of an
//! account's folders, tying together record files, the aggregate index, and
//! attachment sidecars under one root.
//!
//! Layout: `{root}/accounts/{email}/{folder}/{uid}-{slug}.json`, attachment
//! sidecars beside their record, and `{root}/accounts/{email}/inbox.json`
//! for the [`AggregateIndex`].

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::domain::{FolderName, Message, Uid};
use crate::error::Result;

use super::aggregate::AggregateIndex;
use super::record::{self, MessageRecord};

/// The on-disk mirror for a single account.
pub struct LocalMailboxStore {
    root: PathBuf,
    account_email: String,
}

impl LocalMailboxStore {
    pub fn new(root: impl Into<PathBuf>, account_email: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            account_email: account_email.into(),
        }
    }

    pub fn account_dir(&self) -> PathBuf {
        self.root.join("accounts").join(&self.account_email)
    }

    pub fn folder_dir(&self, folder: &FolderName) -> PathBuf {
        self.account_dir().join(sanitize_folder(&folder.0))
    }

    fn removed_dir(&self, folder: &FolderName) -> PathBuf {
        self.folder_dir(folder).join(".removed")
    }

    fn aggregate_path(&self) -> PathBuf {
        self.account_dir().join("inbox.json")
    }

    /// Loads the aggregate index, returning a fresh default one if this
    /// account has never synced before.
    pub fn load_aggregate(&self) -> Result<AggregateIndex> {
        let path = self.aggregate_path();
        if !path.is_file() {
            return Ok(AggregateIndex::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Atomically persists the aggregate index.
    pub fn save_aggregate(&self, index: &AggregateIndex) -> Result<()> {
        let dir = self.account_dir();
        fs::create_dir_all(&dir)?;
        atomic_write(&dir, &self.aggregate_path(), &serde_json::to_string_pretty(index)?)
    }

    /// Writes a message's record file, splitting out-of-line any attachment
    /// over the inline threshold into a sibling payload file.
    pub fn write_record(&self, message: &Message) -> Result<()> {
        let dir = self.folder_dir(&message.folder);
        fs::create_dir_all(&dir)?;

        let mut message = message.clone();
        for (index, attachment) in message.attachments.iter_mut().enumerate() {
            if record::should_inline(attachment) {
                continue;
            }
            if let Some(data) = attachment.inline_data.take() {
                let filename = record::attachment_filename(message.uid.0, index, attachment);
                write_binary(&dir, &filename, &data)?;
                attachment.payload_path = Some(filename);
            }
        }

        let filename = record::record_filename(message.uid.0, message.subject.as_deref());
        let record = MessageRecord::new(message);
        let json = serde_json::to_string_pretty(&record)?;
        atomic_write(&dir, &dir.join(&filename), &json)
    }

    /// Reads every record currently stored for `folder`, in UID order
    /// (guaranteed by the zero-padded filenames).
    pub fn list_records(&self, folder: &FolderName) -> Result<Vec<MessageRecord>> {
        let dir = self.folder_dir(folder);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut filenames: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        filenames.sort();

        let mut records = Vec::with_capacity(filenames.len());
        for path in filenames {
            let raw = fs::read_to_string(path)?;
            records.push(serde_json::from_str(&raw)?);
        }
        Ok(records)
    }

    /// Reads a single record by UID, returning `None` if it is not cached
    /// locally.
    pub fn read_record(&self, folder: &FolderName, uid: Uid) -> Result<Option<MessageRecord>> {
        Ok(self
            .list_records(folder)?
            .into_iter()
            .find(|r| r.message.uid == uid))
    }

    /// Removes `uid`'s record from `folder` on the server's behalf
    /// (expunge). Rather than deleting outright, the record is moved to a
    /// `.removed` sidecar directory so a mistaken expunge can still be
    /// recovered from the local mirror; see `DESIGN.md` for the rationale.
    pub fn tombstone(&self, folder: &FolderName, uid: Uid, subject: Option<&str>) -> Result<()> {
        let dir = self.folder_dir(folder);
        let filename = record::record_filename(uid.0, subject);
        let src = dir.join(&filename);
        if !src.is_file() {
            return Ok(());
        }

        let removed = self.removed_dir(folder);
        fs::create_dir_all(&removed)?;
        fs::rename(src, removed.join(filename))?;
        Ok(())
    }

    /// Invalidates every cached record for `folder`: moves the whole folder
    /// directory's record files aside under `.removed` so the next sync
    /// performs a clean refetch (spec §4.4 UIDVALIDITY-change handling).
    pub fn invalidate_folder(&self, folder: &FolderName) -> Result<()> {
        let dir = self.folder_dir(folder);
        if !dir.is_dir() {
            return Ok(());
        }
        let removed = self.removed_dir(folder);
        fs::create_dir_all(&removed)?;
        for entry in fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(name) = path.file_name() {
                    fs::rename(&path, removed.join(name))?;
                }
            }
        }
        Ok(())
    }
}

fn sanitize_folder(folder: &str) -> String {
    folder.replace('/', "__")
}

fn atomic_write(dir: &Path, target: &Path, contents: &str) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(target)
        .map_err(|e| crate::error::MssqeError::Io(e.error))?;
    Ok(())
}

fn write_binary(dir: &Path, filename: &str, data: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(dir.join(filename))
        .map_err(|e| crate::error::MssqeError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Flags};
    use chrono::Utc;

    fn sample_message(uid: u32) -> Message {
        Message {
            uid: Uid(uid),
            folder: FolderName::inbox(),
            message_id: None,
            from: Address::new("a@b.com"),
            to: vec![Address::new("c@d.com")],
            cc: vec![],
            bcc: vec![],
            subject: Some("Hello".to_string()),
            date: Utc::now(),
            body_text: Some("hi".to_string()),
            body_html: None,
            flags: Flags::new(),
            attachments: vec![],
            size: 32,
        }
    }

    #[test]
    fn write_then_read_record_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

        let msg = sample_message(10);
        store.write_record(&msg).unwrap();

        let read = store.read_record(&FolderName::inbox(), Uid(10)).unwrap();
        assert!(read.is_some());
        assert_eq!(read.unwrap().message.subject.as_deref(), Some("Hello"));
    }

    #[test]
    fn list_records_is_sorted_by_uid() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

        store.write_record(&sample_message(30)).unwrap();
        store.write_record(&sample_message(5)).unwrap();
        store.write_record(&sample_message(100)).unwrap();

        let records = store.list_records(&FolderName::inbox()).unwrap();
        let uids: Vec<u32> = records.iter().map(|r| r.message.uid.0).collect();
        assert_eq!(uids, vec![5, 30, 100]);
    }

    #[test]
    fn aggregate_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

        let mut idx = AggregateIndex::default();
        idx.max_uid_seen.insert("INBOX".to_string(), 42);
        store.save_aggregate(&idx).unwrap();

        let loaded = store.load_aggregate().unwrap();
        assert_eq!(loaded.max_uid_seen.get("INBOX"), Some(&42));
    }

    #[test]
    fn load_aggregate_defaults_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
        let idx = store.load_aggregate().unwrap();
        assert!(idx.max_uid_seen.is_empty());
    }

    #[test]
    fn tombstone_moves_record_out_of_active_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
        store.write_record(&sample_message(1)).unwrap();

        store
            .tombstone(&FolderName::inbox(), Uid(1), Some("Hello"))
            .unwrap();

        assert!(store
            .read_record(&FolderName::inbox(), Uid(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn invalidate_folder_clears_all_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
        store.write_record(&sample_message(1)).unwrap();
        store.write_record(&sample_message(2)).unwrap();

        store.invalidate_folder(&FolderName::inbox()).unwrap();

        assert!(store.list_records(&FolderName::inbox()).unwrap().is_empty());
    }

    #[test]
    fn folder_names_with_slashes_are_sanitized_to_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
        let folder = FolderName::from("[Gmail]/Sent Mail");
        let mut msg = sample_message(1);
        msg.folder = folder.clone();
        store.write_record(&msg).unwrap();

        assert!(store.folder_dir(&folder).is_dir());
    }
}
