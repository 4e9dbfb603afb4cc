//! Cross-module integration tests: the Local Mailbox Store, Query Engine,
//! Credential Store, and advisory sync lock composed the way `Engine`
//! composes them, without a live IMAP/SMTP server. Each module's own
//! `#[cfg(test)]` block covers its unit-level behavior; these tests cover
//! the seams between modules (spec §8 "Concrete scenarios").

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use driftbox::config::{self, store, AccountStoreDocument, StoredAccount};
use driftbox::domain::{Account, Address, Flag, FolderName, Message, Uid};
use driftbox::query::{evaluate, parse, sort_results, MatchOptions, StructuredFilter};
use driftbox::services::{parse_draft_file, DraftFrontmatter};
use driftbox::storage::{AccountLock, LocalMailboxStore};

fn sample_account() -> Account {
    Account {
        email: "andrew@raggle.co".to_string(),
        provider_key: "fastmail".to_string(),
        app_password: "app-secret".to_string(),
        display_name: Some("Andrew".to_string()),
        from_address: None,
        profile_image_path: None,
        label: None,
    }
}

fn message(uid: u32, from: &str, subject: &str, days_ago: i64) -> Message {
    Message {
        uid: Uid(uid),
        folder: FolderName::inbox(),
        message_id: None,
        from: Address::new(from),
        to: vec![Address::new("andrew@raggle.co")],
        cc: vec![],
        bcc: vec![],
        subject: Some(subject.to_string()),
        date: Utc::now() - Duration::days(days_ago),
        body_text: Some("body".to_string()),
        body_html: None,
        flags: driftbox::domain::Flags::new(),
        attachments: vec![],
        size: 512,
    }
}

// ----------------------------------------------------------------------
// Credential store: two-tier round trip and account resolution
// ----------------------------------------------------------------------

#[test]
fn account_store_round_trips_through_save_and_load() {
    let tmp = tempfile::tempdir().unwrap();
    let root = config::paths::resolve(tmp.path()).unwrap();

    let mut doc = store::load(&root).unwrap();
    assert!(doc.accounts.is_empty());

    let account = sample_account();
    store::upsert(&mut doc, &account);
    store::activate(&mut doc, &account.email).unwrap();
    store::save(&root, &doc).unwrap();

    let reloaded = store::load(&root).unwrap();
    let active = store::active(&reloaded).unwrap();
    assert_eq!(active.email, "andrew@raggle.co");
    assert_eq!(active.provider_key, "fastmail");
}

#[test]
fn resolve_falls_back_to_wildcard_domain_account() {
    let mut doc = AccountStoreDocument::default();
    doc.accounts.push(StoredAccount {
        email: "*@raggle.co".to_string(),
        provider_key: "fastmail".to_string(),
        app_password: "shared-secret".to_string(),
        display_name: None,
        from_address: None,
        profile_image_path: None,
        label: None,
    });

    let resolved = store::resolve(&doc, "new-hire@raggle.co").unwrap();
    assert_eq!(resolved.provider_key, "fastmail");
}

#[test]
fn resolve_reports_no_matching_account() {
    let doc = AccountStoreDocument::default();
    let err = store::resolve(&doc, "nobody@nowhere.test").unwrap_err();
    assert!(matches!(err, driftbox::MssqeError::NoMatchingAccount(_)));
}

// ----------------------------------------------------------------------
// Local Mailbox Store + Query Engine: write, filter, fuzzy match, sort
// ----------------------------------------------------------------------

#[test]
fn search_combines_structured_filter_and_free_text_fuzzy_match() {
    let tmp = tempfile::tempdir().unwrap();
    let lms = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

    lms.write_record(&message(1, "alice@acme.com", "Quarterly invoice", 1))
        .unwrap();
    lms.write_record(&message(2, "bob@acme.com", "Lunch plans", 2))
        .unwrap();
    lms.write_record(&message(3, "alice@acme.com", "Invocie correction", 10))
        .unwrap();

    let filter = StructuredFilter {
        from: Some("alice".to_string()),
        ..StructuredFilter::default()
    };

    let query = parse("invoice").unwrap();
    let options = MatchOptions::default();

    let mut results: Vec<Message> = lms
        .list_records(&FolderName::inbox())
        .unwrap()
        .into_iter()
        .map(|r| r.message)
        .filter(|m| filter.matches(m))
        .filter(|m| evaluate(&query, m, &options))
        .collect();

    sort_results(&mut results);

    let uids: Vec<u32> = results.iter().map(|m| m.uid.0).collect();
    assert_eq!(uids, vec![1, 3]);
}

#[test]
fn search_respects_unread_only_filter() {
    let tmp = tempfile::tempdir().unwrap();
    let lms = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

    let mut read = message(1, "a@b.com", "Seen already", 1);
    read.flags.insert(Flag::Seen);
    lms.write_record(&read).unwrap();
    lms.write_record(&message(2, "a@b.com", "Still unread", 1)).unwrap();

    let filter = StructuredFilter {
        unread_only: true,
        ..StructuredFilter::default()
    };

    let results: Vec<Message> = lms
        .list_records(&FolderName::inbox())
        .unwrap()
        .into_iter()
        .map(|r| r.message)
        .filter(|m| filter.matches(m))
        .collect();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].uid, Uid(2));
}

#[test]
fn tombstoned_messages_drop_out_of_subsequent_listings() {
    let tmp = tempfile::tempdir().unwrap();
    let lms = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");

    lms.write_record(&message(1, "a@b.com", "Keep", 1)).unwrap();
    lms.write_record(&message(2, "a@b.com", "Expunge me", 1)).unwrap();

    lms.tombstone(&FolderName::inbox(), Uid(2), Some("Expunge me")).unwrap();

    let remaining: Vec<u32> = lms
        .list_records(&FolderName::inbox())
        .unwrap()
        .into_iter()
        .map(|r| r.message.uid.0)
        .collect();
    assert_eq!(remaining, vec![1]);
}

// ----------------------------------------------------------------------
// Advisory sync lock alongside the mailbox store
// ----------------------------------------------------------------------

#[test]
fn concurrent_sync_attempts_on_the_same_account_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let lms = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
    lms.write_record(&message(1, "a@b.com", "Existing", 1)).unwrap();

    let _held = AccountLock::acquire(tmp.path(), "andrew@raggle.co").unwrap();
    let second = AccountLock::acquire(tmp.path(), "andrew@raggle.co");
    assert!(matches!(second, Err(driftbox::MssqeError::SyncBusy(_))));

    // The mailbox store itself is unaffected by lock contention — it has
    // no notion of locking, only the sync path that calls it does.
    assert_eq!(lms.list_records(&FolderName::inbox()).unwrap().len(), 1);
}

// ----------------------------------------------------------------------
// Draft file parsing (spec §6 draft file format)
// ----------------------------------------------------------------------

#[test]
fn parse_draft_file_splits_frontmatter_and_body() {
    let raw = "---\nto: alice@acme.com\ncc: [bob@acme.com]\nsubject: Status update\n---\nHi Alice,\n\nHere's the update.\n";

    let parsed = parse_draft_file(raw).unwrap();
    let DraftFrontmatter { to, cc, subject, .. } = parsed.frontmatter;

    assert_eq!(to, "alice@acme.com");
    assert_eq!(cc, vec!["bob@acme.com".to_string()]);
    assert_eq!(subject, "Status update");
    assert!(parsed.body_markdown.contains("Here's the update."));
}

#[test]
fn parse_draft_file_rejects_missing_frontmatter_delimiter() {
    let raw = "to: alice@acme.com\nsubject: No delimiter\n\nBody text";
    assert!(parse_draft_file(raw).is_err());
}

// ----------------------------------------------------------------------
// Fuzzy typo match (spec §8 concrete scenario 3)
// ----------------------------------------------------------------------

#[test]
fn fuzzy_from_query_matches_a_one_letter_typo() {
    let tmp = tempfile::tempdir().unwrap();
    let lms = LocalMailboxStore::new(tmp.path(), "andrew@raggle.co");
    lms.write_record(&message(1, "support@acme.com", "Your ticket", 1))
        .unwrap();

    let fuzzy_query = parse("from:supprt").unwrap();
    let exact_options = MatchOptions {
        fuzzy: false,
        ..MatchOptions::default()
    };

    let records: Vec<Message> = lms
        .list_records(&FolderName::inbox())
        .unwrap()
        .into_iter()
        .map(|r| r.message)
        .collect();

    let fuzzy_hits = records.iter().filter(|m| evaluate(&fuzzy_query, m, &MatchOptions::default())).count();
    let exact_hits = records.iter().filter(|m| evaluate(&fuzzy_query, m, &exact_options)).count();

    assert_eq!(fuzzy_hits, 1);
    assert_eq!(exact_hits, 0);
}
