//! Credential/Account Store (spec §4.2): the on-disk `config.json` document,
//! atomic writes, and exact-vs-wildcard-domain account resolution.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Account;
use crate::error::{MssqeError, Result};

use super::paths::ConfigRoot;

fn default_schema_version() -> u32 {
    1
}

/// The on-disk shape of `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStoreDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Email of the account CLI commands default to when `--account` is
    /// omitted.
    pub active_account: Option<String>,
    pub accounts: Vec<StoredAccount>,
    /// Legacy single-account field kept for documents written before
    /// multi-account support; migrated into `accounts` on load, never
    /// written back out.
    #[serde(default)]
    pub legacy_email: Option<String>,
    #[serde(default)]
    pub legacy_provider: Option<String>,
    #[serde(default)]
    pub legacy_app_password: Option<String>,
}

impl Default for AccountStoreDocument {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            active_account: None,
            accounts: Vec::new(),
            legacy_email: None,
            legacy_provider: None,
            legacy_app_password: None,
        }
    }
}

/// A single account entry as stored on disk. Mirrors [`Account`] field for
/// field; kept as a distinct type so the wire format can evolve
/// independently of the in-memory domain type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    pub email: String,
    pub provider_key: String,
    pub app_password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub profile_image_path: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl From<StoredAccount> for Account {
    fn from(s: StoredAccount) -> Self {
        Account {
            email: s.email,
            provider_key: s.provider_key,
            app_password: s.app_password,
            display_name: s.display_name,
            from_address: s.from_address,
            profile_image_path: s.profile_image_path,
            label: s.label,
        }
    }
}

impl From<&Account> for StoredAccount {
    fn from(a: &Account) -> Self {
        StoredAccount {
            email: a.email.clone(),
            provider_key: a.provider_key.clone(),
            app_password: a.app_password.clone(),
            display_name: a.display_name.clone(),
            from_address: a.from_address.clone(),
            profile_image_path: a.profile_image_path.clone(),
            label: a.label.clone(),
        }
    }
}

/// Loads `root`'s `config.json`, migrating legacy single-account documents
/// in memory. Returns an empty document (not an error) when the file does
/// not exist yet, so a brand-new global root can be loaded before any
/// account has ever been added.
pub fn load(root: &ConfigRoot) -> Result<AccountStoreDocument> {
    let path = root.config_file();
    if !path.is_file() {
        return Ok(AccountStoreDocument::default());
    }

    let raw = fs::read_to_string(&path)?;
    let mut doc: AccountStoreDocument = serde_json::from_str(&raw)?;

    if let (Some(email), Some(provider_key), Some(app_password)) = (
        doc.legacy_email.take(),
        doc.legacy_provider.take(),
        doc.legacy_app_password.take(),
    ) {
        if !doc.accounts.iter().any(|a| a.email == email) {
            doc.accounts.push(StoredAccount {
                email: email.clone(),
                provider_key,
                app_password,
                display_name: None,
                from_address: None,
                profile_image_path: None,
                label: None,
            });
        }
        if doc.active_account.is_none() {
            doc.active_account = Some(email);
        }
    }

    Ok(doc)
}

/// Atomically writes `doc` to `root`'s `config.json`: write to a temp file in
/// the same directory, restrict permissions to owner-only, then rename over
/// the target so a concurrent reader never observes a partial write.
pub fn save(root: &ConfigRoot, doc: &AccountStoreDocument) -> Result<()> {
    fs::create_dir_all(&root.dir)?;
    let path = root.config_file();
    let json = serde_json::to_string_pretty(doc)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&root.dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;

    set_owner_only(tmp.path())?;

    tmp.persist(&path)
        .map_err(|e| MssqeError::Io(e.error))?;

    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

/// Resolves `selector` against `doc.accounts` (spec §4.2). `selector` is
/// either a bare account email or any address sharing an account's domain
/// (e.g. `support@raggle.co` resolves to a configured `andrew@raggle.co`).
/// An exact match always wins over a domain match; among domain matches, the
/// first account in declaration order wins. A `*@domain` selector is also
/// accepted as an explicit spelling of the same domain match.
pub fn resolve<'a>(doc: &'a AccountStoreDocument, selector: &str) -> Result<&'a StoredAccount> {
    if let Some(exact) = doc.accounts.iter().find(|a| a.email == selector) {
        return Ok(exact);
    }

    let domain = selector.strip_prefix("*@").or_else(|| selector.split('@').nth(1));
    if let Some(domain) = domain {
        if let Some(matched) = doc
            .accounts
            .iter()
            .find(|a| a.email.split('@').nth(1) == Some(domain))
        {
            return Ok(matched);
        }
    }

    Err(MssqeError::NoMatchingAccount(selector.to_string()))
}

/// Returns the active account, or the sole configured account when exactly
/// one exists and none is marked active.
pub fn active<'a>(doc: &'a AccountStoreDocument) -> Result<&'a StoredAccount> {
    if let Some(email) = &doc.active_account {
        return resolve(doc, email);
    }
    match doc.accounts.as_slice() {
        [only] => Ok(only),
        [] => Err(MssqeError::NoConfig),
        _ => Err(MssqeError::NoMatchingAccount(
            "multiple accounts configured and none is active".to_string(),
        )),
    }
}

/// Sets `email` as the active account, failing if it is not configured.
pub fn activate(doc: &mut AccountStoreDocument, email: &str) -> Result<()> {
    resolve(doc, email)?;
    doc.active_account = Some(email.to_string());
    Ok(())
}

/// Inserts or replaces the account with the same email.
pub fn upsert(doc: &mut AccountStoreDocument, account: &Account) {
    let stored = StoredAccount::from(account);
    if let Some(existing) = doc.accounts.iter_mut().find(|a| a.email == account.email) {
        *existing = stored;
    } else {
        doc.accounts.push(stored);
    }
    if doc.active_account.is_none() {
        doc.active_account = Some(account.email.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::Tier;

    fn sample_stored(email: &str) -> StoredAccount {
        StoredAccount {
            email: email.to_string(),
            provider_key: "fastmail".to_string(),
            app_password: "secret".to_string(),
            display_name: None,
            from_address: None,
            profile_image_path: None,
            label: None,
        }
    }

    fn root(tmp: &Path) -> ConfigRoot {
        ConfigRoot {
            dir: tmp.to_path_buf(),
            tier: Tier::Global,
        }
    }

    #[test]
    fn load_missing_file_returns_empty_document() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = load(&root(tmp.path())).unwrap();
        assert!(doc.accounts.is_empty());
        assert!(doc.active_account.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let r = root(tmp.path());
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));
        doc.active_account = Some("andrew@raggle.co".to_string());

        save(&r, &doc).unwrap();
        let loaded = load(&r).unwrap();
        assert_eq!(loaded.accounts.len(), 1);
        assert_eq!(loaded.active_account.as_deref(), Some("andrew@raggle.co"));
    }

    #[test]
    fn save_sets_owner_only_permissions() {
        let tmp = tempfile::tempdir().unwrap();
        let r = root(tmp.path());
        save(&r, &AccountStoreDocument::default()).unwrap();

        #[cfg(unix)]
        {
            let mode = fs::metadata(r.config_file()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn resolve_prefers_exact_match_over_wildcard() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));
        doc.accounts.push(sample_stored("other@raggle.co"));

        let resolved = resolve(&doc, "andrew@raggle.co").unwrap();
        assert_eq!(resolved.email, "andrew@raggle.co");
    }

    #[test]
    fn resolve_wildcard_matches_domain() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));

        let resolved = resolve(&doc, "*@raggle.co").unwrap();
        assert_eq!(resolved.email, "andrew@raggle.co");
    }

    #[test]
    fn resolve_plain_address_wildcard_aliases_by_domain() {
        // spec.md §4.2: support@raggle.co resolves to configured andrew@raggle.co.
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));

        let resolved = resolve(&doc, "support@raggle.co").unwrap();
        assert_eq!(resolved.email, "andrew@raggle.co");
    }

    #[test]
    fn resolve_plain_address_different_domain_does_not_match() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));

        let err = resolve(&doc, "support@other.co").unwrap_err();
        assert!(matches!(err, MssqeError::NoMatchingAccount(_)));
    }

    #[test]
    fn resolve_unknown_selector_errors() {
        let doc = AccountStoreDocument::default();
        let err = resolve(&doc, "nobody@example.com").unwrap_err();
        assert!(matches!(err, MssqeError::NoMatchingAccount(_)));
    }

    #[test]
    fn active_falls_back_to_sole_account() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));
        let acct = active(&doc).unwrap();
        assert_eq!(acct.email, "andrew@raggle.co");
    }

    #[test]
    fn active_errors_when_multiple_accounts_and_none_active() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));
        doc.accounts.push(sample_stored("jane@raggle.co"));
        let err = active(&doc).unwrap_err();
        assert!(matches!(err, MssqeError::NoMatchingAccount(_)));
    }

    #[test]
    fn legacy_document_migrates_into_accounts() {
        let tmp = tempfile::tempdir().unwrap();
        let r = root(tmp.path());
        fs::create_dir_all(&r.dir).unwrap();
        fs::write(
            r.config_file(),
            r#"{"schema_version":1,"active_account":null,"accounts":[],"legacy_email":"old@raggle.co","legacy_provider":"gmail","legacy_app_password":"pw"}"#,
        )
        .unwrap();

        let doc = load(&r).unwrap();
        assert_eq!(doc.accounts.len(), 1);
        assert_eq!(doc.accounts[0].email, "old@raggle.co");
        assert_eq!(doc.active_account.as_deref(), Some("old@raggle.co"));
    }

    #[test]
    fn upsert_replaces_existing_account() {
        let mut doc = AccountStoreDocument::default();
        doc.accounts.push(sample_stored("andrew@raggle.co"));

        let updated = Account {
            email: "andrew@raggle.co".to_string(),
            provider_key: "gmail".to_string(),
            app_password: "newpw".to_string(),
            display_name: None,
            from_address: None,
            profile_image_path: None,
            label: None,
        };
        upsert(&mut doc, &updated);

        assert_eq!(doc.accounts.len(), 1);
        assert_eq!(doc.accounts[0].provider_key, "gmail");
    }
}
