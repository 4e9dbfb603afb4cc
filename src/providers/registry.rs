//! Provider Registry (spec §4.1): a static table of supported mail providers.
//!
//! The registry is bundled with the binary, not configuration-loaded — the
//! set of providers this client understands changes with a release, not a
//! user's config file. Grounded in `pimalaya-himalaya`'s fixed, string-keyed
//! account-config table: one `Vec<Provider>` built once and looked up by key.

use std::sync::OnceLock;

use crate::error::{MssqeError, Result};

/// A supported mail provider's connection and folder-naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Stable identifier, e.g. `"gmail"`. Used as the `Account::provider_key`.
    pub key: &'static str,
    /// Human-readable name, e.g. `"Gmail"`.
    pub display_name: &'static str,
    /// IMAP host.
    pub imap_host: &'static str,
    /// IMAP port (993 for implicit TLS everywhere in this registry).
    pub imap_port: u16,
    /// SMTP host.
    pub smtp_host: &'static str,
    /// SMTP port (587 STARTTLS or 465 implicit TLS).
    pub smtp_port: u16,
    /// Whether `smtp_port` expects implicit TLS (true) or STARTTLS (false).
    pub smtp_implicit_tls: bool,
    /// Candidate Drafts-folder names, tried in order.
    pub drafts_folder_candidates: &'static [&'static str],
    /// Candidate Sent-folder names, tried in order.
    pub sent_folder_candidates: &'static [&'static str],
    /// Candidate Trash-folder names, tried in order.
    pub trash_folder_candidates: &'static [&'static str],
    /// URL documenting how to mint an app password for this provider.
    pub app_password_url: &'static str,
}

fn providers() -> &'static Vec<Provider> {
    static TABLE: OnceLock<Vec<Provider>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            Provider {
                key: "gmail",
                display_name: "Gmail",
                imap_host: "imap.gmail.com",
                imap_port: 993,
                smtp_host: "smtp.gmail.com",
                smtp_port: 587,
                smtp_implicit_tls: false,
                drafts_folder_candidates: &["[Gmail]/Drafts", "Drafts"],
                sent_folder_candidates: &["[Gmail]/Sent Mail", "Sent"],
                trash_folder_candidates: &["[Gmail]/Trash", "Trash"],
                app_password_url: "https://myaccount.google.com/apppasswords",
            },
            Provider {
                key: "fastmail",
                display_name: "Fastmail",
                imap_host: "imap.fastmail.com",
                imap_port: 993,
                smtp_host: "smtp.fastmail.com",
                smtp_port: 587,
                smtp_implicit_tls: false,
                drafts_folder_candidates: &["Drafts"],
                sent_folder_candidates: &["Sent"],
                trash_folder_candidates: &["Trash"],
                app_password_url: "https://www.fastmail.com/settings/security/apppasswords",
            },
            Provider {
                key: "outlook",
                display_name: "Outlook",
                imap_host: "outlook.office365.com",
                imap_port: 993,
                smtp_host: "smtp.office365.com",
                smtp_port: 587,
                smtp_implicit_tls: false,
                drafts_folder_candidates: &["Drafts"],
                sent_folder_candidates: &["Sent Items", "Sent"],
                trash_folder_candidates: &["Deleted Items", "Trash"],
                app_password_url: "https://account.microsoft.com/security",
            },
            Provider {
                key: "yahoo",
                display_name: "Yahoo",
                imap_host: "imap.mail.yahoo.com",
                imap_port: 993,
                smtp_host: "smtp.mail.yahoo.com",
                smtp_port: 587,
                smtp_implicit_tls: false,
                drafts_folder_candidates: &["Draft", "Drafts"],
                sent_folder_candidates: &["Sent"],
                trash_folder_candidates: &["Trash"],
                app_password_url: "https://login.yahoo.com/account/security",
            },
            Provider {
                key: "zoho",
                display_name: "Zoho Mail",
                imap_host: "imap.zoho.com",
                imap_port: 993,
                smtp_host: "smtp.zoho.com",
                smtp_port: 465,
                smtp_implicit_tls: true,
                drafts_folder_candidates: &["Drafts"],
                sent_folder_candidates: &["Sent"],
                trash_folder_candidates: &["Trash"],
                app_password_url: "https://accounts.zoho.com/home#security/security_pwd",
            },
        ]
    })
}

/// Looks up a provider by its stable key.
///
/// # Errors
/// Returns [`MssqeError::UnknownProvider`] when `key` is not in the registry.
pub fn lookup(key: &str) -> Result<Provider> {
    providers()
        .iter()
        .find(|p| p.key == key)
        .cloned()
        .ok_or_else(|| MssqeError::UnknownProvider(key.to_string()))
}

/// Returns every registered provider, in the order they were defined.
pub fn list() -> Vec<Provider> {
    providers().clone()
}

/// A live IMAP session capable of attempting a SELECT, for folder resolution.
///
/// Kept narrow on purpose: [`resolve_special_folder`] only needs to ask "can
/// this name be selected", so callers pass a small closure/trait object
/// rather than the full session type, keeping this module free of a
/// dependency on `providers::imap`.
pub trait FolderProbe {
    /// Attempts to SELECT `folder`, returning whether it succeeded.
    fn try_select(&mut self, folder: &str) -> bool;
}

/// Resolves a provider's special-folder candidates against a live session,
/// trying each name in order and returning the first one the server accepts.
///
/// Shared by Drafts-folder resolution (spec §4.1) and Sent-folder resolution
/// (spec §4.5 "optionally APPENDed to the Sent folder") — one generic
/// function, not two copies, per `SPEC_FULL.md` §4.1. `kind` (e.g.
/// `"drafts"`, `"sent"`) names which special folder is being resolved, so a
/// missing Sent folder isn't reported to the caller as a missing Drafts one.
pub fn resolve_special_folder(
    kind: &str,
    candidates: &[&str],
    probe: &mut impl FolderProbe,
) -> Result<String> {
    for candidate in candidates {
        if probe.try_select(candidate) {
            return Ok((*candidate).to_string());
        }
    }
    Err(MssqeError::NoDraftsFolder {
        kind: kind.to_string(),
        candidates: candidates.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_provider() {
        let gmail = lookup("gmail").unwrap();
        assert_eq!(gmail.display_name, "Gmail");
        assert_eq!(gmail.imap_host, "imap.gmail.com");
    }

    #[test]
    fn lookup_unknown_provider_errors() {
        let err = lookup("aol").unwrap_err();
        assert!(matches!(err, MssqeError::UnknownProvider(k) if k == "aol"));
    }

    #[test]
    fn list_returns_all_five_providers() {
        let keys: Vec<_> = list().into_iter().map(|p| p.key).collect();
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&"gmail"));
        assert!(keys.contains(&"fastmail"));
        assert!(keys.contains(&"outlook"));
        assert!(keys.contains(&"yahoo"));
        assert!(keys.contains(&"zoho"));
    }

    struct StubProbe {
        selectable: Vec<&'static str>,
    }

    impl FolderProbe for StubProbe {
        fn try_select(&mut self, folder: &str) -> bool {
            self.selectable.contains(&folder)
        }
    }

    #[test]
    fn resolve_special_folder_picks_first_match() {
        let gmail = lookup("gmail").unwrap();
        let mut probe = StubProbe {
            selectable: vec!["Drafts"],
        };
        let resolved =
            resolve_special_folder("drafts", gmail.drafts_folder_candidates, &mut probe).unwrap();
        assert_eq!(resolved, "Drafts");
    }

    #[test]
    fn resolve_special_folder_fails_when_no_candidate_selectable() {
        let gmail = lookup("gmail").unwrap();
        let mut probe = StubProbe { selectable: vec![] };
        let err = resolve_special_folder("drafts", gmail.drafts_folder_candidates, &mut probe).unwrap_err();
        assert!(matches!(err, MssqeError::NoDraftsFolder { ref kind, .. } if kind == "drafts"));
    }

    #[test]
    fn resolve_special_folder_reports_sent_kind_not_drafts() {
        let gmail = lookup("gmail").unwrap();
        let mut probe = StubProbe { selectable: vec![] };
        let err = resolve_special_folder("sent", gmail.sent_folder_candidates, &mut probe).unwrap_err();
        match err {
            MssqeError::NoDraftsFolder { kind, .. } => assert_eq!(kind, "sent"),
            other => panic!("expected NoDraftsFolder{{kind: \"sent\"}}, got {other:?}"),
        }
    }
}
