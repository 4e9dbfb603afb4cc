//! Account domain type.
//!
//! An [`Account`] binds a login email address to a [`Provider`](crate::providers::registry::Provider)
//! and the credential/override fields the data model calls for. App
//! passwords live here (not in a keychain) — see `config::store` for the
//! on-disk persistence and file-permission discipline.

use serde::{Deserialize, Serialize};

/// An email account configured in the local credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Email address; the unique key for this account.
    pub email: String,
    /// Key into the Provider Registry (e.g. `"gmail"`, `"fastmail"`).
    pub provider_key: String,
    /// App password, stored plaintext at rest under an owner-only file.
    pub app_password: String,
    /// Display name used on outgoing mail, if set.
    pub display_name: Option<String>,
    /// Overrides the login email as the `From` address when set.
    pub from_address: Option<String>,
    /// Local path to a profile image, if configured.
    pub profile_image_path: Option<String>,
    /// Free-form label shown in account listings.
    pub label: Option<String>,
}

impl Account {
    /// The address used for the SMTP `MAIL FROM` and the `From` header:
    /// `from_address` override, falling back to the login email.
    pub fn effective_from_address(&self) -> &str {
        self.from_address.as_deref().unwrap_or(&self.email)
    }

    /// The domain portion of the account's login email.
    pub fn domain(&self) -> Option<&str> {
        self.email.split('@').nth(1)
    }

    /// The local-part portion of the account's login email.
    pub fn local_part(&self) -> Option<&str> {
        self.email.split('@').next()
    }
}
