//! Connection, TLS negotiation, and login (spec §4.4 `open`/`select`/`close`).
//!
//! The TLS dial sequence is grounded in the teacher's
//! `providers/email/imap.rs::connect_tls`: a plain `TcpStream`, wrapped in
//! `tokio_rustls` with `webpki_roots` as the trust store, then bridged into
//! `async-imap`'s futures-based `Session` via `tokio_util::compat`.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::domain::{Account, UidValidity};
use crate::error::{MssqeError, Result};
use crate::providers::Provider;

/// The result of a successful SELECT (spec §4.4 `select`).
#[derive(Debug, Clone, Copy)]
pub struct Selected {
    /// Number of messages in the folder (IMAP `EXISTS`).
    pub exists: u32,
    /// The folder's current UIDVALIDITY.
    pub uid_validity: UidValidity,
    /// Number of messages IMAP reports as `RECENT`.
    pub recent: u32,
}

type InnerSession = async_imap::Session<Compat<TlsStream<TcpStream>>>;

/// An owned IMAP session: dialed, authenticated, and released on every exit
/// path (spec §9 "stateful IMAP session as an owned resource"). The happy
/// path calls [`ImapSession::close`] and marks itself closed; if a caller
/// drops the session without closing it (an error path, a panic unwind), the
/// `Drop` impl spawns a best-effort detached LOGOUT rather than leaking the
/// TCP connection.
pub struct ImapSession {
    inner: Option<InnerSession>,
    closed: bool,
}

impl ImapSession {
    /// Dials `provider`'s IMAP host, negotiates TLS, and logs in with the
    /// account's app password.
    ///
    /// # Errors
    /// [`MssqeError::ConnectError`] on TCP/TLS failure, [`MssqeError::AuthError`]
    /// on a rejected login (final; the caller must not retry).
    pub async fn open(account: &Account, provider: &Provider) -> Result<Self> {
        let tcp = TcpStream::connect((provider.imap_host, provider.imap_port))
            .await
            .map_err(|e| MssqeError::ConnectError(format!("TCP connect failed: {e}")))?;

        let tls_config = ClientConfig::builder()
            .with_root_certificates(tokio_rustls::rustls::RootCertStore::from_iter(
                webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
            ))
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = ServerName::try_from(provider.imap_host.to_string())
            .map_err(|e| MssqeError::ConnectError(format!("invalid server name: {e}")))?;

        let tls_stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| MssqeError::ConnectError(format!("TLS handshake failed: {e}")))?;

        let client = async_imap::Client::new(tls_stream.compat());

        let session = client
            .login(&account.email, &account.app_password)
            .await
            .map_err(|(e, _client)| MssqeError::AuthError(format!("IMAP login failed: {e}")))?;

        Ok(Self {
            inner: Some(session),
            closed: false,
        })
    }

    /// SELECTs `folder`, returning its exists count, UIDVALIDITY, and recent
    /// count. Does not retry alternative names itself — see
    /// `providers::registry::resolve_special_folder` for Drafts/Sent
    /// fallback resolution, which selects the first candidate that succeeds.
    pub async fn select(&mut self, folder: &str) -> Result<Selected> {
        let session = self.session_mut()?;
        let mailbox = session
            .select(folder)
            .await
            .map_err(|e| MssqeError::ProtocolError(format!("SELECT {folder} failed: {e}")))?;

        Ok(Selected {
            exists: mailbox.exists,
            uid_validity: UidValidity(mailbox.uid_validity.unwrap_or(0)),
            recent: mailbox.recent,
        })
    }

    /// Attempts to SELECT `folder` without surfacing the underlying error;
    /// used by folder-candidate resolution.
    pub async fn try_select(&mut self, folder: &str) -> bool {
        self.select(folder).await.is_ok()
    }

    /// LOGOUTs and tears the session down cleanly (spec §4.4 `close`).
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut session) = self.inner.take() {
            session
                .logout()
                .await
                .map_err(|e| MssqeError::ProtocolError(format!("LOGOUT failed: {e}")))?;
        }
        self.closed = true;
        Ok(())
    }

    pub(super) fn session_mut(&mut self) -> Result<&mut InnerSession> {
        self.inner
            .as_mut()
            .ok_or_else(|| MssqeError::ProtocolError("session already closed".to_string()))
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut session) = self.inner.take() {
            tokio::spawn(async move {
                let _ = session.logout().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_carries_uid_validity() {
        let selected = Selected {
            exists: 5,
            uid_validity: UidValidity(42),
            recent: 1,
        };
        assert_eq!(selected.uid_validity, UidValidity(42));
        assert_eq!(selected.exists, 5);
    }
}
