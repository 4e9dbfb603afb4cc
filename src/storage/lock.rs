//! Advisory per-account sync lock (spec §5): a lock file created with
//! `O_EXCL` semantics so two concurrent `sync` invocations against the same
//! account fail fast rather than interleaving writes to the Local Mailbox
//! Store.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{MssqeError, Result};

/// A held advisory lock; removes its lock file on drop.
pub struct AccountLock {
    path: PathBuf,
}

impl AccountLock {
    /// Attempts to acquire the lock for `account` under `root`
    /// (`{root}/accounts/{email}/lock`). Fails with
    /// [`MssqeError::SyncBusy`] if another process already holds it.
    pub fn acquire(root: &Path, account_email: &str) -> Result<Self> {
        let dir = root.join("accounts").join(account_email);
        fs::create_dir_all(&dir)?;
        let path = dir.join("lock");

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(MssqeError::SyncBusy(account_email.to_string()))
            }
            Err(e) => Err(MssqeError::Io(e)),
        }
    }
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = AccountLock::acquire(tmp.path(), "andrew@raggle.co").unwrap();
        assert!(tmp
            .path()
            .join("accounts/andrew@raggle.co/lock")
            .is_file());
        drop(lock);
    }

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let tmp = tempfile::tempdir().unwrap();
        let _first = AccountLock::acquire(tmp.path(), "andrew@raggle.co").unwrap();
        let second = AccountLock::acquire(tmp.path(), "andrew@raggle.co");
        assert!(matches!(second, Err(MssqeError::SyncBusy(_))));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let _lock = AccountLock::acquire(tmp.path(), "andrew@raggle.co").unwrap();
        }
        let reacquired = AccountLock::acquire(tmp.path(), "andrew@raggle.co");
        assert!(reacquired.is_ok());
    }

    #[test]
    fn different_accounts_do_not_contend() {
        let tmp = tempfile::tempdir().unwrap();
        let _a = AccountLock::acquire(tmp.path(), "andrew@raggle.co").unwrap();
        let b = AccountLock::acquire(tmp.path(), "jane@raggle.co");
        assert!(b.is_ok());
    }
}
