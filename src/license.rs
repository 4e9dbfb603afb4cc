//! License cache and gate (spec §9 "Global/singleton license manager").
//!
//! The license-server handshake itself is an external collaborator (spec §1
//! Out of scope) — this module only owns the process-wide cache of its last
//! result, the grace-period arithmetic, and the gate that blocks mutating
//! operations once both the cache and the grace window have expired.
//! Modeled as a lazily-initialized guarded static (`OnceLock<Mutex<_>>`)
//! rather than ad-hoc module state with implicit init ordering, per spec §9.

use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MssqeError, Result};

/// How long after a cache entry's `expires_at` a read-only operation may
/// still proceed without a fresh validation (spec Glossary "Grace period").
pub fn grace_period() -> Duration {
    Duration::days(3)
}

/// Whether a caller is about to mutate state or only read it — the gate
/// only blocks the former once both the cache and grace window lapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Mutating,
    ReadOnly,
}

/// The persisted shape of `license_cache.json` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseCache {
    pub key: String,
    pub validated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: LicenseStatus,
    pub customer_identity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Valid,
    Invalid,
}

fn cell() -> &'static Mutex<Option<LicenseCache>> {
    static CELL: OnceLock<Mutex<Option<LicenseCache>>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(None))
}

/// Loads `license_cache.json` from `root` into the process-wide cache, if
/// present. Called once at startup; a missing file is not an error — it
/// just means every gate check until the first successful validation
/// behaves as though no cache exists.
pub fn load(root: &std::path::Path) -> Result<()> {
    let path = root.join("license_cache.json");
    if !path.is_file() {
        return Ok(());
    }
    let raw = std::fs::read_to_string(path)?;
    let cache: LicenseCache = serde_json::from_str(&raw)?;
    *cell().lock().expect("license cache mutex poisoned") = Some(cache);
    Ok(())
}

/// Persists `cache` to `root/license_cache.json` (owner-only permissions,
/// matching the account store's discipline for the same reason: the cache
/// travels with machine-identifying `customer_identity`) and installs it as
/// the process-wide current cache.
pub fn store(root: &std::path::Path, cache: LicenseCache) -> Result<()> {
    use std::io::Write as _;
    std::fs::create_dir_all(root)?;
    let path = root.join("license_cache.json");
    let json = serde_json::to_string_pretty(&cache)?;

    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(tmp.path())?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(tmp.path(), perms)?;
    }

    tmp.persist(&path).map_err(|e| MssqeError::Io(e.error))?;
    *cell().lock().expect("license cache mutex poisoned") = Some(cache);
    Ok(())
}

/// Returns a clone of the currently cached license state, if any has been
/// loaded or stored this process.
pub fn current() -> Option<LicenseCache> {
    cell().lock().expect("license cache mutex poisoned").clone()
}

/// Checks whether `operation` may proceed given the current cache and
/// `now` (spec §7 `LicenseInvalid`: "block mutation; permit read-only
/// within grace period").
///
/// No cache at all is treated as `LicenseInvalid` for mutating operations
/// but permitted for read-only ones, mirroring the grace-period carve-out —
/// a brand-new install should not be locked out of reading a cache that was
/// never populated.
pub fn gate(operation: OperationKind, now: DateTime<Utc>) -> Result<()> {
    let cache = current();

    if let Some(c) = &cache {
        if c.status == LicenseStatus::Valid && now < c.expires_at {
            return Ok(());
        }
        if now < c.expires_at + grace_period() {
            return match operation {
                OperationKind::ReadOnly => Ok(()),
                OperationKind::Mutating => Err(MssqeError::LicenseInvalid(describe(Some(c.status)))),
            };
        }
        return Err(MssqeError::LicenseInvalid(describe(Some(c.status))));
    }

    match operation {
        OperationKind::ReadOnly => Ok(()),
        OperationKind::Mutating => Err(MssqeError::LicenseInvalid(describe(None))),
    }
}

fn describe(status: Option<LicenseStatus>) -> String {
    match status {
        Some(LicenseStatus::Valid) => "cached license expired outside grace period".to_string(),
        Some(LicenseStatus::Invalid) => "license invalid".to_string(),
        None => "no license cache present".to_string(),
    }
}
