//! Resolves the two-tier config root (spec §4.2): a project-local `./.email`
//! directory overrides the user's global `~/.email`, mirroring the
//! local-overrides-global convention used throughout the pack for
//! per-project settings layered over user defaults.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{MssqeError, Result};

const CONFIG_DIRNAME: &str = ".email";
const CONFIG_FILENAME: &str = "config.json";

/// Which tier a config root was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Global,
}

/// A resolved config root: its directory and which tier it came from.
#[derive(Debug, Clone)]
pub struct ConfigRoot {
    pub dir: PathBuf,
    pub tier: Tier,
}

impl ConfigRoot {
    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILENAME)
    }
}

/// Resolves the config root starting the local-directory search from
/// `start`. A local `./.email/config.json` under `start` (or any ancestor,
/// matching how the pack's project-local config discovery walks upward)
/// wins over the global directory; when neither exists, the global
/// directory is returned so a first-run `save` has somewhere to land.
pub fn resolve(start: &Path) -> Result<ConfigRoot> {
    if let Some(local) = find_local(start) {
        return Ok(ConfigRoot {
            dir: local,
            tier: Tier::Local,
        });
    }

    let global = global_dir()?;
    Ok(ConfigRoot {
        dir: global,
        tier: Tier::Global,
    })
}

/// Resolves the config root using the current working directory as the
/// search start.
pub fn resolve_from_cwd() -> Result<ConfigRoot> {
    let cwd = std::env::current_dir().map_err(MssqeError::Io)?;
    resolve(&cwd)
}

fn find_local(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(candidate) = dir {
        let local = candidate.join(CONFIG_DIRNAME);
        if local.join(CONFIG_FILENAME).is_file() {
            return Some(local);
        }
        dir = candidate.parent().map(Path::to_path_buf);
    }
    None
}

fn global_dir() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| MssqeError::NoConfig)?;
    Ok(base.home_dir().join(CONFIG_DIRNAME))
}

/// The directory a brand-new local config should be created under, when the
/// caller explicitly asked for a project-scoped store (`--local` flag) even
/// though no `.email/config.json` exists there yet.
pub fn local_dir(start: &Path) -> PathBuf {
    start.join(CONFIG_DIRNAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolve_prefers_local_over_global() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join(CONFIG_DIRNAME);
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join(CONFIG_FILENAME), "{}").unwrap();

        let resolved = resolve(tmp.path()).unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.dir, local);
    }

    #[test]
    fn resolve_walks_up_to_find_local_config() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join(CONFIG_DIRNAME);
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join(CONFIG_FILENAME), "{}").unwrap();

        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let resolved = resolve(&nested).unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.dir, local);
    }

    #[test]
    fn resolve_falls_back_to_global_when_no_local_config() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = resolve(tmp.path()).unwrap();
        assert_eq!(resolved.tier, Tier::Global);
    }

    #[test]
    fn config_file_joins_filename() {
        let root = ConfigRoot {
            dir: PathBuf::from("/tmp/.email"),
            tier: Tier::Global,
        };
        assert_eq!(root.config_file(), PathBuf::from("/tmp/.email/config.json"));
    }
}
