//! Where elink keeps state between runs.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Overrides the XDG location when `--data-dir` is not given.
pub const DATA_DIR_ENV: &str = "ELINK_DATA_DIR";

const KB_CACHE_FILE: &str = "kb-cache.redb";

/// The directory holding the knowledge base cache.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// `explicit` (from `--data-dir`) wins, then a non-empty
    /// `ELINK_DATA_DIR`, then `$XDG_DATA_HOME/elink`. The directory is
    /// created if it does not exist.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(DATA_DIR_ENV) {
                Some(val) if !val.is_empty() => PathBuf::from(val),
                _ => xdg_data_home()?,
            },
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kb_cache(&self) -> PathBuf {
        self.root.join(KB_CACHE_FILE)
    }

    /// Whether a cache file exists; opening one creates it.
    pub fn has_kb_cache(&self) -> bool {
        self.kb_cache().is_file()
    }
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("elink")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb_cache::KbCache;

    #[test]
    fn explicit_path_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().is_dir());
        assert_eq!(dir.kb_cache(), nested.join("kb-cache.redb"));
    }

    #[test]
    fn cache_exists_once_opened() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();
        assert!(!dir.has_kb_cache());

        KbCache::open(&dir.kb_cache()).unwrap();
        assert!(dir.has_kb_cache());
    }

    #[test]
    fn unusable_path_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, "").unwrap();

        let err = DataDir::resolve(Some(&file.join("sub"))).unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }
}
