//! Last-known output per definition, one dotfile per definition name.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Map a definition name to its baseline file stem.
///
/// Whitespace (including the ideographic space U+3000) and any other
/// character that is not alphanumeric, `-` or `_` becomes `_`, so the name
/// can never escape the baseline directory.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Filesystem-backed baseline records under a single directory.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/.<normalized-name>`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{}", normalize_name(name)))
    }

    /// The stored baseline, or `None` when the file is missing or empty.
    pub fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence(path, e)),
        }
    }

    /// Replace the baseline for `name` with `content`.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed over the old one.
    pub fn write(&self, name: &str, content: &str) -> Result<()> {
        let path = self.path_for(name);
        atomic_write(&path, content)
    }
}

/// Write `content` to `path` via a sibling temp file and rename.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::persistence(dir, e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::persistence(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| Error::persistence(path, e.error))?;
    Ok(())
}
