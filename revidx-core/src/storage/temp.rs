//! Uniquely named temporary files with best-effort cleanup

use std::io;
use std::path::{Path, PathBuf};

/// Generate a collision-free file name inside `dir`
pub fn temp_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        prefix,
        uuid::Uuid::new_v4().simple(),
        extension
    ))
}

/// Owns a file path and removes the file on drop unless persisted
///
/// Construction steps hold their outputs in `TempFile`s, so a step that
/// fails part way leaves nothing behind once the error unwinds.
#[derive(Debug)]
pub struct TempFile {
    path: Option<PathBuf>,
}

impl TempFile {
    pub fn new(dir: &Path, prefix: &str, extension: &str) -> Self {
        Self::adopt(temp_path(dir, prefix, extension))
    }

    /// Take ownership of an existing path
    pub fn adopt(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Release ownership; the file is no longer removed on drop
    pub fn persist(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }

    /// Remove the file now, reporting failure
    pub fn remove(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => remove_if_exists(&path),
            None => Ok(()),
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = remove_if_exists(&path)
        {
            log::warn!("Failed to clean up {}: {}", path.display(), e);
        }
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
