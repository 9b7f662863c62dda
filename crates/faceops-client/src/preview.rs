//! Image previews as scoped temporary files.
//!
//! A [`Preview`] owns its file and removes it when dropped, so a preview is
//! released on every exit path: superseded, errored out, or its owner gone.

use crate::error::{ClientError, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct Preview {
    file: NamedTempFile,
    label: &'static str,
}

impl Preview {
    /// Write `bytes` to a fresh temp file in `dir` (system temp dir if `None`).
    pub fn create(dir: Option<&Path>, label: &'static str, extension: &str, bytes: &[u8]) -> Result<Self> {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut builder = tempfile::Builder::new();
        builder.prefix("faceops-preview-").suffix(&suffix);

        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let file = builder.tempfile_in(&dir).map_err(|source| ClientError::Io {
            path: dir.clone(),
            source,
        })?;
        std::fs::write(file.path(), bytes).map_err(|source| ClientError::Io {
            path: file.path().to_path_buf(),
            source,
        })?;

        tracing::trace!(label, path = %file.path().display(), "preview created");
        Ok(Self { file, label })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Copy the preview somewhere that outlives it.
    pub fn save_copy(&self, dest: &Path) -> Result<()> {
        std::fs::copy(self.path(), dest)
            .map(|_| ())
            .map_err(|source| ClientError::Io {
                path: dest.to_path_buf(),
                source,
            })
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        tracing::trace!(label = self.label, path = %self.file.path().display(), "preview released");
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("label", &self.label)
            .field("path", &self.path())
            .finish()
    }
}

/// Holds at most one live preview.
#[derive(Debug, Default)]
pub struct PreviewSlot {
    current: Option<Preview>,
}

impl PreviewSlot {
    /// Install `preview`, releasing the one it supersedes.
    pub fn replace(&mut self, preview: Preview) {
        self.current = Some(preview);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn get(&self) -> Option<&Preview> {
        self.current.as_ref()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.current.as_ref().map(|p| p.path().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let preview = Preview::create(Some(dir.path()), "input", "jpg", b"abc").unwrap();
        let path = preview.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        assert_eq!(path.extension().unwrap(), "jpg");
        drop(preview);
        assert!(!path.exists());
    }

    #[test]
    fn test_slot_releases_superseded() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = PreviewSlot::default();

        slot.replace(Preview::create(Some(dir.path()), "input", "png", b"1").unwrap());
        let first = slot.path().unwrap();
        slot.replace(Preview::create(Some(dir.path()), "input", ".png", b"2").unwrap());
        let second = slot.path().unwrap();

        assert!(!first.exists());
        assert!(second.exists());
        slot.clear();
        assert!(!second.exists());
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_save_copy_survives() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("kept.jpg");
        {
            let preview = Preview::create(Some(dir.path()), "reference", "jpg", b"face").unwrap();
            preview.save_copy(&dest).unwrap();
        }
        assert_eq!(std::fs::read(&dest).unwrap(), b"face");
    }
}
