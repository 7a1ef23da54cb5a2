//! Writing exports to disk.
//!
//! The file-dialog collaborator lives outside this crate; it hands in the
//! target path the user chose, or `None` when they dismissed the dialog.
//! A dismissed dialog is an outcome, not an error.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// How a save attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The export was written to this path.
    Saved(PathBuf),
    /// The user dismissed the dialog; nothing was written.
    Cancelled,
}

/// Writes the encoded export to `target`, or reports `Cancelled` when the
/// dialog was dismissed. I/O failures propagate as errors.
pub fn write_export(target: Option<&Path>, contents: &str) -> Result<SaveOutcome> {
    match target {
        Some(path) => {
            std::fs::write(path, contents)?;
            Ok(SaveOutcome::Saved(path.to_path_buf()))
        }
        None => Ok(SaveOutcome::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_chosen_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.json");

        let outcome = write_export(Some(&path), "[]").expect("write");
        assert_eq!(outcome, SaveOutcome::Saved(path.clone()));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "[]");
    }

    #[test]
    fn dismissed_dialog_is_not_an_error() {
        let outcome = write_export(None, "[]").expect("no-op");
        assert_eq!(outcome, SaveOutcome::Cancelled);
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("export.json");

        assert!(write_export(Some(&path), "[]").is_err());
    }
}
