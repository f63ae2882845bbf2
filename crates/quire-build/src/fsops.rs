//! Filesystem operations on build output directories.
//!
//! The canonical output directory is never edited in place. A finished build is
//! moved into position with [`swap_into_place`], which only ever exposes a
//! complete directory under the canonical path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while deleting or swapping output directories.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Build output missing: {0} does not exist")]
    MissingOutput(PathBuf),
}

/// Remove a directory tree, treating an absent directory as already removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<(), FsError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FsError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Best-effort removal, logging instead of failing.
pub fn cleanup_dir(path: &Path) {
    if let Err(e) = remove_dir_if_exists(path) {
        tracing::warn!("{}", e);
    }
}

/// Move `temp` into place as `canonical`.
///
/// The previous canonical directory is first moved aside to `stale`, then `temp`
/// is renamed over the now free canonical path, then `stale` is deleted. When
/// `temp` does not exist nothing is touched. When the final rename fails the
/// previous build is moved back.
pub fn swap_into_place(temp: &Path, canonical: &Path, stale: &Path) -> Result<(), FsError> {
    if !temp.is_dir() {
        return Err(FsError::MissingOutput(temp.to_path_buf()));
    }

    remove_dir_if_exists(stale)?;

    let had_previous = canonical.exists();
    if had_previous {
        rename(canonical, stale)?;
    }

    if let Err(e) = rename(temp, canonical) {
        if had_previous {
            if let Err(restore) = rename(stale, canonical) {
                tracing::error!("Failed to restore previous output: {}", restore);
            }
        }
        return Err(e);
    }

    if had_previous {
        cleanup_dir(stale);
    }

    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<(), FsError> {
    fs::rename(from, to).map_err(|source| FsError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removing_missing_dir_is_a_no_op() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");

        assert!(remove_dir_if_exists(&missing).is_ok());
        assert!(remove_dir_if_exists(&missing).is_ok());
    }

    #[test]
    fn removes_nested_tree() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("out");
        fs::create_dir_all(dir.join("a/b")).unwrap();
        fs::write(dir.join("a/b/index.html"), "x").unwrap();

        remove_dir_if_exists(&dir).unwrap();

        assert!(!dir.exists());
    }

    #[test]
    fn swap_replaces_canonical_with_temp() {
        let temp = tempdir().unwrap();
        let book = temp.path().join("_book");
        let next = temp.path().join("_book_temp");
        let stale = temp.path().join("_book_stale");

        fs::create_dir_all(&book).unwrap();
        fs::write(book.join("index.html"), "old").unwrap();
        fs::create_dir_all(&next).unwrap();
        fs::write(next.join("index.html"), "new").unwrap();

        swap_into_place(&next, &book, &stale).unwrap();

        assert_eq!(fs::read_to_string(book.join("index.html")).unwrap(), "new");
        assert!(!next.exists());
        assert!(!stale.exists());
    }

    #[test]
    fn swap_into_empty_location() {
        let temp = tempdir().unwrap();
        let book = temp.path().join("_book");
        let next = temp.path().join("_book_temp");
        fs::create_dir_all(&next).unwrap();

        swap_into_place(&next, &book, &temp.path().join("_book_stale")).unwrap();

        assert!(book.is_dir());
    }

    #[test]
    fn swap_without_temp_keeps_previous_build() {
        let temp = tempdir().unwrap();
        let book = temp.path().join("_book");
        fs::create_dir_all(&book).unwrap();
        fs::write(book.join("index.html"), "old").unwrap();

        for _ in 0..2 {
            let err = swap_into_place(
                &temp.path().join("_book_temp"),
                &book,
                &temp.path().join("_book_stale"),
            )
            .unwrap_err();
            assert!(matches!(err, FsError::MissingOutput(_)));
        }

        assert_eq!(fs::read_to_string(book.join("index.html")).unwrap(), "old");
    }
}
