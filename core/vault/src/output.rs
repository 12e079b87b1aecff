//! Atomic output writes with an explicit collision policy.
//!
//! Output is written to a temporary file in the target directory and moved
//! into place only once fully written. A failed run leaves nothing behind.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PersistError};
use tracing::debug;

use crate::naming::numbered_path;
use aethervault_common::{Error, Result};

/// Give up auto-renaming after this many numbered candidates.
pub const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// What to do when the output path is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Fail with `AlreadyExists`.
    Fail,
    /// Append ` (1)`, ` (2)`, ... to the stem until a free name is found.
    #[default]
    AutoRename,
}

/// Write a file atomically.
///
/// `write` fills the temporary file. The returned path is where the output
/// actually landed, which differs from `target` after an auto-rename.
///
/// # Errors
/// - Whatever `write` returns; the temporary file is removed
/// - `AlreadyExists` under [`CollisionPolicy::Fail`], or when no free name
///   is left under [`CollisionPolicy::AutoRename`]
/// - `Io` for filesystem failures
pub fn write_atomic<F>(target: &Path, policy: CollisionPolicy, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".aethervault-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    let written = match policy {
        CollisionPolicy::Overwrite => {
            tmp.persist(target).map_err(|e| Error::Io(e.error))?;
            target.to_path_buf()
        }
        CollisionPolicy::Fail => {
            tmp.persist_noclobber(target)
                .map_err(|e| collision_error(e, target))?;
            target.to_path_buf()
        }
        CollisionPolicy::AutoRename => persist_renaming(tmp, target)?,
    };

    debug!(path = %written.display(), "Output written");
    Ok(written)
}

fn collision_error(err: PersistError, target: &Path) -> Error {
    if err.error.kind() == io::ErrorKind::AlreadyExists {
        Error::AlreadyExists(target.to_path_buf())
    } else {
        Error::Io(err.error)
    }
}

fn persist_renaming(mut tmp: NamedTempFile, target: &Path) -> Result<PathBuf> {
    for n in 0..=MAX_RENAME_ATTEMPTS {
        let candidate = if n == 0 {
            target.to_path_buf()
        } else {
            numbered_path(target, n)
        };

        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => return Err(Error::Io(e.error)),
        }
    }
    Err(Error::AlreadyExists(target.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_bytes(bytes: &'static [u8]) -> impl FnOnce(&mut File) -> Result<()> {
        move |file| file.write_all(bytes).map_err(Error::from)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let written = write_atomic(&target, CollisionPolicy::Fail, write_bytes(b"data")).unwrap();
        assert_eq!(written, target);
        assert_eq!(fs::read(&target).unwrap(), b"data");
        assert_eq!(entries(dir.path()), vec!["out.bin"]);
    }

    #[test]
    fn test_overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"old").unwrap();

        write_atomic(&target, CollisionPolicy::Overwrite, write_bytes(b"new")).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_fail_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"old").unwrap();

        let err = write_atomic(&target, CollisionPolicy::Fail, write_bytes(b"new")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(p) if p == target));
        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert_eq!(entries(dir.path()), vec!["out.bin"]);
    }

    #[test]
    fn test_auto_rename_numbers_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hello_VAULT.png");
        fs::write(&target, b"0").unwrap();
        fs::write(dir.path().join("hello_VAULT (1).png"), b"1").unwrap();

        let written =
            write_atomic(&target, CollisionPolicy::AutoRename, write_bytes(b"2")).unwrap();
        assert_eq!(written, dir.path().join("hello_VAULT (2).png"));
        assert_eq!(fs::read(&written).unwrap(), b"2");
        assert_eq!(fs::read(&target).unwrap(), b"0");
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let result = write_atomic(&target, CollisionPolicy::AutoRename, |file| {
            file.write_all(b"partial")?;
            Err(Error::Carrier("encoder failed".to_string()))
        });

        assert!(matches!(result, Err(Error::Carrier(_))));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.bin");

        let err = write_atomic(&target, CollisionPolicy::Overwrite, write_bytes(b"x")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&CollisionPolicy::AutoRename).unwrap(),
            "\"auto_rename\""
        );
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::AutoRename);
    }
}
