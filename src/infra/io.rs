use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Replace `path` with `contents` in one rename.
///
/// The bytes are staged in a temp file next to the destination so the rename
/// never crosses filesystems; readers see either the old or the new file.
pub fn write_atomic<P: AsRef<Path>>(
    path: P,
    contents: &[u8],
) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("write temp file for {}", path.display()))?;
    tmp.as_file().sync_all().ok();
    tmp.persist(path)
        .with_context(|| format!("rename temp file onto {}", path.display()))?;

    Ok(())
}

/// Result of a sparse copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was copied
    Copied,
    /// The source does not exist
    MissingSource,
    /// The destination already exists and was kept
    KeptExisting,
    /// The copy failed; the reason is kept for the report
    Failed(String),
}

/// Copy `src` to `dst`, creating parents. Missing sources and I/O failures are
/// reported, not raised: artifact sets are sparse. With `overwrite == false`
/// an existing destination is left untouched.
pub fn copy_if_exists(src: &Path, dst: &Path, overwrite: bool) -> CopyOutcome {
    if !src.is_file() {
        debug!(src = %src.display(), "copy skipped: no source");
        return CopyOutcome::MissingSource;
    }
    if !overwrite && dst.exists() {
        debug!(dst = %dst.display(), "copy skipped: destination exists");
        return CopyOutcome::KeptExisting;
    }

    let result = dst
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::copy(src, dst));

    match result {
        Ok(_) => {
            debug!(src = %src.display(), dst = %dst.display(), "copied");
            CopyOutcome::Copied
        }
        Err(e) => {
            debug!(src = %src.display(), error = %e, "copy failed");
            CopyOutcome::Failed(e.to_string())
        }
    }
}

/// Remove a file if present; absent files are fine.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Remove a directory tree if present.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Remove now-empty parent directories of `path`, stopping at `stop`.
pub fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut dir: Option<PathBuf> = path.parent().map(Path::to_path_buf);

    while let Some(d) = dir {
        if d == stop || !d.starts_with(stop) {
            break;
        }
        // read_dir + remove_dir only succeeds on empty directories
        if fs::remove_dir(&d).is_err() {
            break;
        }
        dir = d.parent().map(Path::to_path_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/state.json");

        write_atomic(&path, b"[]").unwrap();
        write_atomic(&path, b"[\"a/b\"]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[\"a/b\"]");
        // No stray temp files left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn sparse_copy_reports_each_case() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("a.ts");
        let dst = tmp.path().join("out/a.ts");

        assert_eq!(copy_if_exists(&src, &dst, false), CopyOutcome::MissingSource);

        fs::write(&src, "one").unwrap();
        assert_eq!(copy_if_exists(&src, &dst, false), CopyOutcome::Copied);

        fs::write(&src, "two").unwrap();
        assert_eq!(copy_if_exists(&src, &dst, false), CopyOutcome::KeptExisting);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "one");

        assert_eq!(copy_if_exists(&src, &dst, true), CopyOutcome::Copied);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "two");
    }

    #[test]
    fn pruning_stops_at_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("rewired");
        let file = root.join("array/sum.ts");
        fs::create_dir_all(file.parent().unwrap()).unwrap();

        prune_empty_parents(&file, &root);

        assert!(!root.join("array").exists());
        assert!(root.exists());
    }
}
