//! Small filesystem primitives shared by the cache, merger and profile store.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

/// Recursively copy `src` into `dest`, overwriting files that already exist.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target_path)?;
        } else {
            fs::copy(entry.path(), &target_path)?;
        }
    }
    Ok(())
}

/// Write `contents` to a temporary file next to `path`, then rename it into place.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_recursive_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dest = tmp.path().join("dest");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/a.txt"), b"new").unwrap();
        fs::create_dir_all(dest.join("nested")).unwrap();
        fs::write(dest.join("nested/a.txt"), b"old").unwrap();

        copy_dir_recursive(&src, &dest).unwrap();

        assert_eq!(fs::read(dest.join("nested/a.txt")).unwrap(), b"new");
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("deep/file.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        // no stray temp files left behind
        assert_eq!(fs::read_dir(tmp.path().join("deep")).unwrap().count(), 1);
    }

    #[test]
    fn removals_tolerate_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        remove_file_if_exists(&tmp.path().join("nope")).unwrap();
        remove_dir_if_exists(&tmp.path().join("nope")).unwrap();
    }
}
