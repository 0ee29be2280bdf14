//! Whole-file replacement helper shared by the project store and the mirror.
//!
//! # Invariants
//! - Readers observe either the previous content or the new content, never a
//!   prefix of the new content.
//! - The temporary sibling is removed when the write fails before the rename.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes `contents` to a `*.tmp` sibling, syncs it and renames it over `path`.
///
/// Creates missing parent directories.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_sibling(path);
    let result = write_and_sync(&temp_path, contents).and_then(|()| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_sync(temp_path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(temp_path)?);
    writer.write_all(contents)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::{temp_sibling, write_atomic};
    use std::path::Path;

    #[test]
    fn temp_sibling_keeps_directory_and_appends_suffix() {
        assert_eq!(
            temp_sibling(Path::new("/data/projects/shop.json")),
            Path::new("/data/projects/shop.json.tmp")
        );
    }

    #[test]
    fn write_atomic_creates_parents_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("model.json");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        assert!(!temp_sibling(&target).exists());
    }
}
