//! Staged writes.
//!
//! Converters never write to a destination directly. Each run owns a private
//! staging directory; every conversion writes to a name derived from its
//! destination (first 16 hex digits of the SHA-256 of the destination path,
//! extension kept so tools pick the right encoder) and is promoted with a
//! rename once complete. When staging and destination are on different
//! filesystems the rename fails, and promotion falls back to copying into a
//! hidden sibling of the destination followed by a rename. Plain copy jobs
//! go through the same hidden-sibling step.
//!
//! Either way the destination only ever appears complete.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Per-run staging directory. Removed on drop.
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Create a fresh, exclusive staging directory below `parent` (or the
    /// system temp directory).
    pub fn new(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".media-batch-staging-");
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(dir = %dir.path().display(), "created staging directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the conversion for `destination` writes its output.
    pub fn path_for(&self, destination: &Path) -> PathBuf {
        self.dir.path().join(staging_name(destination))
    }
}

/// Unique, stable staging file name for a destination.
pub fn staging_name(destination: &Path) -> String {
    let digest = Sha256::digest(destination.as_os_str().as_encoded_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    match destination.extension() {
        Some(ext) => format!("{hex}.{}", ext.to_string_lossy()),
        None => hex,
    }
}

/// Hidden sibling used while a file is being copied next to its destination.
fn partial_sibling(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.part"))
}

fn ensure_parent(destination: &Path) -> io::Result<()> {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Copy `source` next to `destination` under a hidden name, then rename it
/// into place.
pub fn copy_into_place(source: &Path, destination: &Path) -> io::Result<()> {
    ensure_parent(destination)?;
    let partial = partial_sibling(destination);
    let result = fs::copy(source, &partial).and_then(|_| fs::rename(&partial, destination));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// Move a finished staging file to its destination.
pub fn promote(staged: &Path, destination: &Path) -> io::Result<()> {
    ensure_parent(destination)?;
    match fs::rename(staged, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                staged = %staged.display(),
                error = %e,
                "rename failed, copying across filesystems"
            );
            copy_into_place(staged, destination)?;
            let _ = fs::remove_file(staged);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_name_is_stable_and_keeps_extension() {
        let a = staging_name(Path::new("/out/photo_thumb.jpg"));
        let b = staging_name(Path::new("/out/photo_thumb.jpg"));
        assert_eq!(a, b);
        assert!(a.ends_with(".jpg"));
        assert_eq!(a.len(), 16 + 4);
    }

    #[test]
    fn staging_names_differ_per_destination() {
        assert_ne!(
            staging_name(Path::new("/a/x.jpg")),
            staging_name(Path::new("/b/x.jpg"))
        );
    }

    #[test]
    fn staging_name_without_extension() {
        let name = staging_name(Path::new("/out/README"));
        assert_eq!(name.len(), 16);
        assert!(!name.contains('.'));
    }

    #[test]
    fn staging_dirs_are_exclusive_and_removed() {
        let parent = tempfile::TempDir::new().unwrap();
        let first = Staging::new(Some(parent.path())).unwrap();
        let second = Staging::new(Some(parent.path())).unwrap();
        assert_ne!(first.path(), second.path());

        let kept = first.path().to_path_buf();
        drop(first);
        assert!(!kept.exists());
    }

    #[test]
    fn promote_moves_file_and_creates_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let staging = Staging::new(Some(tmp.path())).unwrap();
        let dest = tmp.path().join("out/deep/song.mp3");
        let staged = staging.path_for(&dest);
        fs::write(&staged, "data").unwrap();

        promote(&staged, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "data");
        assert!(!staged.exists());
    }

    #[test]
    fn copy_into_place_leaves_no_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("src.mp4");
        fs::write(&src, "video").unwrap();
        let dest = tmp.path().join("out/clip.mp4");

        copy_into_place(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "video");
        assert!(!partial_sibling(&dest).exists());
        assert!(src.exists());
    }

    #[test]
    fn failed_copy_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("clip.mp4");
        assert!(copy_into_place(&tmp.path().join("missing"), &dest).is_err());
        assert!(!dest.exists());
        assert!(!partial_sibling(&dest).exists());
    }
}
