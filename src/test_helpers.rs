//! Shared test utilities for the media-batch test suite.
//!
//! Provides fixture writers that produce files with real magic bytes (so the
//! sniffer classifies them) and lookup helpers over job batches.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let photo = write_fixture(tmp.path(), "photos/dawn.jpg", JPEG);
//! let plan = classify_gallery(&refs, work.path(), &GalleryConfig::default());
//!
//! let job = find_job(&plan.batch, "dawn_thumb.jpg");
//! assert_eq!(job.source, photo);
//! ```

use std::path::{Path, PathBuf};

use crate::types::{Job, JobBatch};

// =========================================================================
// Magic-byte fixtures
// =========================================================================

pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0];
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
pub const STILL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00";
pub const ANIMATED_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00\x21\xFF\x0BNETSCAPE2.0\x03\x01\x00\x00\x00";
pub const MP4: &[u8] = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isomiso2";
pub const FLAC: &[u8] = b"fLaC\x00\x00\x00\x22";
pub const MP3: &[u8] = b"ID3\x03\x00\x00\x00\x00\x00\x00";
pub const OGG_VORBIS: &[u8] = b"OggS\x00\x02\x00\x00\x00\x00\x00\x00\x00\x00\x01vorbis";
pub const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";
pub const TEXT: &[u8] = b"just some notes\n";

/// Write `contents` to `root/relative`, creating parent directories.
/// Returns the full path.
pub fn write_fixture(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

// =========================================================================
// Batch lookups, panicking with a clear message on miss
// =========================================================================

/// Find the job writing a destination with this file name. Panics if absent.
pub fn find_job<'a>(batch: &'a JobBatch, file_name: &str) -> &'a Job {
    batch
        .jobs
        .iter()
        .find(|j| j.destination.file_name().is_some_and(|n| n == file_name))
        .unwrap_or_else(|| {
            panic!(
                "no job writes '{file_name}'. Destinations: {:?}",
                destination_names(batch)
            )
        })
}

/// Destination file names in batch order.
pub fn destination_names(batch: &JobBatch) -> Vec<String> {
    batch
        .jobs
        .iter()
        .map(|j| {
            j.destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Every regular file below `root`, relative and sorted.
pub fn tree(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().to_string())
        })
        .collect();
    files.sort();
    files
}
