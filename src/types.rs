//! Shared types passed between the pipeline stages.
//!
//! A [`Job`] maps one existing source file to one destination file. The
//! classifier creates jobs, the executor consumes them; nothing is persisted
//! between runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Audio encodings the music transfer knows how to produce.
///
/// [`AudioFormat::ALL`] is ordered best-to-worst; format selection walks it
/// from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Ogg,
    Mp3,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Flac, AudioFormat::Ogg, AudioFormat::Mp3];

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Parse a user-facing token (`"flac"`, `"OGG"`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Media type determined by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image { animated: bool },
    Video,
    Audio(Option<AudioFormat>),
}

/// What a job does, with the parameters specific to that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobKind {
    /// Plain filesystem copy.
    Copy,
    /// Scale down so the longer edge is at most `max_edge`.
    ImageResize { max_edge: u32, quality: u32 },
    /// Square fill-and-crop thumbnail. Animated sources use their first frame.
    ImageThumbnail {
        size: u32,
        quality: u32,
        first_frame: bool,
        play_overlay: bool,
    },
    /// Square thumbnail from an early video frame.
    VideoThumbnail {
        size: u32,
        quality: u32,
        play_overlay: bool,
    },
    /// Square thumbnail from embedded cover art.
    AudioThumbnail {
        size: u32,
        quality: u32,
        play_overlay: bool,
    },
    /// Re-encode audio into another format.
    AudioTranscode {
        from: AudioFormat,
        to: AudioFormat,
        quality: u8,
    },
}

impl JobKind {
    /// Copies are cheap and I/O-bound; everything else runs a converter.
    pub fn is_copy(&self) -> bool {
        matches!(self, JobKind::Copy)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Copy => "copy",
            JobKind::ImageResize { .. } => "image-resize",
            JobKind::ImageThumbnail { .. } => "image-thumbnail",
            JobKind::VideoThumbnail { .. } => "video-thumbnail",
            JobKind::AudioThumbnail { .. } => "audio-thumbnail",
            JobKind::AudioTranscode { .. } => "audio-transcode",
        }
    }
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl Job {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, kind: JobKind) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
        }
    }

    /// Whether the output already exists, which makes the job satisfied
    /// unless the run asks for overwriting.
    pub fn is_satisfied(&self) -> bool {
        self.destination.exists()
    }
}

/// A non-fatal problem noticed while reading or classifying.
///
/// Warnings are printed immediately and the offending item is left out of the
/// batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn for_path(path: &Path, message: impl Into<String>) -> Self {
        Self::new(path.display().to_string(), message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Ordered jobs for one run. Destinations are unique.
#[derive(Debug, Clone, Default)]
pub struct JobBatch {
    pub jobs: Vec<Job>,
}

impl JobBatch {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn conversion_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.kind.is_copy()).count()
    }

    /// Drop jobs whose destination already exists.
    ///
    /// Returns how many were dropped.
    pub fn retain_unsatisfied(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| !job.is_satisfied());
        before - self.jobs.len()
    }
}
