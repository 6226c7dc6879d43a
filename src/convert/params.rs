//! Parameter types for converter operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between the
//! executor (which knows jobs and staging paths) and a [`Converter`]
//! (which runs a tool or decodes pixels), so tests can swap in a recording
//! fake without touching job logic.
//!
//! [`Converter`]: super::Converter

use crate::types::AudioFormat;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Scale an image down so its longer edge fits `max_edge`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_edge: u32,
    pub quality: Quality,
}

/// Square thumbnail: fill `size`×`size`, crop around the center.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub size: u32,
    pub quality: Quality,
    /// Only decode the first frame (animated sources).
    pub first_frame: bool,
    pub play_overlay: bool,
}

/// Re-encode an audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub from: AudioFormat,
    pub to: AudioFormat,
    /// ffmpeg `-qscale:a` value for lossy targets.
    pub quality: u8,
}
