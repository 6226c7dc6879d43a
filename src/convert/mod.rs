//! Media conversion behind a single trait.
//!
//! | Operation | ImageMagick backend | builtin backend |
//! |---|---|---|
//! | **Image resize** | `convert -resize WxH>` | `image` crate, Lanczos3 |
//! | **Image thumbnail** | `convert -resize ^ -extent` + `-draw` overlay | `resize_to_fill` + pixel overlay |
//! | **Video thumbnail** | `ffmpeg -vf thumbnail,scale,crop` | same |
//! | **Audio thumbnail** | `ffmpeg` attached picture stream | same |
//! | **Transcode** | `ffmpeg` with per-format codec flags | same |
//!
//! The module is split into:
//! - **Calculations**: pure geometry and encoder-scale math
//! - **Parameters**: data describing one operation
//! - **External**: [`ExternalConverter`], which spawns the tools
//! - **Builtin**: in-process image work with the `image` crate

pub mod builtin;
pub mod calculations;
pub mod external;
mod params;

pub use external::ExternalConverter;
pub use params::{Quality, ResizeParams, ThumbnailParams, TranscodeParams};

use crate::types::{Job, JobKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot run {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("No converter for {0} jobs")]
    Unsupported(&'static str),
}

/// Everything the executor needs to turn a source into a conversion output.
///
/// Implementations must be `Sync`: the worker pool shares one converter
/// across threads.
pub trait Converter: Sync {
    /// Scale an image down to fit a bounding square.
    fn resize(&self, params: &ResizeParams) -> Result<(), ConvertError>;

    /// Square fill-and-crop thumbnail of a (possibly animated) image.
    fn image_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError>;

    /// Square thumbnail from a representative video frame.
    fn video_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError>;

    /// Square thumbnail from an audio file's embedded cover art.
    fn audio_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError>;

    /// Re-encode audio into another format.
    fn transcode(&self, params: &TranscodeParams) -> Result<(), ConvertError>;
}

/// Run the converter call matching `job.kind`, writing to `output`.
///
/// `output` is normally a staging path rather than the job's destination.
pub fn convert_job(
    converter: &dyn Converter,
    job: &Job,
    output: &Path,
) -> Result<(), ConvertError> {
    let source = job.source.clone();
    let output = output.to_path_buf();
    match &job.kind {
        JobKind::Copy => Err(ConvertError::Unsupported("copy")),
        JobKind::ImageResize { max_edge, quality } => converter.resize(&ResizeParams {
            source,
            output,
            max_edge: *max_edge,
            quality: Quality::new(*quality),
        }),
        JobKind::ImageThumbnail {
            size,
            quality,
            first_frame,
            play_overlay,
        } => converter.image_thumbnail(&ThumbnailParams {
            source,
            output,
            size: *size,
            quality: Quality::new(*quality),
            first_frame: *first_frame,
            play_overlay: *play_overlay,
        }),
        JobKind::VideoThumbnail {
            size,
            quality,
            play_overlay,
        } => converter.video_thumbnail(&ThumbnailParams {
            source,
            output,
            size: *size,
            quality: Quality::new(*quality),
            first_frame: true,
            play_overlay: *play_overlay,
        }),
        JobKind::AudioThumbnail {
            size,
            quality,
            play_overlay,
        } => converter.audio_thumbnail(&ThumbnailParams {
            source,
            output,
            size: *size,
            quality: Quality::new(*quality),
            first_frame: true,
            play_overlay: *play_overlay,
        }),
        JobKind::AudioTranscode { from, to, quality } => {
            converter.transcode(&TranscodeParams {
                source,
                output,
                from: *from,
                to: *to,
                quality: *quality,
            })
        }
    }
}
