//! Converter that spawns ImageMagick and ffmpeg.
//!
//! Argument lists are built by pure functions so they can be tested without
//! the tools installed. Children run in their own process group: a terminal
//! Ctrl-C reaches only `media-batch`, which stops dispatching and lets
//! running conversions finish.

use super::builtin;
use super::calculations::{ffmpeg_jpeg_qscale, play_glyph};
use super::params::{ResizeParams, ThumbnailParams, TranscodeParams};
use super::{ConvertError, Converter};
use crate::config::{ImageBackend, ToolsConfig};
use crate::types::AudioFormat;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct ExternalConverter {
    convert: PathBuf,
    ffmpeg: PathBuf,
    images: ImageBackend,
}

impl ExternalConverter {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            convert: tools.convert.clone(),
            ffmpeg: tools.ffmpeg.clone(),
            images: tools.image_backend,
        }
    }

    /// Check that the tools a run will need can be started at all.
    ///
    /// Called once before execution so a missing binary aborts the run
    /// instead of failing every job.
    pub fn check_tools(&self, needs_images: bool, needs_ffmpeg: bool) -> Result<(), ConvertError> {
        if needs_images && self.images == ImageBackend::Imagemagick {
            probe(&self.convert, "-version")?;
        }
        if needs_ffmpeg {
            probe(&self.ffmpeg, "-version")?;
        }
        Ok(())
    }
}

fn probe(tool: &Path, flag: &str) -> Result<(), ConvertError> {
    Command::new(tool)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|source| ConvertError::Spawn {
            tool: tool.to_path_buf(),
            source,
        })
}

fn run_tool(tool: &Path, args: Vec<OsString>) -> Result<(), ConvertError> {
    tracing::debug!(tool = %tool.display(), ?args, "spawning converter");
    let mut command = Command::new(tool);
    command.args(&args).stdin(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let output = command.output().map_err(|source| ConvertError::Spawn {
        tool: tool.to_path_buf(),
        source,
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ConvertError::ToolFailed {
            tool: tool.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

/// `convert SRC -auto-orient -resize NxN> -quality Q OUT`.
///
/// The trailing `>` only ever shrinks.
pub fn magick_resize_args(params: &ResizeParams) -> Vec<OsString> {
    let edge = params.max_edge;
    vec![
        params.source.clone().into(),
        os("-auto-orient"),
        os("-resize"),
        os(format!("{edge}x{edge}>")),
        os("-quality"),
        os(params.quality.value().to_string()),
        params.output.clone().into(),
    ]
}

/// Fill-then-crop square thumbnail, optionally from frame 0 only, with the
/// play glyph drawn in the same command.
pub fn magick_thumbnail_args(params: &ThumbnailParams) -> Vec<OsString> {
    let size = params.size;
    let mut source = params.source.clone().into_os_string();
    if params.first_frame {
        source.push("[0]");
    }

    let mut args = vec![
        source,
        os("-auto-orient"),
        os("-resize"),
        os(format!("{size}x{size}^")),
        os("-gravity"),
        os("center"),
        os("-extent"),
        os(format!("{size}x{size}")),
    ];
    if is_jpeg(&params.output) {
        args.extend(["-background", "white", "-alpha", "remove"].map(os));
    }
    if params.play_overlay {
        args.extend(play_glyph(size).magick_draw_args().into_iter().map(os));
    }
    args.extend([
        os("-quality"),
        os(params.quality.value().to_string()),
        params.output.clone().into(),
    ]);
    args
}

fn square_filter(size: u32) -> String {
    format!("scale={size}:{size}:force_original_aspect_ratio=increase,crop={size}:{size}")
}

/// One representative frame from the first few seconds, filled and cropped.
pub fn ffmpeg_video_thumbnail_args(params: &ThumbnailParams) -> Vec<OsString> {
    vec![
        os("-v"),
        os("error"),
        os("-y"),
        os("-i"),
        params.source.clone().into(),
        os("-an"),
        os("-vf"),
        os(format!("thumbnail,{}", square_filter(params.size))),
        os("-frames:v"),
        os("1"),
        os("-q:v"),
        os(ffmpeg_jpeg_qscale(params.quality.value()).to_string()),
        params.output.clone().into(),
    ]
}

/// The attached picture stream of an audio file, filled and cropped.
pub fn ffmpeg_audio_thumbnail_args(params: &ThumbnailParams) -> Vec<OsString> {
    vec![
        os("-v"),
        os("error"),
        os("-y"),
        os("-i"),
        params.source.clone().into(),
        os("-an"),
        os("-map"),
        os("0:v:0"),
        os("-vf"),
        os(square_filter(params.size)),
        os("-frames:v"),
        os("1"),
        os("-q:v"),
        os(ffmpeg_jpeg_qscale(params.quality.value()).to_string()),
        params.output.clone().into(),
    ]
}

/// Audio re-encode carrying tags across.
///
/// Ogg keeps its comments on the stream rather than the container, so they
/// are mapped from `0:s:0`.
pub fn ffmpeg_transcode_args(params: &TranscodeParams) -> Vec<OsString> {
    let metadata = match params.from {
        AudioFormat::Ogg => "0:s:0",
        AudioFormat::Flac | AudioFormat::Mp3 => "0",
    };
    let mut args = vec![
        os("-v"),
        os("error"),
        os("-y"),
        os("-i"),
        params.source.clone().into(),
        os("-map_metadata"),
        os(metadata),
    ];
    let codec: &[&str] = match params.to {
        AudioFormat::Flac => &["-codec:a", "flac"],
        AudioFormat::Ogg => &["-vn", "-codec:a", "libvorbis"],
        AudioFormat::Mp3 => &["-codec:a", "libmp3lame"],
    };
    args.extend(codec.iter().map(|s| os(*s)));
    if params.to != AudioFormat::Flac {
        args.extend([os("-qscale:a"), os(params.quality.to_string())]);
    }
    args.push(params.output.clone().into());
    args
}

impl Converter for ExternalConverter {
    fn resize(&self, params: &ResizeParams) -> Result<(), ConvertError> {
        match self.images {
            ImageBackend::Imagemagick => run_tool(&self.convert, magick_resize_args(params)),
            ImageBackend::Builtin => builtin::resize(params),
        }
    }

    fn image_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError> {
        match self.images {
            ImageBackend::Imagemagick => run_tool(&self.convert, magick_thumbnail_args(params)),
            ImageBackend::Builtin => builtin::thumbnail(params),
        }
    }

    fn video_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError> {
        run_tool(&self.ffmpeg, ffmpeg_video_thumbnail_args(params))?;
        if params.play_overlay {
            builtin::overlay_file(&params.output, params.quality)?;
        }
        Ok(())
    }

    fn audio_thumbnail(&self, params: &ThumbnailParams) -> Result<(), ConvertError> {
        run_tool(&self.ffmpeg, ffmpeg_audio_thumbnail_args(params))?;
        if params.play_overlay {
            builtin::overlay_file(&params.output, params.quality)?;
        }
        Ok(())
    }

    fn transcode(&self, params: &TranscodeParams) -> Result<(), ConvertError> {
        run_tool(&self.ffmpeg, ffmpeg_transcode_args(params))
    }
}
