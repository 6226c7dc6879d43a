//! Configuration loading and validation.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. stock defaults ([`Config::default`])
//! 2. `media-batch.toml` (path from `--config`, else the current directory)
//! 3. command-line arguments, applied by `main` when building [`Settings`]
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [gallery]
//! thumb_size = 100          # Thumbnail edge in pixels (square)
//! full_size = 2000          # Longer edge of full-size images
//! quality = 90              # JPEG/WebP encoding quality (1-100)
//! play_overlay = true       # Play glyph on animated/video/audio thumbnails
//!
//! [music]
//! formats = ["flac", "ogg", "mp3"]  # Formats offered for the device
//! quality = 6               # ffmpeg -qscale:a for lossy targets (0-9)
//! max_name_length = 50      # Cap on file/directory base names
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! staging_dir = "/tmp"      # Where conversions are written before moving
//!
//! [tools]
//! convert = "convert"       # ImageMagick
//! ffmpeg = "ffmpeg"
//! image_backend = "imagemagick"   # or "builtin" (pure Rust, images only)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up in the current directory.
pub const CONFIG_FILENAME: &str = "media-batch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Contents of `media-batch.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gallery: GalleryConfig,
    pub music: MusicConfig,
    pub processing: ProcessingConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gallery.thumb_size == 0 || self.gallery.full_size == 0 {
            return Err(ConfigError::Validation(
                "gallery.thumb_size and gallery.full_size must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.gallery.quality) {
            return Err(ConfigError::Validation(
                "gallery.quality must be 1-100".into(),
            ));
        }
        if self.music.formats.is_empty() {
            return Err(ConfigError::Validation(
                "music.formats must not be empty".into(),
            ));
        }
        if self.music.quality > 9 {
            return Err(ConfigError::Validation("music.quality must be 0-9".into()));
        }
        if self.music.max_name_length == 0 {
            return Err(ConfigError::Validation(
                "music.max_name_length must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Gallery image sizes and thumbnail style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Square thumbnail edge in pixels.
    pub thumb_size: u32,
    /// Maximum longer edge of full-size images.
    pub full_size: u32,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    /// Composite a play glyph onto thumbnails of animated and time-based media.
    pub play_overlay: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            thumb_size: 100,
            full_size: 2000,
            quality: 90,
            play_overlay: true,
        }
    }
}

/// Music transfer policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MusicConfig {
    /// Formats offered at the format prompt. Order here does not matter;
    /// preference always follows [`AudioFormat::ALL`].
    pub formats: Vec<AudioFormat>,
    /// ffmpeg VBR quality scale for lossy targets.
    pub quality: u8,
    /// Maximum base-name length of sanitized path components.
    pub max_name_length: usize,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            formats: AudioFormat::ALL.to_vec(),
            quality: 6,
            max_name_length: crate::sanitize::DEFAULT_MAX_LEN,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Parent of the per-run staging directory. System temp dir when absent.
    pub staging_dir: Option<PathBuf>,
}

/// Which engine handles still-image resize and thumbnail jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    /// ImageMagick `convert`.
    #[default]
    Imagemagick,
    /// Pure Rust via the `image` crate.
    Builtin,
}

/// External tool locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub convert: PathBuf,
    pub ffmpeg: PathBuf,
    pub image_backend: ImageBackend,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            convert: PathBuf::from("convert"),
            ffmpeg: PathBuf::from("ffmpeg"),
            image_backend: ImageBackend::default(),
        }
    }
}

/// Number of CPU cores, at least 1.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the effective worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(requested: Option<usize>) -> NonZeroUsize {
    let cores = available_cores();
    let n = requested.map(|n| n.min(cores)).unwrap_or(cores);
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub thumb_size: Option<u32>,
    pub full_size: Option<u32>,
    pub workers: Option<usize>,
    pub sequential: bool,
    pub overwrite: bool,
}

/// Config file merged with command-line overrides.
///
/// Built once per run and passed by reference from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub gallery: GalleryConfig,
    pub music: MusicConfig,
    pub tools: ToolsConfig,
    pub staging_dir: Option<PathBuf>,
    /// Requested worker count; `None` means "ask" (music) or "all cores".
    pub workers: Option<usize>,
    pub sequential: bool,
    pub overwrite: bool,
}

impl Settings {
    pub fn merge(config: Config, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut gallery = config.gallery;
        if let Some(size) = overrides.thumb_size {
            gallery.thumb_size = size;
        }
        if let Some(size) = overrides.full_size {
            gallery.full_size = size;
        }
        if gallery.thumb_size == 0 || gallery.full_size == 0 {
            return Err(ConfigError::Validation(
                "thumbnail and full sizes must be non-zero".into(),
            ));
        }
        if overrides.workers == Some(0) {
            return Err(ConfigError::Validation("--jobs must be at least 1".into()));
        }
        Ok(Self {
            gallery,
            music: config.music,
            tools: config.tools,
            staging_dir: config.processing.staging_dir,
            workers: overrides.workers.or(config.processing.max_processes),
            sequential: overrides.sequential,
            overwrite: overrides.overwrite,
        })
    }
}

/// Load the config file.
///
/// An explicit path must exist. Without one, `media-batch.toml` in the
/// current directory is used if present, else stock defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = PathBuf::from(CONFIG_FILENAME);
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    let content = fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Returns a fully-commented stock `media-batch.toml`.
pub fn stock_config_toml() -> &'static str {
    r#"# media-batch configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Command-line arguments override values set here.

# ---------------------------------------------------------------------------
# Gallery builder
# ---------------------------------------------------------------------------
[gallery]
# Thumbnail edge in pixels. Thumbnails are square, filled and center-cropped.
thumb_size = 100

# Full-size images are scaled down so the longer edge fits. Never upscaled.
full_size = 2000

# Lossy encoding quality (1 = worst, 100 = best).
quality = 90

# Draw a play glyph on thumbnails of animations, videos and audio files.
play_overlay = true

# ---------------------------------------------------------------------------
# Music transfer
# ---------------------------------------------------------------------------
[music]
# Formats offered at the prompt. Preference is always flac > ogg > mp3.
formats = ["flac", "ogg", "mp3"]

# ffmpeg -qscale:a for ogg/mp3 targets, 0-9. For mp3 lower is better,
# for ogg higher is better.
quality = 6

# Cap on file and directory base names on the device.
max_name_length = 50

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4

# Conversions are written here first and moved into place when complete.
# Omit to use the system temp directory.
# staging_dir = "/tmp"

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
convert = "convert"
ffmpeg = "ffmpeg"

# "imagemagick" or "builtin" (pure Rust; still images only).
image_backend = "imagemagick"
"#
}
