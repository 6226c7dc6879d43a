//! Music track selections and their expansion against a library tree.
//!
//! A selection file has one item per line:
//!
//! ```text
//! Stones/Dirty          every album by an artist containing "Stones" whose
//!                       title contains "Dirty"
//! */Dirty               any artist
//! Miles Davis           everything by the artist
//! Bach/*/Prelude        tracks containing "Prelude" on any album
//! ```
//!
//! The library is laid out as `artist/album/track.ext`. Each given component
//! is matched as a case-sensitive substring of the corresponding name, with
//! `*` acting as a wildcard inside it. Only files with a known audio
//! extension are considered; the classifier still sniffs their content.

use crate::document::{ReadError, check_input_file};
use crate::types::{AudioFormat, Warning};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One parsed selection line. `None` matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPattern {
    pub line: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
}

impl TrackPattern {
    /// Parse a trimmed, non-empty line. More than three components is an error.
    pub fn parse(line: &str) -> Result<Self, Warning> {
        let parts: Vec<&str> = line.split('/').collect();
        if parts.len() > 3 {
            return Err(Warning::new(
                line,
                "selection line has too many components, ignoring",
            ));
        }

        let component = |i: usize| -> Option<String> {
            parts
                .get(i)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty() && *s != "*")
                .map(str::to_string)
        };

        Ok(Self {
            line: line.to_string(),
            artist: component(0),
            album: component(1),
            track: component(2),
        })
    }

    /// Match a library-relative `artist/album/track` triple. `track` is the
    /// file stem.
    pub fn matches(&self, artist: &str, album: &str, track: &str) -> bool {
        component_matches(self.artist.as_deref(), artist)
            && component_matches(self.album.as_deref(), album)
            && component_matches(self.track.as_deref(), track)
    }
}

fn component_matches(pattern: Option<&str>, name: &str) -> bool {
    match pattern {
        None => true,
        Some(p) => wildcard_match(&format!("*{p}*"), name),
    }
}

/// Glob-style match where `*` matches any (possibly empty) run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Parse a whole selection text. Blank lines are skipped; malformed
/// lines become warnings.
pub fn parse_spec(text: &str) -> (Vec<TrackPattern>, Vec<Warning>) {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match TrackPattern::parse(line) {
            Ok(p) => patterns.push(p),
            Err(w) => warnings.push(w),
        }
    }
    (patterns, warnings)
}

/// A library file selected by at least one pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LibraryFile {
    /// Absolute (or library-root-joined) path to the file.
    pub path: PathBuf,
    /// Path relative to the library root: `artist/album/track.ext`.
    pub relative: PathBuf,
}

/// Result of reading a selection against a library.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub files: Vec<LibraryFile>,
    pub warnings: Vec<Warning>,
}

/// Read a selection file and expand it against `library_root`.
pub fn read_spec(spec_path: &Path, library_root: &Path) -> Result<Selection, ReadError> {
    check_input_file(spec_path)?;
    let text = std::fs::read_to_string(spec_path).map_err(|source| ReadError::Unreadable {
        path: spec_path.to_path_buf(),
        source,
    })?;
    let (patterns, mut warnings) = parse_spec(&text);
    let mut selection = expand(&patterns, library_root);
    warnings.append(&mut selection.warnings);
    selection.warnings = warnings;
    Ok(selection)
}

/// Walk the library once and select every track matched by any pattern.
///
/// Output is deduplicated and sorted by relative path so classification
/// order, and therefore collision handling, is deterministic.
pub fn expand(patterns: &[TrackPattern], library_root: &Path) -> Selection {
    let candidates = library_tracks(library_root);
    let mut selected = BTreeSet::new();
    let mut warnings = Vec::new();

    for pattern in patterns {
        let before = selected.len();
        let mut hit = false;
        for file in &candidates {
            if let Some((artist, album, track)) = split_relative(&file.relative)
                && pattern.matches(artist, album, track)
            {
                hit = true;
                selected.insert(file.clone());
            }
        }
        if !hit {
            warnings.push(Warning::new(&pattern.line, "matches no files"));
        }
        tracing::debug!(
            pattern = %pattern.line,
            added = selected.len() - before,
            "expanded selection line"
        );
    }

    Selection {
        files: selected.into_iter().collect(),
        warnings,
    }
}

/// All non-hidden files exactly three levels below the root with a known
/// audio extension.
fn library_tracks(root: &Path) -> Vec<LibraryFile> {
    WalkDir::new(root)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_audio_extension(e.path()))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?.to_path_buf();
            if relative.iter().any(is_hidden) {
                return None;
            }
            Some(LibraryFile {
                path: e.path().to_path_buf(),
                relative,
            })
        })
        .collect()
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_token)
        .is_some()
}

fn split_relative(relative: &Path) -> Option<(&str, &str, &str)> {
    let mut components = relative.iter();
    let artist = components.next()?.to_str()?;
    let album = components.next()?.to_str()?;
    let track = Path::new(components.next()?).file_stem()?.to_str()?;
    Some((artist, album, track))
}
