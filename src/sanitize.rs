//! Portable file and directory names for FAT32 music players.
//!
//! Every path component below the target directory goes through
//! [`sanitize_component`]:
//!
//! - characters FAT32 rejects (`: ; | * ? " < > \`) are removed
//! - the base name is cut to the configured length (extension kept)
//! - leading and trailing whitespace and periods are stripped
//! - an empty result becomes `_`
//!
//! The steps run in that order so that the result is a fixed point:
//! sanitizing a sanitized name returns it unchanged.

use std::path::{Component, Path, PathBuf};

/// Characters removed from every component.
pub const ILLEGAL_CHARS: &[char] = &[':', ';', '|', '*', '?', '"', '<', '>', '\\'];

/// Default cap on base-name length, in characters.
pub const DEFAULT_MAX_LEN: usize = 50;

/// Sanitize a single path component.
///
/// `is_file` decides whether a trailing `.ext` is split off and preserved;
/// directory names are treated as a single base name.
///
/// - `"  .Hidden Album. "` → `"Hidden Album"`
/// - `"What? Now: Live.flac"` → `"What Now Live.flac"`
pub fn sanitize_component(name: &str, is_file: bool, max_len: usize) -> String {
    let (base, ext) = if is_file {
        split_extension(name)
    } else {
        (name, None)
    };

    let cleaned: String = base.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect();
    let truncated: String = cleaned.chars().take(max_len.max(1)).collect();
    let trimmed = truncated.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let base = if trimmed.is_empty() { "_" } else { trimmed };

    match ext {
        Some(ext) => {
            let ext: String = ext.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect();
            if ext.is_empty() {
                base.to_string()
            } else {
                format!("{base}.{ext}")
            }
        }
        None => base.to_string(),
    }
}

/// Sanitize every component of a relative path; the last one is a file.
pub fn sanitize_relative(path: &Path, max_len: usize) -> PathBuf {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| sanitize_component(part, i == last, max_len))
        .collect()
}

/// Split `name.ext` at the last period. A leading period alone is not an
/// extension separator (`.hidden` has none).
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(pos) => (&name[..pos], Some(&name[pos + 1..])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_and_periods() {
        assert_eq!(
            sanitize_component("  .Hidden Album. ", false, DEFAULT_MAX_LEN),
            "Hidden Album"
        );
    }

    #[test]
    fn removes_illegal_characters_keeps_extension() {
        assert_eq!(
            sanitize_component("What? Now: Live.flac", true, DEFAULT_MAX_LEN),
            "What Now Live.flac"
        );
    }

    #[test]
    fn truncates_base_name_only() {
        let long = format!("{}.mp3", "a".repeat(80));
        let result = sanitize_component(&long, true, DEFAULT_MAX_LEN);
        assert_eq!(result, format!("{}.mp3", "a".repeat(50)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let name = "ä".repeat(60);
        let result = sanitize_component(&name, false, 10);
        assert_eq!(result.chars().count(), 10);
    }

    #[test]
    fn trailing_space_exposed_by_truncation_is_stripped() {
        let name = format!("{} tail", "x".repeat(9));
        assert_eq!(sanitize_component(&name, false, 10), "x".repeat(9));
    }

    #[test]
    fn empty_result_becomes_underscore() {
        assert_eq!(sanitize_component("???", false, DEFAULT_MAX_LEN), "_");
        assert_eq!(sanitize_component("...mp3", false, DEFAULT_MAX_LEN), "mp3");
    }

    #[test]
    fn directory_names_keep_inner_periods() {
        assert_eq!(
            sanitize_component("Vol. 2", false, DEFAULT_MAX_LEN),
            "Vol. 2"
        );
    }

    #[test]
    fn sanitization_is_idempotent() {
        let samples = [
            ("  .Hidden Album. ", false),
            ("What? Now: Live.flac", true),
            (": leading colon", false),
            ("x..mp3", true),
            ("name with trailing dot..ogg", true),
            ("???", false),
            ("a very long name that will definitely be cut somewhere in the middle of it.flac", true),
            ("ends with space before cut                                              x", false),
        ];
        for (name, is_file) in samples {
            let once = sanitize_component(name, is_file, DEFAULT_MAX_LEN);
            let twice = sanitize_component(&once, is_file, DEFAULT_MAX_LEN);
            assert_eq!(once, twice, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn relative_path_sanitizes_each_component() {
        let path = Path::new("Rolling Stones/Dirty Work?/01: One Hit.flac");
        assert_eq!(
            sanitize_relative(path, DEFAULT_MAX_LEN),
            PathBuf::from("Rolling Stones/Dirty Work/01 One Hit.flac")
        );
    }

    #[test]
    fn relative_path_idempotent() {
        let path = Path::new(" A. /B:/c?.mp3");
        let once = sanitize_relative(path, DEFAULT_MAX_LEN);
        assert_eq!(sanitize_relative(&once, DEFAULT_MAX_LEN), once);
    }
}
