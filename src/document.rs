//! Gallery document scanner.
//!
//! A gallery document is Markdown with two kinds of references the pipeline
//! cares about:
//!
//! ```text
//! !![Sunset over the bay](photos/sunset.jpg)   gallery entry (thumbnail → full view)
//! ![Sunset over the bay](photos/sunset.jpg)    gallery entry (plain Markdown image)
//! !banner[Header](photos/header.jpg)           banner (full size, no thumbnail)
//! [the itinerary](notes/itinerary.pdf)         auxiliary file, copied through
//! ```
//!
//! [`scan`] turns the document into a flat [`Token`] sequence. Everything that
//! is not a well-formed reference stays in [`Token::Text`] untouched, so the
//! renderer can reassemble the document exactly. Descriptions may not contain
//! brackets and paths may not contain parentheses; anything else is left as
//! text.

use crate::types::Warning;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} is a directory")]
    IsDirectory(PathBuf),
    #[error("{0} does not exist")]
    NotFound(PathBuf),
}

/// Which sigil introduced a media reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Gallery,
    Banner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Media {
        marker: Marker,
        description: String,
        path: String,
    },
    Link {
        text: String,
        target: String,
    },
}

const BANNER_SIGIL: &str = "!banner[";

/// Split a document into text, media references and plain links.
pub fn scan(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let matched = if rest.starts_with("!![") {
            parse_bracketed(&rest[2..]).map(|(desc, path, len)| {
                (media(Marker::Gallery, desc, path), len + 2)
            })
        } else if rest.starts_with(BANNER_SIGIL) {
            parse_bracketed(&rest[BANNER_SIGIL.len() - 1..]).map(|(desc, path, len)| {
                (media(Marker::Banner, desc, path), len + BANNER_SIGIL.len() - 1)
            })
        } else if rest.starts_with("![") {
            parse_bracketed(&rest[1..]).map(|(desc, path, len)| {
                (media(Marker::Gallery, desc, path), len + 1)
            })
        } else if rest.starts_with('[') {
            parse_bracketed(rest).map(|(text, target, len)| {
                (
                    Token::Link {
                        text: text.to_string(),
                        target: target.to_string(),
                    },
                    len,
                )
            })
        } else {
            None
        };

        match matched {
            Some((token, len)) => {
                if text_start < pos {
                    tokens.push(Token::Text(input[text_start..pos].to_string()));
                }
                tokens.push(token);
                pos += len;
                text_start = pos;
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(input[text_start..].to_string()));
    }
    tokens
}

fn media(marker: Marker, description: &str, path: &str) -> Token {
    Token::Media {
        marker,
        description: description.to_string(),
        path: path.to_string(),
    }
}

/// Parse `[desc](target)` at the start of `s`.
///
/// Returns the description, the target and the number of bytes consumed.
fn parse_bracketed(s: &str) -> Option<(&str, &str, usize)> {
    let inner = s.strip_prefix('[')?;
    let close = inner.find(|c| c == '[' || c == ']')?;
    if inner.as_bytes()[close] != b']' {
        return None;
    }
    let desc = &inner[..close];

    let after = inner[close + 1..].strip_prefix('(')?;
    let end = after.find(|c| c == '(' || c == ')')?;
    if after.as_bytes()[end] != b')' || end == 0 {
        return None;
    }
    let target = &after[..end];

    let consumed = 1 + close + 1 + 1 + end + 1;
    Some((desc, target, consumed))
}

/// Whether a plain link points at a local file that should be copied through.
///
/// Anchors (`#section`) and anything carrying a URL scheme are not files.
pub fn is_auxiliary_target(target: &str) -> bool {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') {
        return false;
    }
    match target.find(':') {
        Some(colon) => {
            let scheme = &target[..colon];
            // A single letter before the colon is a Windows drive, not a scheme.
            !(scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
        }
        None => true,
    }
}

/// A reference from the document resolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub marker: Marker,
    pub description: String,
    pub path: PathBuf,
}

/// Everything the classifier and packager need from a gallery document.
#[derive(Debug, Clone, Default)]
pub struct GalleryDocument {
    pub tokens: Vec<Token>,
    pub media: Vec<Reference>,
    pub auxiliary: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Read and scan a gallery document.
///
/// Reference paths resolve relative to the document's directory. Missing
/// files become warnings; they are dropped from `media` and `auxiliary` but
/// their tokens stay so the page still renders.
pub fn read_document(path: &Path) -> Result<GalleryDocument, ReadError> {
    check_input_file(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ReadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(resolve(scan(&text), base))
}

fn resolve(tokens: Vec<Token>, base: &Path) -> GalleryDocument {
    let mut doc = GalleryDocument::default();

    for token in &tokens {
        match token {
            Token::Media {
                marker,
                description,
                path,
            } => {
                let resolved = base.join(path);
                if resolved.is_file() {
                    doc.media.push(Reference {
                        marker: *marker,
                        description: description.clone(),
                        path: resolved,
                    });
                } else {
                    doc.warnings
                        .push(Warning::for_path(&resolved, "media file is missing"));
                }
            }
            Token::Link { target, .. } if is_auxiliary_target(target) => {
                let resolved = base.join(target.trim());
                if resolved.is_file() {
                    if !doc.auxiliary.contains(&resolved) {
                        doc.auxiliary.push(resolved);
                    }
                } else {
                    doc.warnings
                        .push(Warning::for_path(&resolved, "linked file is missing"));
                }
            }
            _ => {}
        }
    }

    doc.tokens = tokens;
    doc
}

/// Fatal checks shared by both input kinds: the file must exist and must not
/// be a directory.
pub fn check_input_file(path: &Path) -> Result<(), ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(ReadError::IsDirectory(path.to_path_buf()));
    }
    Ok(())
}
