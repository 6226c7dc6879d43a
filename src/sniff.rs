//! Content sniffing: decide what a file is from its leading bytes.
//!
//! File extensions are only used to break ties that the header alone
//! cannot settle (none currently). Unknown signatures yield `None` and the
//! classifier reports the file as unsupported.

use crate::types::{AudioFormat, MediaKind};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// How much of the file is inspected. GIF frame counting and Ogg stream
/// identification both need more than the first few bytes.
const SNIFF_LEN: usize = 64 * 1024;

/// Read the head of `path` and classify it.
pub fn sniff_file(path: &Path) -> io::Result<Option<MediaKind>> {
    let mut file = File::open(path)?;
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    file.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut buf)?;
    Ok(sniff_bytes(&buf))
}

/// Classify a buffer holding the start of a file.
pub fn sniff_bytes(head: &[u8]) -> Option<MediaKind> {
    if head.len() < 4 {
        return None;
    }

    // Images
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(MediaKind::Image { animated: false });
    }
    if head.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(MediaKind::Image { animated: false });
    }
    if head.starts_with(b"GIF8") {
        return Some(MediaKind::Image {
            animated: gif_is_animated(head),
        });
    }
    if head.starts_with(b"BM") && head.len() >= 14 {
        return Some(MediaKind::Image { animated: false });
    }
    if head.starts_with(&[b'I', b'I', 0x2A, 0x00]) || head.starts_with(&[b'M', b'M', 0x00, 0x2A])
    {
        return Some(MediaKind::Image { animated: false });
    }

    // RIFF containers: WebP, WAV, AVI
    if head.starts_with(b"RIFF") && head.len() >= 12 {
        return match &head[8..12] {
            b"WEBP" => Some(MediaKind::Image { animated: false }),
            b"WAVE" => Some(MediaKind::Audio(None)),
            b"AVI " => Some(MediaKind::Video),
            _ => None,
        };
    }

    // Audio
    if head.starts_with(b"fLaC") {
        return Some(MediaKind::Audio(Some(AudioFormat::Flac)));
    }
    if head.starts_with(b"OggS") {
        return sniff_ogg(head);
    }
    if head.starts_with(b"ID3") || is_mpeg_audio_frame(head) {
        return Some(MediaKind::Audio(Some(AudioFormat::Mp3)));
    }

    // Matroska / WebM
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(MediaKind::Video);
    }

    // ISO base media: ftyp box at offset 4, brand decides audio vs. video.
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return match &head[8..12] {
            b"M4A " | b"M4B " => Some(MediaKind::Audio(None)),
            // Still-image brands are not videos.
            b"avif" | b"avis" | b"heic" | b"heix" | b"mif1" | b"msf1" => None,
            _ => Some(MediaKind::Video),
        };
    }

    None
}

/// MPEG audio frame sync: 11 set bits, then a valid layer.
fn is_mpeg_audio_frame(head: &[u8]) -> bool {
    head[0] == 0xFF && (head[1] & 0xE0) == 0xE0 && (head[1] & 0x06) != 0
}

/// An Ogg stream is audio unless its first packet announces Theora.
fn sniff_ogg(head: &[u8]) -> Option<MediaKind> {
    if contains(head, b"theora") {
        return Some(MediaKind::Video);
    }
    if contains(head, b"vorbis") || contains(head, b"OpusHead") {
        return Some(MediaKind::Audio(Some(AudioFormat::Ogg)));
    }
    // Unknown codec in an Ogg container; still audio in practice.
    Some(MediaKind::Audio(None))
}

/// A GIF is animated if it carries the NETSCAPE looping extension or more
/// than one graphic control extension within the sniffed window.
fn gif_is_animated(head: &[u8]) -> bool {
    if contains(head, b"NETSCAPE2.0") || contains(head, b"ANIMEXTS1.0") {
        return true;
    }
    head.windows(3)
        .filter(|w| w[0] == 0x21 && w[1] == 0xF9 && w[2] == 0x04)
        .nth(1)
        .is_some()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.resize(32, 0);
        v
    }

    #[test]
    fn sniffs_jpeg_and_png() {
        assert_eq!(
            sniff_bytes(&padded(&[0xFF, 0xD8, 0xFF, 0xE0])),
            Some(MediaKind::Image { animated: false })
        );
        assert_eq!(
            sniff_bytes(&padded(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A])),
            Some(MediaKind::Image { animated: false })
        );
    }

    #[test]
    fn still_gif_is_not_animated() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x21, 0xF9, 0x04, 0, 0, 0, 0, 0]);
        gif.resize(64, 0);
        assert_eq!(
            sniff_bytes(&gif),
            Some(MediaKind::Image { animated: false })
        );
    }

    #[test]
    fn netscape_gif_is_animated() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x21, 0xFF, 0x0B]);
        gif.extend_from_slice(b"NETSCAPE2.0");
        gif.resize(64, 0);
        assert_eq!(sniff_bytes(&gif), Some(MediaKind::Image { animated: true }));
    }

    #[test]
    fn multi_frame_gif_is_animated() {
        let mut gif = b"GIF89a".to_vec();
        for _ in 0..2 {
            gif.extend_from_slice(&[0x21, 0xF9, 0x04, 0, 0, 0, 0, 0]);
            gif.extend_from_slice(&[0x2C, 0, 0, 0, 0]);
        }
        assert_eq!(sniff_bytes(&gif), Some(MediaKind::Image { animated: true }));
    }

    #[test]
    fn riff_variants() {
        let mut webp = b"RIFF\0\0\0\0WEBP".to_vec();
        webp.resize(16, 0);
        assert_eq!(
            sniff_bytes(&webp),
            Some(MediaKind::Image { animated: false })
        );

        let mut wav = b"RIFF\0\0\0\0WAVE".to_vec();
        wav.resize(16, 0);
        assert_eq!(sniff_bytes(&wav), Some(MediaKind::Audio(None)));

        let mut avi = b"RIFF\0\0\0\0AVI ".to_vec();
        avi.resize(16, 0);
        assert_eq!(sniff_bytes(&avi), Some(MediaKind::Video));
    }

    #[test]
    fn sniffs_music_formats() {
        assert_eq!(
            sniff_bytes(&padded(b"fLaC")),
            Some(MediaKind::Audio(Some(AudioFormat::Flac)))
        );
        assert_eq!(
            sniff_bytes(&padded(b"ID3\x04")),
            Some(MediaKind::Audio(Some(AudioFormat::Mp3)))
        );
        assert_eq!(
            sniff_bytes(&padded(&[0xFF, 0xFB, 0x90, 0x64])),
            Some(MediaKind::Audio(Some(AudioFormat::Mp3)))
        );
        let mut ogg = b"OggS\0\x02".to_vec();
        ogg.extend_from_slice(&[0; 22]);
        ogg.extend_from_slice(b"\x01vorbis");
        assert_eq!(
            sniff_bytes(&ogg),
            Some(MediaKind::Audio(Some(AudioFormat::Ogg)))
        );
    }

    #[test]
    fn ogg_theora_is_video() {
        let mut ogg = b"OggS\0\x02".to_vec();
        ogg.extend_from_slice(&[0; 22]);
        ogg.extend_from_slice(b"\x80theora");
        assert_eq!(sniff_bytes(&ogg), Some(MediaKind::Video));
    }

    #[test]
    fn iso_media_brands() {
        let mp4 = b"\0\0\0\x18ftypisom\0\0\0\0".to_vec();
        assert_eq!(sniff_bytes(&mp4), Some(MediaKind::Video));

        let m4a = b"\0\0\0\x18ftypM4A \0\0\0\0".to_vec();
        assert_eq!(sniff_bytes(&m4a), Some(MediaKind::Audio(None)));

        let avif = b"\0\0\0\x18ftypavif\0\0\0\0".to_vec();
        assert_eq!(sniff_bytes(&avif), None);
    }

    #[test]
    fn matroska_is_video() {
        assert_eq!(
            sniff_bytes(&padded(&[0x1A, 0x45, 0xDF, 0xA3])),
            Some(MediaKind::Video)
        );
    }

    #[test]
    fn unknown_and_short_inputs() {
        assert_eq!(sniff_bytes(b"hello world, plain text"), None);
        assert_eq!(sniff_bytes(&[0xFF, 0xD8]), None);
        assert_eq!(sniff_bytes(&[]), None);
    }

    #[test]
    fn extension_is_not_trusted() {
        let tmp = TempDir::new().unwrap();
        let fake = tmp.path().join("song.mp3");
        fs::write(&fake, padded(b"fLaC")).unwrap();
        assert_eq!(
            sniff_file(&fake).unwrap(),
            Some(MediaKind::Audio(Some(AudioFormat::Flac)))
        );

        let text = tmp.path().join("photo.jpg");
        fs::write(&text, "not really a photo").unwrap();
        assert_eq!(sniff_file(&text).unwrap(), None);
    }
}
