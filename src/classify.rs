//! Job classification: references in, ordered job batches out.
//!
//! Media type comes from content sniffing ([`crate::sniff`]). Every job gets
//! a deterministic destination computed from its source and the active
//! settings, so a re-run with the same inputs produces the same batch and
//! the executor can skip what already exists.
//!
//! ## Gallery outputs
//!
//! Outputs land flat in the work directory. For `dir/name.ext`:
//!
//! | Source | Jobs |
//! |---|---|
//! | still image | resize → `name.ext`, thumbnail → `name_thumb.ext` |
//! | animated image | resize → `name.ext`, first-frame thumbnail → `name_thumb.jpg` |
//! | video | copy → `name.ext`, frame thumbnail → `name_thumb.jpg` |
//! | audio | copy → `name.ext`, cover-art thumbnail → `name_thumb.jpg` |
//! | banner (images only) | resize → `name.ext` |
//!
//! ## Destination collisions
//!
//! The first job in batch order keeps a destination. A later job from a
//! different source that maps to the same destination is dropped with a
//! warning naming both sources. The same source referenced twice simply
//! reuses the earlier jobs.

use crate::config::GalleryConfig;
use crate::document::{Marker, Reference};
use crate::library::LibraryFile;
use crate::sanitize::sanitize_relative;
use crate::sniff::sniff_file;
use crate::types::{AudioFormat, Job, JobBatch, JobKind, MediaKind, Warning};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Thumbnails of animations, videos and audio are always JPEG.
const MOVING_THUMB_EXT: &str = "jpg";

/// Output names for one gallery reference, relative to the work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub full: String,
    /// `None` for banners.
    pub thumb: Option<String>,
}

/// Classified gallery.
#[derive(Debug, Clone, Default)]
pub struct GalleryPlan {
    pub batch: JobBatch,
    pub warnings: Vec<Warning>,
    /// Output names keyed by resolved source path and marker, for the page
    /// renderer.
    pub entries: BTreeMap<(PathBuf, bool), PageEntry>,
}

impl GalleryPlan {
    /// Page entry for a resolved reference, if it made it into the batch.
    pub fn entry(&self, source: &Path, marker: Marker) -> Option<&PageEntry> {
        self.entries.get(&(source.to_path_buf(), marker == Marker::Banner))
    }
}

/// Classified music transfer.
#[derive(Debug, Clone, Default)]
pub struct MusicPlan {
    pub batch: JobBatch,
    pub warnings: Vec<Warning>,
}

/// Batch under construction with first-wins destination ownership.
#[derive(Default)]
struct Collector {
    jobs: Vec<Job>,
    owners: HashMap<PathBuf, usize>,
    warnings: Vec<Warning>,
    /// Destinations differing only in case collide (FAT32 targets).
    fold_case: bool,
}

impl Collector {
    fn case_insensitive() -> Self {
        Self {
            fold_case: true,
            ..Self::default()
        }
    }

    fn key(&self, destination: &Path) -> PathBuf {
        if self.fold_case {
            PathBuf::from(destination.to_string_lossy().to_lowercase())
        } else {
            destination.to_path_buf()
        }
    }

    /// Try to add all `jobs` as a unit. If any destination is owned by a
    /// different source, none are added and a warning is recorded.
    fn offer(&mut self, jobs: Vec<Job>) -> bool {
        let mut fresh = Vec::with_capacity(jobs.len());
        for job in jobs {
            match self.owners.get(&self.key(&job.destination)) {
                Some(&i) if self.jobs[i].source == job.source && self.jobs[i].kind == job.kind => {
                    // Same source referenced again: already scheduled.
                }
                Some(&i) => {
                    self.warnings.push(Warning::for_path(
                        &job.source,
                        format!(
                            "destination {} is already produced from {}, skipping",
                            job.destination.display(),
                            self.jobs[i].source.display()
                        ),
                    ));
                    return false;
                }
                None => fresh.push(job),
            }
        }
        for job in fresh {
            self.owners.insert(self.key(&job.destination), self.jobs.len());
            self.jobs.push(job);
        }
        true
    }

    fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

/// Split a source file name into stem and extension.
fn name_parts(source: &Path) -> (String, Option<String>) {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_string());
    (stem, ext)
}

fn with_ext(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

fn describe(kind: &Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Image { .. }) => "image",
        Some(MediaKind::Video) => "video",
        Some(MediaKind::Audio(_)) => "audio",
        None => "unknown",
    }
}

/// Build the gallery batch for resolved document references.
pub fn classify_gallery(
    references: &[Reference],
    work_dir: &Path,
    config: &GalleryConfig,
) -> GalleryPlan {
    let mut collector = Collector::default();
    let mut entries = BTreeMap::new();

    for reference in references {
        let source = &reference.path;
        let kind = match sniff_file(source) {
            Ok(kind) => kind,
            Err(e) => {
                collector.warn(Warning::for_path(source, format!("cannot read: {e}")));
                continue;
            }
        };
        let Some(plan) = gallery_jobs(source, reference.marker, kind, work_dir, config) else {
            let message = match reference.marker {
                Marker::Banner => format!("banners must be images, found {}", describe(&kind)),
                Marker::Gallery => "unsupported media type".to_string(),
            };
            collector.warn(Warning::for_path(source, message));
            continue;
        };

        let (jobs, entry) = plan;
        if collector.offer(jobs) {
            entries.insert(
                (source.clone(), reference.marker == Marker::Banner),
                entry,
            );
        }
    }

    GalleryPlan {
        batch: JobBatch {
            jobs: collector.jobs,
        },
        warnings: collector.warnings,
        entries,
    }
}

fn gallery_jobs(
    source: &Path,
    marker: Marker,
    kind: Option<MediaKind>,
    work_dir: &Path,
    config: &GalleryConfig,
) -> Option<(Vec<Job>, PageEntry)> {
    let (stem, ext) = name_parts(source);
    let full = with_ext(&stem, ext.as_deref());
    let thumb_stem = format!("{stem}_thumb");

    let resize = JobKind::ImageResize {
        max_edge: config.full_size,
        quality: config.quality,
    };
    let job = |name: &str, kind: JobKind| Job::new(source, work_dir.join(name), kind);

    let (jobs, thumb) = match (marker, kind?) {
        (Marker::Banner, MediaKind::Image { .. }) => (vec![job(&full, resize)], None),
        (Marker::Banner, _) => return None,
        (Marker::Gallery, MediaKind::Image { animated: false }) => {
            let thumb = with_ext(&thumb_stem, ext.as_deref());
            let jobs = vec![
                job(&full, resize),
                job(
                    &thumb,
                    JobKind::ImageThumbnail {
                        size: config.thumb_size,
                        quality: config.quality,
                        first_frame: false,
                        play_overlay: false,
                    },
                ),
            ];
            (jobs, Some(thumb))
        }
        (Marker::Gallery, MediaKind::Image { animated: true }) => {
            let thumb = with_ext(&thumb_stem, Some(MOVING_THUMB_EXT));
            let jobs = vec![
                job(&full, resize),
                job(
                    &thumb,
                    JobKind::ImageThumbnail {
                        size: config.thumb_size,
                        quality: config.quality,
                        first_frame: true,
                        play_overlay: config.play_overlay,
                    },
                ),
            ];
            (jobs, Some(thumb))
        }
        (Marker::Gallery, MediaKind::Video) => {
            let thumb = with_ext(&thumb_stem, Some(MOVING_THUMB_EXT));
            let jobs = vec![
                job(&full, JobKind::Copy),
                job(
                    &thumb,
                    JobKind::VideoThumbnail {
                        size: config.thumb_size,
                        quality: config.quality,
                        play_overlay: config.play_overlay,
                    },
                ),
            ];
            (jobs, Some(thumb))
        }
        (Marker::Gallery, MediaKind::Audio(_)) => {
            let thumb = with_ext(&thumb_stem, Some(MOVING_THUMB_EXT));
            let jobs = vec![
                job(&full, JobKind::Copy),
                job(
                    &thumb,
                    JobKind::AudioThumbnail {
                        size: config.thumb_size,
                        quality: config.quality,
                        play_overlay: config.play_overlay,
                    },
                ),
            ];
            (jobs, Some(thumb))
        }
    };

    Some((jobs, PageEntry { full, thumb }))
}

/// Music transfer settings used by the classifier.
#[derive(Debug, Clone)]
pub struct MusicPolicy {
    /// Formats the device accepts. Order does not matter; preference is
    /// always [`AudioFormat::ALL`] order.
    pub approved: Vec<AudioFormat>,
    pub quality: u8,
    pub max_name_length: usize,
}

impl MusicPolicy {
    /// Best approved format, if any are approved.
    pub fn best(&self) -> Option<AudioFormat> {
        self.approved.iter().copied().min()
    }

    /// What to do with a source in `format`: copy it, or transcode into the
    /// best approved format.
    pub fn plan_for(&self, format: AudioFormat) -> Option<JobKind> {
        if self.approved.contains(&format) {
            return Some(JobKind::Copy);
        }
        self.best().map(|to| JobKind::AudioTranscode {
            from: format,
            to,
            quality: self.quality,
        })
    }
}

/// Build the music batch for selected library files.
pub fn classify_music(files: &[LibraryFile], target: &Path, policy: &MusicPolicy) -> MusicPlan {
    let mut collector = Collector::case_insensitive();

    if policy.best().is_none() {
        collector.warn(Warning::new("formats", "no formats approved, nothing to transfer"));
        return MusicPlan {
            batch: JobBatch::default(),
            warnings: collector.warnings,
        };
    }

    for file in files {
        let format = match sniff_file(&file.path) {
            Ok(Some(MediaKind::Audio(Some(format)))) => format,
            Ok(Some(MediaKind::Audio(None))) => {
                collector.warn(Warning::for_path(&file.path, "unsupported audio format"));
                continue;
            }
            Ok(other) => {
                collector.warn(Warning::for_path(
                    &file.path,
                    format!("not an audio file ({})", describe(&other)),
                ));
                continue;
            }
            Err(e) => {
                collector.warn(Warning::for_path(&file.path, format!("cannot read: {e}")));
                continue;
            }
        };

        let Some(kind) = policy.plan_for(format) else {
            continue;
        };
        let mut relative = sanitize_relative(&file.relative, policy.max_name_length);
        if let JobKind::AudioTranscode { to, .. } = &kind {
            relative.set_extension(to.extension());
        }
        collector.offer(vec![Job::new(&file.path, target.join(relative), kind)]);
    }

    MusicPlan {
        batch: JobBatch {
            jobs: collector.jobs,
        },
        warnings: collector.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{expand, parse_spec};
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn reference(marker: Marker, path: PathBuf) -> Reference {
        Reference {
            marker,
            description: "desc".into(),
            path,
        }
    }

    fn policy(approved: &[AudioFormat]) -> MusicPolicy {
        MusicPolicy {
            approved: approved.to_vec(),
            quality: 6,
            max_name_length: 50,
        }
    }

    #[test]
    fn still_image_gets_resize_and_same_format_thumbnail() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let photo = write_fixture(src.path(), "photos/dawn.png", PNG);

        let plan = classify_gallery(
            &[reference(Marker::Gallery, photo.clone())],
            work.path(),
            &GalleryConfig::default(),
        );

        assert_eq!(destination_names(&plan.batch), vec!["dawn.png", "dawn_thumb.png"]);
        assert_eq!(
            find_job(&plan.batch, "dawn.png").kind,
            JobKind::ImageResize {
                max_edge: 2000,
                quality: 90
            }
        );
        assert_eq!(
            find_job(&plan.batch, "dawn_thumb.png").kind,
            JobKind::ImageThumbnail {
                size: 100,
                quality: 90,
                first_frame: false,
                play_overlay: false
            }
        );
        assert_eq!(find_job(&plan.batch, "dawn.png").destination, work.path().join("dawn.png"));
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn animated_gif_gets_jpeg_thumbnail_with_overlay() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let gif = write_fixture(src.path(), "photo.gif", ANIMATED_GIF);

        let plan = classify_gallery(
            &[reference(Marker::Gallery, gif)],
            work.path(),
            &GalleryConfig::default(),
        );

        assert_eq!(destination_names(&plan.batch), vec!["photo.gif", "photo_thumb.jpg"]);
        assert_eq!(
            find_job(&plan.batch, "photo_thumb.jpg").kind,
            JobKind::ImageThumbnail {
                size: 100,
                quality: 90,
                first_frame: true,
                play_overlay: true
            }
        );
    }

    #[test]
    fn still_gif_is_treated_as_still_image() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let gif = write_fixture(src.path(), "icon.gif", STILL_GIF);

        let plan = classify_gallery(
            &[reference(Marker::Gallery, gif)],
            work.path(),
            &GalleryConfig::default(),
        );
        assert_eq!(destination_names(&plan.batch), vec!["icon.gif", "icon_thumb.gif"]);
    }

    #[test]
    fn video_and_audio_are_copied_with_thumbnails() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let video = write_fixture(src.path(), "clip.mp4", MP4);
        let song = write_fixture(src.path(), "song.mp3", MP3);
        let config = GalleryConfig {
            play_overlay: false,
            ..GalleryConfig::default()
        };

        let plan = classify_gallery(
            &[
                reference(Marker::Gallery, video),
                reference(Marker::Gallery, song),
            ],
            work.path(),
            &config,
        );

        assert_eq!(
            destination_names(&plan.batch),
            vec!["clip.mp4", "clip_thumb.jpg", "song.mp3", "song_thumb.jpg"]
        );
        assert_eq!(find_job(&plan.batch, "clip.mp4").kind, JobKind::Copy);
        assert!(matches!(
            find_job(&plan.batch, "clip_thumb.jpg").kind,
            JobKind::VideoThumbnail {
                play_overlay: false,
                ..
            }
        ));
        assert!(matches!(
            find_job(&plan.batch, "song_thumb.jpg").kind,
            JobKind::AudioThumbnail { .. }
        ));
    }

    #[test]
    fn banner_is_resize_only_and_images_only() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let header = write_fixture(src.path(), "header.jpg", JPEG);
        let video = write_fixture(src.path(), "intro.mp4", MP4);

        let plan = classify_gallery(
            &[
                reference(Marker::Banner, header.clone()),
                reference(Marker::Banner, video),
            ],
            work.path(),
            &GalleryConfig::default(),
        );

        assert_eq!(destination_names(&plan.batch), vec!["header.jpg"]);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].message.contains("banners must be images"));
        assert_eq!(
            plan.entry(&header, Marker::Banner),
            Some(&PageEntry {
                full: "header.jpg".into(),
                thumb: None
            })
        );
    }

    #[test]
    fn unsupported_media_is_reported_and_excluded() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let notes = write_fixture(src.path(), "notes.jpg", TEXT);

        let plan = classify_gallery(
            &[reference(Marker::Gallery, notes)],
            work.path(),
            &GalleryConfig::default(),
        );
        assert!(plan.batch.is_empty());
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.entries.is_empty());
    }

    #[test]
    fn first_source_wins_a_destination() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let a = write_fixture(src.path(), "a/x.jpg", JPEG);
        let b = write_fixture(src.path(), "b/x.jpg", JPEG);

        let plan = classify_gallery(
            &[
                reference(Marker::Gallery, a.clone()),
                reference(Marker::Gallery, b.clone()),
            ],
            work.path(),
            &GalleryConfig::default(),
        );

        assert_eq!(plan.batch.len(), 2);
        assert!(plan.batch.jobs.iter().all(|j| j.source == a));
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].message.contains(&a.display().to_string()));
        assert_eq!(plan.warnings[0].subject, b.display().to_string());
        assert!(plan.entry(&b, Marker::Gallery).is_none());
    }

    #[test]
    fn same_source_twice_is_scheduled_once() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let a = write_fixture(src.path(), "x.jpg", JPEG);

        let plan = classify_gallery(
            &[
                reference(Marker::Gallery, a.clone()),
                reference(Marker::Gallery, a.clone()),
            ],
            work.path(),
            &GalleryConfig::default(),
        );
        assert_eq!(plan.batch.len(), 2);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn classification_is_deterministic() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let refs = vec![
            reference(Marker::Gallery, write_fixture(src.path(), "a.jpg", JPEG)),
            reference(Marker::Gallery, write_fixture(src.path(), "b.gif", ANIMATED_GIF)),
            reference(Marker::Banner, write_fixture(src.path(), "c.png", PNG)),
        ];
        let first = classify_gallery(&refs, work.path(), &GalleryConfig::default());
        let second = classify_gallery(&refs, work.path(), &GalleryConfig::default());
        assert_eq!(first.batch.jobs, second.batch.jobs);
    }

    #[test]
    fn music_policy_prefers_copy_then_best_approved() {
        let p = policy(&[AudioFormat::Mp3, AudioFormat::Ogg]);
        assert_eq!(p.best(), Some(AudioFormat::Ogg));
        assert_eq!(p.plan_for(AudioFormat::Mp3), Some(JobKind::Copy));
        assert_eq!(
            p.plan_for(AudioFormat::Flac),
            Some(JobKind::AudioTranscode {
                from: AudioFormat::Flac,
                to: AudioFormat::Ogg,
                quality: 6
            })
        );
    }

    #[test]
    fn stones_dirty_transfer_to_mp3_device() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "Rolling Stones/Dirty Work/track1.flac", FLAC);
        write_fixture(lib.path(), "Rolling Stones/Dirty Work/track2.mp3", MP3);
        write_fixture(lib.path(), "Rolling Stones/Sticky Fingers/sway.ogg", OGG_VORBIS);

        let (patterns, _) = parse_spec("Stones/Dirty");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[AudioFormat::Mp3]));

        assert!(plan.warnings.is_empty());
        assert_eq!(plan.batch.len(), 2);
        let track1 = find_job(&plan.batch, "track1.mp3");
        assert_eq!(
            track1.destination,
            target.path().join("Rolling Stones/Dirty Work/track1.mp3")
        );
        assert_eq!(
            track1.kind,
            JobKind::AudioTranscode {
                from: AudioFormat::Flac,
                to: AudioFormat::Mp3,
                quality: 6
            }
        );
        assert_eq!(find_job(&plan.batch, "track2.mp3").kind, JobKind::Copy);
    }

    #[test]
    fn music_destinations_are_sanitized() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "AC:DC/Back? In Black/Hells Bells.flac", FLAC);

        let (patterns, _) = parse_spec("AC");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[AudioFormat::Flac]));

        assert_eq!(
            plan.batch.jobs[0].destination,
            target.path().join("ACDC/Back In Black/Hells Bells.flac")
        );
    }

    #[test]
    fn music_collisions_after_sanitizing_keep_first() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "A/B/song.flac", FLAC);
        write_fixture(lib.path(), "A/B/song.mp3", MP3);

        let (patterns, _) = parse_spec("A");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[AudioFormat::Ogg]));

        // Both transcode to song.ogg; song.flac sorts first.
        assert_eq!(plan.batch.len(), 1);
        assert!(plan.batch.jobs[0].source.ends_with("song.flac"));
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn music_destinations_differing_in_case_collide() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "A/B/So:ng.flac", FLAC);
        write_fixture(lib.path(), "A/B/song.flac", FLAC);

        let (patterns, _) = parse_spec("A");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[AudioFormat::Flac]));

        // Song.flac and song.flac are one file on the player.
        assert_eq!(plan.batch.len(), 1);
        assert_eq!(
            plan.batch.jobs[0].destination,
            target.path().join("A/B/Song.flac")
        );
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].subject.ends_with("song.flac"));
    }

    #[test]
    fn music_rejects_non_audio_and_unsupported_audio() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "A/B/fake.mp3", JPEG);
        write_fixture(lib.path(), "A/B/pcm.flac", WAV);

        let (patterns, _) = parse_spec("A");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[AudioFormat::Mp3]));

        assert!(plan.batch.is_empty());
        assert_eq!(plan.warnings.len(), 2);
    }

    #[test]
    fn music_without_approved_formats_schedules_nothing() {
        let lib = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_fixture(lib.path(), "A/B/song.flac", FLAC);

        let (patterns, _) = parse_spec("A");
        let selection = expand(&patterns, lib.path());
        let plan = classify_music(&selection.files, target.path(), &policy(&[]));
        assert!(plan.batch.is_empty());
        assert_eq!(plan.warnings.len(), 1);
    }
}
