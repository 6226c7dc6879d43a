//! # media-batch
//!
//! Batch media conversion for two everyday chores: turning a Markdown
//! document with embedded media tags into a self-contained HTML gallery, and
//! copying a slice of a music library onto a portable player in a format the
//! player understands.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! Both tools share one pipeline. Each stage is an ordinary function over
//! plain data, so stages can be tested without the ones around them:
//!
//! ```text
//! 1. Read      document / track spec  →  references      (what was asked for)
//! 2. Classify  references             →  JobBatch        (what must be done)
//! 3. Execute   JobBatch               →  BatchReport     (doing it, in parallel)
//! 4. Package   work dir               →  dir / zip       (delivering it)
//! ```
//!
//! Classification sniffs file contents, decides a job kind and computes a
//! deterministic destination for every output. Because destinations are
//! deterministic, a rerun sees which outputs already exist and only does the
//! rest.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Stage 1 (gallery): media-tag scanner and reference resolution |
//! | [`library`] | Stage 1 (music): `artist/album/track` patterns expanded against a library |
//! | [`sniff`] | Content-type detection from magic bytes |
//! | [`classify`] | Stage 2: gallery and music job policies, first-wins collision handling |
//! | [`sanitize`] | FAT32-safe path component names |
//! | [`execute`] | Stage 3: copy phase, pooled conversion phase, cancellation, report |
//! | [`staging`] | Per-run staging directory and atomic promotion into place |
//! | [`convert`] | `Converter` trait, ImageMagick/ffmpeg and pure-Rust implementations |
//! | [`render`] | Gallery page: Markdown to HTML with thumbnail snippets |
//! | [`package`] | Stage 4: directory or zip deliverable, auxiliary files, error log |
//! | [`config`] | `media-batch.toml` loading, validation and merged [`config::Settings`] |
//! | [`output`] | CLI output formatting and the progress bar |
//! | [`prompt`] | Interactive questions for the music transfer |
//! | [`interrupt`] | SIGINT/SIGTERM to cancellation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`types`] | Jobs, batches, warnings and media kinds shared by all stages |
//!
//! # Design Decisions
//!
//! ## External Tools Behind a Trait
//!
//! Conversions run ImageMagick and ffmpeg as child processes. They sit behind
//! [`convert::Converter`] so the executor can be tested with a recording fake,
//! and so still images can be handled in-process by the `image` crate when
//! ImageMagick is not installed (`image_backend = "builtin"`).
//!
//! ## Copies First, Then Conversions
//!
//! Copies are I/O-bound and quick, conversions are CPU-bound and slow. Copies
//! run sequentially first, then conversions run on a bounded rayon pool that
//! never exceeds the core count.
//!
//! ## No Partial Files
//!
//! Converters write into a per-run staging directory and the result is
//! renamed into place. Copies go through a hidden sibling file. An
//! interrupted run therefore leaves either a complete output or none, and
//! the next run picks up where it stopped.
//!
//! ## Stop Dispatching, Don't Kill
//!
//! Ctrl-C cancels a token checked before each dispatch. Child processes run
//! in their own process group so they finish their current file. The run
//! reports `Cancelled` and keeps everything already done.

pub mod classify;
pub mod config;
pub mod convert;
pub mod document;
pub mod execute;
pub mod interrupt;
pub mod library;
pub mod logging;
pub mod output;
pub mod package;
pub mod prompt;
pub mod render;
pub mod sanitize;
pub mod sniff;
pub mod staging;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
