use clap::{Args, Parser, Subcommand};
use media_batch::classify::{self, MusicPolicy};
use media_batch::config::{self, Overrides, Settings};
use media_batch::convert::ExternalConverter;
use media_batch::execute::{self, BatchReport, ExecuteOptions, PoolMode};
use media_batch::types::{AudioFormat, Job, JobBatch, JobKind};
use media_batch::{document, interrupt, library, logging, output, package, prompt, render};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

type CliResult = Result<ExitCode, Box<dyn Error>>;

/// Flags shared by both tools.
#[derive(Args, Clone)]
struct RunArgs {
    /// Redo outputs that already exist instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Number of parallel conversions (capped at the CPU count)
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,

    /// Write failed jobs to <output>.errors.log
    #[arg(long)]
    error_log: bool,
}

#[derive(Parser)]
#[command(name = "media-batch")]
#[command(about = "Batch media conversion: HTML galleries and music transfers")]
#[command(long_about = "\
Batch media conversion: HTML galleries and music transfers

gallery: turns a Markdown document into an HTML gallery.

  !![Dawn at the lake](photos/dawn.jpg)   thumbnail linking to the full image
  ![Clip](video/swim.mp4)                 same, for any image, video or audio
  !banner[Title](header.png)              full-width image, no thumbnail
  [trip notes](notes.pdf)                 local file, copied next to the page

  Outputs are collected in a work directory that is kept between runs, so a
  rebuild only converts what is missing.

music: copies a selection of a music library to a player, converting tracks
the player cannot play. The selection file has one artist/album/track line
per entry; missing parts and * match anything:

  Rolling Stones/Sticky Fingers
  Miles Davis/*/So What
  Nina Simone

Run 'media-batch gen-config' to generate a documented media-batch.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./media-batch.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GalleryArgs {
    /// Markdown document with media tags
    input: PathBuf,

    /// Thumbnail edge in pixels
    thumb: Option<u32>,

    /// Longer edge of full-size images in pixels
    full: Option<u32>,

    /// Output directory (default: input path without extension)
    package: Option<PathBuf>,

    /// Literal `zip` to write <package>.zip instead of a directory
    #[arg(value_parser = ["zip"])]
    zip: Option<String>,

    /// Convert one file at a time
    #[arg(long)]
    sequential: bool,

    /// Work directory (default: <tmp>/media-batch-<package>)
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args)]
struct MusicArgs {
    /// Selection file, one artist/album/track per line
    spec: PathBuf,

    /// Target directory on the player
    target: PathBuf,

    /// Library root the selection is matched against
    #[arg(long, default_value = ".", value_name = "DIR")]
    library: PathBuf,

    /// Formats the player accepts (skips the prompt), e.g. --formats ogg,mp3
    #[arg(long, value_delimiter = ',', value_name = "FORMAT")]
    formats: Option<Vec<String>>,

    /// Empty a non-empty target first (skips the prompt)
    #[arg(long, conflicts_with = "no_clean")]
    clean: bool,

    /// Keep the target's contents (skips the prompt)
    #[arg(long)]
    no_clean: bool,

    /// Answer every remaining prompt with its default
    #[arg(long, short)]
    yes: bool,

    /// Write the batch report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Build an HTML gallery from a Markdown document
    Gallery(GalleryArgs),
    /// Transfer part of a music library to a player
    Music(MusicArgs),
    /// Print a stock media-batch.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Command::Gallery(args) => {
            let overrides = Overrides {
                thumb_size: args.thumb,
                full_size: args.full,
                workers: args.run.jobs,
                sequential: args.sequential,
                overwrite: args.run.overwrite,
            };
            let settings = load_settings(cli.config.as_deref(), &overrides)?;
            run_gallery(&args, &settings)
        }
        Command::Music(args) => {
            let overrides = Overrides {
                workers: args.run.jobs,
                overwrite: args.run.overwrite,
                ..Overrides::default()
            };
            let settings = load_settings(cli.config.as_deref(), &overrides)?;
            run_music(&args, &settings)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_settings(path: Option<&Path>, overrides: &Overrides) -> Result<Settings, Box<dyn Error>> {
    let config = config::load_config(path)?;
    Ok(Settings::merge(config, overrides)?)
}

fn cancelled() -> ExitCode {
    println!("Cancelled");
    ExitCode::from(interrupt::EXIT_CANCELLED as u8)
}

/// Which external tools the pending jobs will call: (images, ffmpeg).
fn tools_needed<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> (bool, bool) {
    jobs.into_iter()
        .fold((false, false), |(images, ffmpeg), job| match job.kind {
            JobKind::Copy => (images, ffmpeg),
            JobKind::ImageResize { .. } | JobKind::ImageThumbnail { .. } => (true, ffmpeg),
            JobKind::VideoThumbnail { .. }
            | JobKind::AudioThumbnail { .. }
            | JobKind::AudioTranscode { .. } => (images, true),
        })
}

/// Execute with a progress bar on its own printer thread.
fn run_batch(
    batch: &JobBatch,
    converter: &ExternalConverter,
    options: &ExecuteOptions,
    cancel: &CancellationToken,
) -> Result<BatchReport, Box<dyn Error>> {
    let pending = batch
        .jobs
        .iter()
        .filter(|job| options.overwrite || !job.is_satisfied());
    let (images, ffmpeg) = tools_needed(pending);
    converter.check_tools(images, ffmpeg)?;

    let (tx, printer) = output::spawn_progress(batch.len());
    let report = execute::execute(batch, converter, options, cancel, Some(tx));
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
    Ok(report?)
}

fn write_error_log(
    enabled: bool,
    output_path: &Path,
    report: &BatchReport,
) -> Result<(), Box<dyn Error>> {
    if !enabled {
        return Ok(());
    }
    let log_path = package::error_log_path(output_path);
    if let Some(path) = package::write_error_log(&log_path, &report.errors)? {
        println!("Errors written to {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Gallery
// ============================================================================

fn run_gallery(args: &GalleryArgs, settings: &Settings) -> CliResult {
    println!("==> Reading {}", args.input.display());
    let doc = document::read_document(&args.input)?;
    output::print_warnings(&doc.warnings);

    let package_path = args
        .package
        .clone()
        .unwrap_or_else(|| args.input.with_extension(""));
    let package_name = package_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "gallery".to_string());
    let work_dir = args
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("media-batch-{package_name}")));
    fs::create_dir_all(&work_dir)
        .map_err(|e| format!("Cannot write to directory {}: {e}", work_dir.display()))?;

    let plan = classify::classify_gallery(&doc.media, &work_dir, &settings.gallery);
    output::print_warnings(&plan.warnings);
    let satisfied = if settings.overwrite {
        0
    } else {
        plan.batch.jobs.iter().filter(|j| j.is_satisfied()).count()
    };
    output::print_plan(&plan.batch, satisfied);

    let options = ExecuteOptions {
        overwrite: settings.overwrite,
        mode: if settings.sequential {
            PoolMode::Sequential
        } else {
            PoolMode::Parallel(config::effective_workers(settings.workers))
        },
        staging_dir: settings.staging_dir.clone(),
    };
    let converter = ExternalConverter::new(&settings.tools);
    let cancel = CancellationToken::new();
    interrupt::install(cancel.clone())?;

    let report = run_batch(&plan.batch, &converter, &options, &cancel)?;
    let target = package::PackageTarget::new(&package_path, args.zip.is_some());

    if report.is_cancelled() {
        output::print_summary(&report);
        println!("Work directory kept at {}", work_dir.display());
        return Ok(ExitCode::from(interrupt::EXIT_CANCELLED as u8));
    }

    println!("==> Packaging {}", target.path().display());
    let base = args.input.parent().unwrap_or_else(|| Path::new(""));
    let copies = package::copy_auxiliary(&doc.auxiliary, &work_dir, &plan.batch);
    output::print_warnings(&copies.warnings);
    let html = render::render_page(&doc.tokens, &plan, &copies.names, base, &package_name);
    package::write_page(&work_dir, &html)?;
    package::package(&work_dir, &target)?;

    write_error_log(args.run.error_log, target.path(), &report)?;
    output::print_summary(&report);
    println!("==> Gallery written to {}", target.path().display());
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Music
// ============================================================================

/// Allowed formats from the config, best first, without duplicates.
fn allowed_formats(configured: &[AudioFormat]) -> Vec<AudioFormat> {
    let mut allowed = configured.to_vec();
    allowed.sort();
    allowed.dedup();
    allowed
}

fn join_formats(formats: &[AudioFormat]) -> String {
    formats
        .iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_music(args: &MusicArgs, settings: &Settings) -> CliResult {
    document::check_input_file(&args.spec)?;
    if args.target.exists() && !args.target.is_dir() {
        return Err(format!("'{}' is not a directory.", args.target.display()).into());
    }
    let theme = prompt::theme();

    let allowed = allowed_formats(&settings.music.formats);
    let approved = match prompt::preset_formats(args.formats.as_deref(), args.yes, &allowed) {
        Some(formats) => formats,
        None => match prompt::ask_formats(&theme, &allowed)? {
            Some(formats) => formats,
            None => return Ok(cancelled()),
        },
    };
    if approved.is_empty() {
        return Err("No supported format? That's not going to work out, sorry.".into());
    }
    println!("Okay, we will use formats {}.", join_formats(&approved));

    let selection = library::read_spec(&args.spec, &args.library)?;
    output::print_warnings(&selection.warnings);
    let policy = MusicPolicy {
        approved,
        quality: settings.music.quality,
        max_name_length: settings.music.max_name_length,
    };
    let mut plan = classify::classify_music(&selection.files, &args.target, &policy);
    output::print_warnings(&plan.warnings);
    if plan.batch.is_empty() {
        return Err("We did not find any files to copy; check your selection!".into());
    }

    let mut overwrite = settings.overwrite;
    if !args.target.exists() {
        fs::create_dir_all(&args.target)?;
    } else if package::has_entries(&args.target)? {
        let clean = if args.clean || args.no_clean || args.yes {
            args.clean
        } else {
            let question = format!(
                "Target directory '{}' is not empty. Should we clean it?",
                args.target.display()
            );
            match prompt::confirm(&theme, &question, false)? {
                Some(answer) => answer,
                None => return Ok(cancelled()),
            }
        };
        if clean {
            package::clean_directory(&args.target)?;
            println!("'{}' is now empty.", args.target.display());
        } else if !overwrite && !args.yes {
            let question = "Okay, no cleaning. But should we overwrite existing files?";
            match prompt::confirm(&theme, question, false)? {
                Some(answer) => overwrite = answer,
                None => return Ok(cancelled()),
            }
        }
    }

    let already = if overwrite {
        0
    } else {
        plan.batch.retain_unsatisfied()
    };
    if plan.batch.is_empty() {
        println!("All files are already there, so there is nothing left to do!");
        return Ok(ExitCode::SUCCESS);
    }
    output::print_plan(&plan.batch, already);

    let conversions = plan.batch.conversion_count();
    println!(
        "We will transfer {} files, {} of which will be converted first.",
        plan.batch.len(),
        conversions
    );
    if !args.yes {
        match prompt::confirm(&theme, "This may take a while. Continue?", true)? {
            Some(true) => {}
            Some(false) => return Ok(ExitCode::SUCCESS),
            None => return Ok(cancelled()),
        }
    }

    let mode = if conversions == 0 {
        PoolMode::Sequential
    } else {
        let requested = match settings.workers {
            Some(n) => Some(n),
            None if args.yes => None,
            None => match prompt::ask_workers(&theme, config::available_cores())? {
                Some(n) => Some(n),
                None => return Ok(cancelled()),
            },
        };
        PoolMode::Parallel(config::effective_workers(requested))
    };
    let options = ExecuteOptions {
        overwrite,
        mode,
        staging_dir: settings.staging_dir.clone(),
    };

    // From here on Ctrl-C stops dispatching instead of killing the process.
    let converter = ExternalConverter::new(&settings.tools);
    let cancel = CancellationToken::new();
    interrupt::install(cancel.clone())?;
    let report = run_batch(&plan.batch, &converter, &options, &cancel)?;

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }
    write_error_log(args.run.error_log, &args.target, &report)?;
    output::print_summary(&report);

    if report.is_cancelled() {
        return Ok(ExitCode::from(interrupt::EXIT_CANCELLED as u8));
    }
    println!("Your music awaits you, have fun!");
    Ok(ExitCode::SUCCESS)
}
