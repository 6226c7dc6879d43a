//! Packaging: turning the work directory into the deliverable.
//!
//! The gallery work directory holds `index.html`, every converted output and
//! the auxiliary files, all flat. It is kept between runs so a rebuild only
//! redoes what is missing. The deliverable is either a copy of it at the
//! package path (replacing whatever was there) or `<package>.zip` with the
//! same entries at the archive root.
//!
//! Hidden files (`.name.part` leftovers from interrupted copies) are never
//! packaged.
//!
//! For the music transfer the target directory is the deliverable; the only
//! packaging step there is optionally emptying it first.

use crate::execute::JobError;
use crate::staging::copy_into_place;
use crate::types::{JobBatch, Warning};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Cannot write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Cannot walk work directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the finished gallery goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageTarget {
    Directory(PathBuf),
    Zip(PathBuf),
}

impl PackageTarget {
    /// `package` as a directory, or `package.zip` when `zip` is set.
    pub fn new(package: &Path, zip: bool) -> Self {
        if zip {
            let mut name = package.as_os_str().to_owned();
            name.push(".zip");
            PackageTarget::Zip(PathBuf::from(name))
        } else {
            PackageTarget::Directory(package.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            PackageTarget::Directory(p) | PackageTarget::Zip(p) => p,
        }
    }
}

/// File name of the gallery page in the work directory.
pub const PAGE_NAME: &str = "index.html";

/// Write the rendered page as `index.html`.
pub fn write_page(work_dir: &Path, html: &str) -> Result<PathBuf, PackageError> {
    let path = work_dir.join(PAGE_NAME);
    fs::write(&path, html).map_err(io_err(&path))?;
    Ok(path)
}

/// Auxiliary files placed in the work directory.
#[derive(Debug, Default)]
pub struct AuxiliaryCopies {
    /// Flat name of each copied file, keyed by its resolved source.
    pub names: HashMap<PathBuf, String>,
    pub warnings: Vec<Warning>,
}

/// Copy auxiliary files flat into the work directory root.
///
/// A file is skipped with a warning when its base name is already taken by
/// the page, by an output of `batch` or by an earlier auxiliary file. Links
/// to skipped files keep their original target. Existing copies are
/// refreshed.
pub fn copy_auxiliary(files: &[PathBuf], work_dir: &Path, batch: &JobBatch) -> AuxiliaryCopies {
    let mut copies = AuxiliaryCopies::default();
    let mut taken: HashMap<PathBuf, String> = batch
        .jobs
        .iter()
        .map(|job| {
            let owner = format!("the output of {}", job.source.display());
            (job.destination.clone(), owner)
        })
        .collect();
    taken.insert(work_dir.join(PAGE_NAME), "the gallery page".to_string());

    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let destination = work_dir.join(name);
        if let Some(owner) = taken.get(&destination) {
            copies.warnings.push(Warning::for_path(
                file,
                format!("name already used by {owner}, keeping the original link"),
            ));
            continue;
        }
        if let Err(e) = copy_into_place(file, &destination) {
            copies
                .warnings
                .push(Warning::for_path(file, format!("cannot copy: {e}")));
            continue;
        }
        copies
            .names
            .insert(file.clone(), name.to_string_lossy().to_string());
        taken.insert(destination, file.display().to_string());
    }
    copies
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Install the gallery at `target`.
pub fn package(work_dir: &Path, target: &PackageTarget) -> Result<(), PackageError> {
    match target {
        PackageTarget::Directory(dir) => replace_directory(work_dir, dir),
        PackageTarget::Zip(path) => write_zip(work_dir, path),
    }
}

/// Replace `package_dir` with a copy of the work directory.
pub fn replace_directory(work_dir: &Path, package_dir: &Path) -> Result<(), PackageError> {
    if package_dir.is_dir() {
        fs::remove_dir_all(package_dir).map_err(io_err(package_dir))?;
    }
    fs::create_dir_all(package_dir).map_err(io_err(package_dir))?;

    for entry in WalkDir::new(work_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(work_dir) else {
            continue;
        };
        let destination = package_dir.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(io_err(&destination))?;
        } else {
            fs::copy(entry.path(), &destination).map_err(io_err(&destination))?;
        }
    }
    tracing::debug!(dir = %package_dir.display(), "installed gallery directory");
    Ok(())
}

/// Write the work directory as a zip archive, entries at the archive root.
///
/// The archive is assembled under a hidden sibling name and renamed into
/// place when complete.
pub fn write_zip(work_dir: &Path, zip_path: &Path) -> Result<(), PackageError> {
    if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = zip_path.with_file_name(format!(".{name}.part"));

    let result = fill_zip(work_dir, &partial)
        .and_then(|()| fs::rename(&partial, zip_path).map_err(io_err(zip_path)));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn fill_zip(work_dir: &Path, archive: &Path) -> Result<(), PackageError> {
    let file = File::create(archive).map_err(io_err(archive))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(work_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(work_dir) else {
            continue;
        };
        let entry_name = relative
            .iter()
            .map(|c| c.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            zip.add_directory(entry_name, options)?;
        } else {
            zip.start_file(entry_name, options)?;
            let mut source = File::open(entry.path()).map_err(io_err(entry.path()))?;
            io::copy(&mut source, &mut zip).map_err(io_err(archive))?;
        }
    }
    zip.finish()?;
    Ok(())
}

/// Whether `dir` has any entries at all, hidden ones included.
pub fn has_entries(dir: &Path) -> Result<bool, PackageError> {
    let mut entries = fs::read_dir(dir).map_err(io_err(dir))?;
    Ok(entries.next().is_some())
}

/// Remove everything inside `dir`, keeping `dir` itself.
///
/// Returns the number of top-level entries removed.
pub fn clean_directory(dir: &Path) -> Result<usize, PackageError> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path).map_err(io_err(&path))?;
        } else {
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
        removed += 1;
    }
    tracing::info!(dir = %dir.display(), removed, "cleaned target directory");
    Ok(removed)
}

/// Write a human-readable log of job errors. Nothing is written when there
/// are none.
pub fn write_error_log(path: &Path, errors: &[JobError]) -> Result<Option<PathBuf>, PackageError> {
    if errors.is_empty() {
        return Ok(None);
    }
    let mut file = File::create(path).map_err(io_err(path))?;
    for (i, error) in errors.iter().enumerate() {
        if i > 0 {
            writeln!(file).map_err(io_err(path))?;
        }
        writeln!(
            file,
            "{} -> {}\n{}",
            error.source.display(),
            error.destination.display(),
            error.message
        )
        .map_err(io_err(path))?;
    }
    Ok(Some(path.to_path_buf()))
}

/// `<name>.errors.log` next to `output`.
pub fn error_log_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "media-batch".into());
    name.push(".errors.log");
    output.with_file_name(name)
}
