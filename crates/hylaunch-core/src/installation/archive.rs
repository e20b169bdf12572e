//! Zip and tar+gzip extraction guarded against path traversal
//!
//! Every entry path is resolved lexically against the destination before
//! anything is written. An archive with a single escaping entry is rejected as
//! a whole, so a failed extraction leaves no partial output behind from that
//! archive's well-formed entries.

use crate::errors::PipelineError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Archive formats the pipeline knows how to unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from the file name
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_ascii_lowercase())
            .ok_or_else(|| {
                PipelineError::Archive(format!("Invalid archive file name: {}", path.display()))
            })?;

        if name.ends_with(".zip") || name.ends_with(".jar") {
            Ok(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else {
            Err(PipelineError::Archive(format!(
                "Unsupported archive format: {}",
                name
            )))
        }
    }
}

/// Extract `archive` into `destination`, flattening a single top-level directory
pub fn extract(archive: &Path, destination: &Path) -> Result<(), PipelineError> {
    let format = ArchiveFormat::from_path(archive)?;
    extract_format(archive, destination, format, true)
}

pub fn extract_format(
    archive: &Path,
    destination: &Path,
    format: ArchiveFormat,
    flatten: bool,
) -> Result<(), PipelineError> {
    if !archive.is_file() {
        return Err(PipelineError::ArtifactNotFound {
            path: archive.to_path_buf(),
        });
    }

    log::info!(
        "Extracting {} to {}",
        archive.display(),
        destination.display()
    );
    fs::create_dir_all(destination)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, destination)?,
        ArchiveFormat::TarGz => extract_tar_gz(archive, destination)?,
    }

    if flatten {
        flatten_single_root(destination)?;
    }

    log::debug!("Extraction of {} completed", archive.display());
    Ok(())
}

/// Run extraction on the blocking thread pool
pub async fn extract_async(
    archive: PathBuf,
    destination: PathBuf,
    flatten: bool,
) -> Result<(), PipelineError> {
    tokio::task::spawn_blocking(move || {
        let format = ArchiveFormat::from_path(&archive)?;
        extract_format(&archive, &destination, format, flatten)
    })
    .await
    .map_err(|e| PipelineError::Archive(format!("Extraction task failed: {}", e)))?
}

/// Lexically resolve an entry name under `destination`
///
/// Absolute paths, drive prefixes and `..` components that climb above the
/// destination are rejected.
pub fn resolve_entry(destination: &Path, entry: &str) -> Result<PathBuf, PipelineError> {
    let traversal = || PipelineError::PathTraversal {
        entry: entry.to_string(),
        destination: destination.to_path_buf(),
    };

    let normalized = entry.replace('\\', "/");
    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(traversal());
                }
                relative.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    Ok(destination.join(relative))
}

fn extract_zip(archive_path: &Path, destination: &Path) -> Result<(), PipelineError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut targets = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        targets.push(resolve_entry(destination, entry.name())?);
    }

    for (i, outpath) in targets.into_iter().enumerate() {
        let mut entry = archive.by_index(i)?;

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }

    Ok(())
}

fn open_tar(archive_path: &Path) -> Result<tar::Archive<GzDecoder<File>>, PipelineError> {
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    Ok(archive)
}

fn entry_name<R: io::Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn check_link_target<R: io::Read>(
    entry: &tar::Entry<'_, R>,
    outpath: &Path,
    destination: &Path,
) -> Result<(), PipelineError> {
    let Some(link) = entry.link_name_bytes() else {
        return Ok(());
    };
    let link = String::from_utf8_lossy(&link).into_owned();
    let name = entry_name(entry);

    // Symlink targets are relative to the link's directory, hard links to the root
    let base = if entry.header().entry_type().is_symlink() {
        outpath.parent().unwrap_or(destination)
    } else {
        destination
    };
    let relative_base = base.strip_prefix(destination).unwrap_or(Path::new(""));
    let combined = relative_base.join(&link);

    resolve_entry(destination, &combined.to_string_lossy()).map_err(|_| {
        PipelineError::PathTraversal {
            entry: format!("{} -> {}", name, link),
            destination: destination.to_path_buf(),
        }
    })?;
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<(), PipelineError> {
    // First pass validates every entry so nothing is written for a hostile archive
    let mut archive = open_tar(archive_path)?;
    for entry in archive.entries()? {
        let entry = entry?;
        let outpath = resolve_entry(destination, &entry_name(&entry))?;
        check_link_target(&entry, &outpath, destination)?;
    }

    let mut archive = open_tar(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let outpath = resolve_entry(destination, &entry_name(&entry))?;
        if outpath == destination {
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&outpath)?;
    }

    Ok(())
}

/// If `destination` holds exactly one directory, move its children up one level
pub fn flatten_single_root(destination: &Path) -> Result<(), PipelineError> {
    let entries: Vec<_> = fs::read_dir(destination)?.collect::<Result<_, _>>()?;
    if entries.len() != 1 || !entries[0].file_type()?.is_dir() {
        return Ok(());
    }

    let root = entries[0].path();
    log::debug!("Flattening single root directory {}", root.display());

    // Rename first so a child sharing the root's name cannot collide
    let staging = destination.join(".hylaunch-flatten");
    fs::rename(&root, &staging)?;

    for child in fs::read_dir(&staging)? {
        let child = child?;
        fs::rename(child.path(), destination.join(child.file_name()))?;
    }
    fs::remove_dir(&staging)?;

    Ok(())
}
