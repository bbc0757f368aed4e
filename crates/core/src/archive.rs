//! ZIP packaging and unpacking of a backup working directory, with
//! zip-slip and decompression-exhaustion guards on the read side.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::CompressionLevel;
use crate::error::{Error, Result};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Progress callback: (files processed, total files), invoked after each
/// archive entry is written or extracted.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// Pack every file under `source_dir` into `dest_zip`, preserving relative
/// paths. A partial archive left behind by a failure is removed.
pub fn pack(
    source_dir: &Path,
    dest_zip: &Path,
    level: CompressionLevel,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<()> {
    match pack_inner(source_dir, dest_zip, level, &mut progress) {
        Ok(()) => Ok(()),
        Err(e) => {
            // No dangling partial archives.
            let _ = fs::remove_file(dest_zip);
            Err(e)
        }
    }
}

fn pack_inner(
    source_dir: &Path,
    dest_zip: &Path,
    level: CompressionLevel,
    progress: &mut Option<ProgressFn<'_>>,
) -> Result<()> {
    let write_err = |message: String| Error::ArchiveWrite {
        path: dest_zip.to_path_buf(),
        message,
    };

    // Sorted traversal keeps entry order (and the archive bytes) stable.
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    let total = files.len();

    let file = File::create(dest_zip).map_err(|e| write_err(e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level.deflate_level()))
        .unix_permissions(0o644);

    for (done, path) in files.iter().enumerate() {
        let rel = path
            .strip_prefix(source_dir)
            .map_err(|_| write_err(format!("file outside source dir: {}", path.display())))?;
        let entry_name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(&entry_name, options)
            .map_err(|e| write_err(format!("entry {entry_name}: {e}")))?;
        let mut src = File::open(path)?;
        std::io::copy(&mut src, &mut zip).map_err(|e| write_err(format!("entry {entry_name}: {e}")))?;

        if let Some(cb) = progress.as_mut() {
            cb(done + 1, total);
        }
    }

    zip.finish().map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

/// Extract `zip_path` into `dest_dir`. Every entry path is validated before
/// anything is written: parent-directory segments, absolute paths, and
/// anything resolving outside `dest_dir` fail with `PathTraversal`, and the
/// archive's declared uncompressed size is checked against available disk
/// space first. Returns the number of files extracted.
pub fn unpack(
    zip_path: &Path,
    dest_dir: &Path,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<usize> {
    let file = File::open(zip_path)?;
    let mut zip =
        ZipArchive::new(file).map_err(|e| Error::CorruptArchive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;

    // Validation pass: reject traversal and oversized archives before any
    // entry touches the filesystem.
    let mut entries: Vec<(PathBuf, bool)> = Vec::with_capacity(zip.len());
    let mut declared_size: u64 = 0;
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| Error::CorruptArchive(e.to_string()))?;
        let rel = entry_relative_path(entry.name())?;
        let out = dest_dir.join(&rel);
        if !out.starts_with(dest_dir) {
            return Err(Error::PathTraversal(entry.name().to_string()));
        }
        declared_size = declared_size.saturating_add(entry.size());
        entries.push((out, entry.is_dir()));
    }

    let available = fs2::available_space(dest_dir)?;
    if declared_size > available {
        return Err(Error::InsufficientStorage {
            needed: declared_size,
            available,
        });
    }

    let total = entries.iter().filter(|(_, is_dir)| !is_dir).count();
    let mut extracted = 0usize;
    for (i, (out, is_dir)) in entries.iter().enumerate() {
        if *is_dir {
            fs::create_dir_all(out)?;
            continue;
        }
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::CorruptArchive(e.to_string()))?;
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut dest = File::create(out)?;
        std::io::copy(&mut entry, &mut dest)?;
        extracted += 1;
        if let Some(cb) = progress.as_mut() {
            cb(extracted, total);
        }
    }

    Ok(extracted)
}

/// Check the leading bytes for the ZIP local-file signature.
pub fn has_zip_signature(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(_) => Ok(false), // shorter than 4 bytes
    }
}

/// Reduce an archive entry name to a safe relative path: only normal
/// components are allowed.
fn entry_relative_path(name: &str) -> Result<PathBuf> {
    let mut rel = PathBuf::new();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(c) => rel.push(c),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(name.to_string()));
            }
        }
    }
    if rel.as_os_str().is_empty() {
        return Err(Error::PathTraversal(name.to_string()));
    }
    Ok(rel)
}
