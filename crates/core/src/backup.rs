//! End-to-end export flow: collect state, serialize the manifest, stage
//! photo files, and package everything into a single ZIP archive.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::archive;
use crate::domain::*;
use crate::error::{Error, Result};
use crate::hash;
use crate::manifest;
use crate::store::{now_ms, Store};

/// Export pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    CollectingData,
    WritingMetadata,
    CopyingPhotos,
    Packaging,
    Complete,
}

impl ExportStage {
    /// Human-readable operation label, consumed directly by UI layers.
    pub fn label(&self) -> &'static str {
        match self {
            ExportStage::CollectingData => "Gathering app data",
            ExportStage::WritingMetadata => "Preparing metadata",
            ExportStage::CopyingPhotos => "Copying photos",
            ExportStage::Packaging => "Compressing archive",
            ExportStage::Complete => "Backup complete",
        }
    }
}

/// Progress callback events for the export operation.
pub enum ExportProgress {
    /// A new stage has begun.
    Stage { stage: ExportStage },
    /// A photo file was staged for packaging.
    PhotoCopied { current: usize, total: usize },
    /// An archive entry was written.
    ArchiveEntry { current: usize, total: usize },
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include_photos: bool,
    pub include_thumbnails: bool,
    pub include_settings: bool,
    pub compression_level: CompressionLevel,
    /// Restrict the export to these category ids. Categories not referenced
    /// by any included photo are still exported when explicitly selected.
    pub selected_categories: Option<Vec<String>>,
    /// Inclusive lower bound on photo `created_at`.
    pub date_range_start: Option<i64>,
    /// Exclusive upper bound on photo `created_at`.
    pub date_range_end: Option<i64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_photos: true,
            include_thumbnails: false,
            include_settings: true,
            compression_level: CompressionLevel::default(),
            selected_categories: None,
            date_range_start: None,
            date_range_end: None,
        }
    }
}

impl ExportOptions {
    fn has_filters(&self) -> bool {
        self.selected_categories.is_some()
            || self.date_range_start.is_some()
            || self.date_range_end.is_some()
    }
}

/// Result of a completed ZIP export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub category_count: usize,
    pub photo_count: usize,
}

/// A photo only survives the filter when ALL active filters hold.
fn photo_matches(photo: &Photo, options: &ExportOptions) -> bool {
    if let Some(ref selected) = options.selected_categories {
        match photo.category_id {
            Some(ref c) if selected.contains(c) => {}
            _ => return false,
        }
    }
    if let Some(start) = options.date_range_start {
        if photo.created_at < start {
            return false;
        }
    }
    if let Some(end) = options.date_range_end {
        if photo.created_at >= end {
            return false;
        }
    }
    true
}

/// Apply the export filters. An unfiltered export keeps every category;
/// a filtered one keeps categories referenced by surviving photos plus any
/// explicitly selected ones.
fn select_backup_set(
    categories: Vec<Category>,
    photos: Vec<Photo>,
    options: &ExportOptions,
) -> (Vec<Category>, Vec<Photo>) {
    let photos: Vec<Photo> = photos
        .into_iter()
        .filter(|p| photo_matches(p, options))
        .collect();

    if !options.has_filters() {
        return (categories, photos);
    }

    let referenced: HashSet<&str> = photos
        .iter()
        .filter_map(|p| p.category_id.as_deref())
        .collect();
    let categories = categories
        .into_iter()
        .filter(|c| {
            referenced.contains(c.id.as_str())
                || options
                    .selected_categories
                    .as_ref()
                    .is_some_and(|s| s.contains(&c.id))
        })
        .collect();
    (categories, photos)
}

/// Export the library to a ZIP archive at `dest_zip`.
///
/// Stages: CollectingData → WritingMetadata → CopyingPhotos → Packaging.
/// Any I/O failure while staging a photo aborts the whole export; the
/// temporary working directory is removed on every exit path.
pub fn export_to_zip(
    store: &Store,
    options: &ExportOptions,
    dest_zip: &Path,
    mut progress: Option<&mut dyn FnMut(ExportProgress)>,
) -> Result<ExportSummary> {
    let mut emit = |event: ExportProgress| {
        if let Some(cb) = progress.as_mut() {
            cb(event);
        }
    };

    emit(ExportProgress::Stage {
        stage: ExportStage::CollectingData,
    });
    let categories = store.get_all_categories()?;
    // Soft-deleted rows travel as metadata so their state survives a
    // round trip; only live photo files are packaged.
    let photos = store.get_all_photos_with_deleted()?;
    let settings = if options.include_settings {
        Some(store.load_settings()?)
    } else {
        None
    };
    let (categories, photos) = select_backup_set(categories, photos, options);

    // Plan the archive layout: each packaged photo is stored under
    // photos/<id>.<ext>, and its manifest entry carries that relative path.
    let mut manifest_photos = Vec::with_capacity(photos.len());
    let mut to_copy: Vec<(PathBuf, String)> = Vec::new(); // (source, archive path)
    for photo in photos {
        if options.include_photos && !photo.is_deleted {
            let source = PathBuf::from(&photo.path);
            if !source.exists() {
                return Err(Error::SourceNotFound(source));
            }
            let ext = source
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "jpg".to_string());
            let archive_path = format!("photos/{}.{}", photo.id, ext);
            to_copy.push((source, archive_path.clone()));
            let mut entry = photo;
            entry.path = archive_path;
            manifest_photos.push(entry);
        } else {
            manifest_photos.push(photo);
        }
    }

    // Checksums come from the source files (identical to the staged copies)
    // so the manifest can be written before the copy stage.
    let mut checksums = to_copy
        .par_iter()
        .map(|(source, archive_path)| {
            Ok(PhotoChecksum {
                path: archive_path.clone(),
                checksum: hash::sha256_file(source)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    checksums.sort_by(|a, b| a.path.cmp(&b.path));

    emit(ExportProgress::Stage {
        stage: ExportStage::WritingMetadata,
    });
    let staging = tempfile::tempdir()?;
    let mut backup_manifest = manifest::build(
        categories,
        manifest_photos,
        settings,
        BackupFormat::Zip,
    );
    backup_manifest.photo_manifest = checksums;

    fs::write(
        staging.path().join("backup_metadata.json"),
        manifest::to_json(&backup_manifest)?,
    )?;
    let summary = ArchiveSummary {
        format_version: backup_manifest.version,
        app_version: backup_manifest.app_version.clone(),
        category_count: backup_manifest.categories.len(),
        photo_count: backup_manifest.photos.len(),
        exported_at: backup_manifest.export_date,
    };
    fs::write(
        staging.path().join("manifest.json"),
        serde_json::to_string_pretty(&summary)
            .map_err(|e| Error::MalformedBackup(e.to_string()))?,
    )?;

    emit(ExportProgress::Stage {
        stage: ExportStage::CopyingPhotos,
    });
    let photos_dir = staging.path().join("photos");
    fs::create_dir_all(&photos_dir)?;
    let total = to_copy.len();
    for (current, (source, archive_path)) in to_copy.iter().enumerate() {
        fs::copy(source, staging.path().join(archive_path))?;
        if options.include_thumbnails {
            write_thumbnail(source, staging.path())?;
        }
        emit(ExportProgress::PhotoCopied {
            current: current + 1,
            total,
        });
    }

    emit(ExportProgress::Stage {
        stage: ExportStage::Packaging,
    });
    archive::pack(
        staging.path(),
        dest_zip,
        options.compression_level,
        Some(&mut |current, total| {
            emit(ExportProgress::ArchiveEntry { current, total })
        }),
    )?;

    let file_size = fs::metadata(dest_zip)?.len();
    let file_name = dest_zip
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    store.insert_history_entry(&BackupHistoryEntry {
        id: 0,
        timestamp: now_ms(),
        file_name: file_name.clone(),
        file_path: dest_zip.to_string_lossy().to_string(),
        file_size: file_size as i64,
        format: BackupFormat::Zip,
        photos_count: backup_manifest.photos.len() as i64,
        categories_count: backup_manifest.categories.len() as i64,
        compression_level: options.compression_level,
        success: true,
    })?;

    emit(ExportProgress::Stage {
        stage: ExportStage::Complete,
    });
    log::info!(
        "exported {} photos, {} categories to {}",
        backup_manifest.photos.len(),
        backup_manifest.categories.len(),
        dest_zip.display()
    );
    Ok(ExportSummary {
        file_path: dest_zip.to_path_buf(),
        file_name,
        file_size,
        category_count: backup_manifest.categories.len(),
        photo_count: backup_manifest.photos.len(),
    })
}

/// Downscaled companion image under `thumbnails/`. A photo the image crate
/// cannot decode simply gets no thumbnail.
fn write_thumbnail(source: &Path, staging: &Path) -> Result<()> {
    let img = match image::open(source) {
        Ok(img) => img,
        Err(e) => {
            log::debug!("no thumbnail for {}: {e}", source.display());
            return Ok(());
        }
    };
    let thumbs = staging.join("thumbnails");
    fs::create_dir_all(&thumbs)?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "thumb".to_string());
    let thumb = img.thumbnail(256, 256);
    thumb
        .save(thumbs.join(format!("{stem}.jpg")))
        .map_err(|e| Error::ArchiveWrite {
            path: thumbs,
            message: e.to_string(),
        })?;
    Ok(())
}

/// Metadata-only export: the serialized manifest with no photo payload.
pub fn export_to_json(store: &Store) -> Result<String> {
    let categories = store.get_all_categories()?;
    let photos = store.get_all_photos_with_deleted()?;
    let settings = store.load_settings()?;
    let backup_manifest =
        manifest::build(categories, photos, Some(settings), BackupFormat::Json);
    manifest::to_json(&backup_manifest)
}

/// Cheap read-only preview, independent of the export flow.
pub fn backup_stats(store: &Store) -> Result<BackupStats> {
    Ok(BackupStats {
        category_count: store.get_category_count()?,
        photo_count: store.get_photo_count()?,
        success: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo_at(id: &str, category_id: Option<&str>, created_at: i64) -> Photo {
        Photo {
            id: id.to_string(),
            path: format!("/photos/{id}.jpg"),
            name: format!("{id}.jpg"),
            category_id: category_id.map(str::to_string),
            position: 0,
            created_at,
            is_from_assets: false,
            file_size: 0,
            width: 0,
            height: 0,
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            display_name: name.to_string(),
            color_hex: None,
            cover_image_path: None,
            description: None,
            position: 0,
            photo_count: 0,
            is_default: false,
            created_at: 0,
        }
    }

    #[test]
    fn test_date_range_filter_inclusive_start_exclusive_end() {
        let options = ExportOptions {
            date_range_start: Some(1500),
            date_range_end: Some(2500),
            ..Default::default()
        };
        let photos = vec![
            photo_at("p1", None, 1000),
            photo_at("p2", None, 2000),
            photo_at("p3", None, 3000),
        ];
        let (_, kept) = select_backup_set(vec![], photos, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "p2");
        assert_eq!(kept[0].created_at, 2000);
    }

    #[test]
    fn test_date_range_boundaries() {
        let options = ExportOptions {
            date_range_start: Some(1000),
            date_range_end: Some(2000),
            ..Default::default()
        };
        assert!(photo_matches(&photo_at("a", None, 1000), &options)); // inclusive
        assert!(!photo_matches(&photo_at("b", None, 2000), &options)); // exclusive
    }

    #[test]
    fn test_category_filter_requires_membership() {
        let options = ExportOptions {
            selected_categories: Some(vec!["c1".to_string()]),
            ..Default::default()
        };
        assert!(photo_matches(&photo_at("a", Some("c1"), 0), &options));
        assert!(!photo_matches(&photo_at("b", Some("c2"), 0), &options));
        assert!(!photo_matches(&photo_at("c", None, 0), &options));
    }

    #[test]
    fn test_all_active_filters_must_hold() {
        let options = ExportOptions {
            selected_categories: Some(vec!["c1".to_string()]),
            date_range_start: Some(100),
            ..Default::default()
        };
        assert!(photo_matches(&photo_at("a", Some("c1"), 150), &options));
        assert!(!photo_matches(&photo_at("b", Some("c1"), 50), &options));
        assert!(!photo_matches(&photo_at("c", Some("c2"), 150), &options));
    }

    #[test]
    fn test_unfiltered_export_keeps_empty_categories() {
        let categories = vec![category("c1", "family"), category("c2", "empty")];
        let photos = vec![photo_at("p1", Some("c1"), 0)];
        let (cats, _) = select_backup_set(categories, photos, &ExportOptions::default());
        assert_eq!(cats.len(), 2);
    }

    #[test]
    fn test_filtered_export_keeps_referenced_and_selected_categories() {
        let categories = vec![
            category("c1", "family"),
            category("c2", "travel"),
            category("c3", "empty_but_selected"),
        ];
        let photos = vec![
            photo_at("p1", Some("c1"), 2000),
            photo_at("p2", Some("c2"), 9000), // filtered out by date
        ];
        let options = ExportOptions {
            selected_categories: Some(vec![
                "c1".to_string(),
                "c2".to_string(),
                "c3".to_string(),
            ]),
            date_range_end: Some(5000),
            ..Default::default()
        };
        let (cats, kept) = select_backup_set(categories, photos, &options);
        assert_eq!(kept.len(), 1);
        // All three explicitly selected categories survive even when only
        // c1 is referenced by a surviving photo.
        assert_eq!(cats.len(), 3);
    }
}
