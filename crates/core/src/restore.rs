//! Restore pipeline: validate a backup file, then apply it through a lazy
//! event stream. Dropping the stream mid-way cancels the restore; items
//! already applied stay applied.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::archive;
use crate::domain::*;
use crate::error::{Error, Result};
use crate::hash;
use crate::manifest;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub strategy: MergeStrategy,
    pub duplicate_resolution: DuplicateResolution,
    /// Walk the whole pipeline, emitting the same events, writing nothing.
    pub dry_run: bool,
    /// Verify photo checksums against the manifest before applying.
    pub validate_integrity: bool,
    pub restore_settings: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Merge,
            duplicate_resolution: DuplicateResolution::Skip,
            dry_run: false,
            validate_integrity: false,
            restore_settings: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Categories,
    Photos,
    Settings,
}

impl RestorePhase {
    pub fn label(&self) -> &'static str {
        match self {
            RestorePhase::Categories => "Restoring categories",
            RestorePhase::Photos => "Restoring photos",
            RestorePhase::Settings => "Restoring settings",
        }
    }
}

/// Events yielded by [`RestoreStream`]. The final event is always either
/// `Complete` or `Failed`.
#[derive(Debug, Clone)]
pub enum RestoreEvent {
    Progress {
        phase: RestorePhase,
        processed_items: usize,
        total_items: usize,
        current_operation: String,
        /// Non-fatal per-item errors accumulated so far.
        errors: Vec<String>,
    },
    Complete {
        applied_categories: usize,
        applied_photos: usize,
        settings_applied: bool,
        skipped: usize,
        errors: Vec<String>,
        dry_run: bool,
    },
    Failed {
        phase: RestorePhase,
        applied_items: usize,
        message: String,
    },
}

/// Inspect a backup file without applying it. Checks extension and magic
/// bytes, unpacks (for ZIP), parses the manifest, and optionally verifies
/// photo checksums.
pub fn validate_backup(path: &Path, check_integrity: bool) -> Result<BackupManifest> {
    let (manifest, _staging) = open_backup(path, check_integrity)?;
    Ok(manifest)
}

/// Unpack and parse a backup. For ZIP backups the returned `TempDir` holds
/// the extracted payload and must outlive any photo file copies.
fn open_backup(path: &Path, check_integrity: bool) -> Result<(BackupManifest, Option<TempDir>)> {
    if !path.exists() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "zip" => {
            if !archive::has_zip_signature(path)? {
                return Err(Error::UnsupportedFormat(format!(
                    "{} has a .zip extension but no ZIP signature",
                    path.display()
                )));
            }
            let staging = tempfile::tempdir()?;
            archive::unpack(path, staging.path(), None)?;
            let metadata_path = staging.path().join("backup_metadata.json");
            if !metadata_path.exists() {
                return Err(Error::UnsupportedFormat(
                    "archive contains no backup_metadata.json".to_string(),
                ));
            }
            let manifest = manifest::parse(&fs::read(metadata_path)?)?;
            if check_integrity {
                verify_checksums(staging.path(), &manifest)?;
            }
            Ok((manifest, Some(staging)))
        }
        "json" => {
            let manifest = manifest::parse(&fs::read(path)?)?;
            Ok((manifest, None))
        }
        other => Err(Error::UnsupportedFormat(format!(
            "unrecognized backup extension: {other:?} (expected .zip or .json)"
        ))),
    }
}

fn verify_checksums(root: &Path, manifest: &BackupManifest) -> Result<()> {
    for entry in &manifest.photo_manifest {
        // Manifest paths are untrusted input too.
        let file = root.join(sanitized_entry_path(&entry.path)?);
        let actual = match hash::sha256_file(&file) {
            Ok(actual) => actual,
            Err(_) => {
                return Err(Error::IntegrityMismatch {
                    path: entry.path.clone(),
                    expected: entry.checksum.clone(),
                    actual: "<file missing>".to_string(),
                })
            }
        };
        if actual != entry.checksum {
            return Err(Error::IntegrityMismatch {
                path: entry.path.clone(),
                expected: entry.checksum.clone(),
                actual,
            });
        }
    }
    Ok(())
}

fn sanitized_entry_path(name: &str) -> Result<PathBuf> {
    use std::path::Component;
    let mut rel = PathBuf::new();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(c) => rel.push(c),
            Component::CurDir => {}
            _ => return Err(Error::PathTraversal(name.to_string())),
        }
    }
    Ok(rel)
}

/// Validate `backup_path` and return a lazy stream of restore events.
/// Nothing is applied until the stream is consumed; dropping it early
/// cancels the remainder without rolling back applied items.
pub fn restore_from_backup<'a>(
    store: &'a Store,
    media_dir: &Path,
    backup_path: &Path,
    options: RestoreOptions,
) -> Result<RestoreStream<'a>> {
    let (manifest, staging) = open_backup(backup_path, options.validate_integrity)?;

    let settings = if options.restore_settings {
        manifest.settings
    } else {
        None
    };
    let total_items =
        manifest.categories.len() + manifest.photos.len() + usize::from(settings.is_some());
    let staging_root = staging.as_ref().map(|t| t.path().to_path_buf());

    log::info!(
        "restoring from {}: {} categories, {} photos (dry_run={})",
        backup_path.display(),
        manifest.categories.len(),
        manifest.photos.len(),
        options.dry_run
    );

    Ok(RestoreStream {
        store,
        media_dir: media_dir.to_path_buf(),
        _staging: staging,
        staging_root,
        options,
        categories: manifest.categories.into(),
        photos: manifest.photos.into(),
        settings,
        category_ids: HashMap::new(),
        total_items,
        processed: 0,
        applied_categories: 0,
        applied_photos: 0,
        settings_applied: false,
        skipped: 0,
        errors: Vec::new(),
        state: StreamState::Start,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Start,
    Categories,
    Photos,
    Settings,
    Finish,
    Done,
}

/// Single-consumer restore iterator. Holds the extracted archive payload
/// alive until the stream is dropped.
pub struct RestoreStream<'a> {
    store: &'a Store,
    media_dir: PathBuf,
    _staging: Option<TempDir>,
    staging_root: Option<PathBuf>,
    options: RestoreOptions,
    categories: VecDeque<Category>,
    photos: VecDeque<Photo>,
    settings: Option<AppSettings>,
    /// Manifest category id -> id of the local category it landed on.
    category_ids: HashMap<String, String>,
    total_items: usize,
    processed: usize,
    applied_categories: usize,
    applied_photos: usize,
    settings_applied: bool,
    skipped: usize,
    errors: Vec<String>,
    state: StreamState,
}

impl RestoreStream<'_> {
    fn fail(&mut self, phase: RestorePhase, message: String) -> RestoreEvent {
        self.state = StreamState::Done;
        RestoreEvent::Failed {
            phase,
            applied_items: self.applied_categories + self.applied_photos,
            message,
        }
    }

    fn progress(&self, phase: RestorePhase, operation: String) -> RestoreEvent {
        RestoreEvent::Progress {
            phase,
            processed_items: self.processed,
            total_items: self.total_items,
            current_operation: operation,
            errors: self.errors.clone(),
        }
    }

    /// Database errors are terminal; anything else is recorded per-item and
    /// the stream moves on.
    fn record_item_error(&mut self, phase: RestorePhase, err: Error) -> Option<RestoreEvent> {
        if matches!(err, Error::Database(_)) {
            return Some(self.fail(phase, err.to_string()));
        }
        log::warn!("restore item skipped: {err}");
        self.errors.push(err.to_string());
        None
    }

    fn apply_category(&mut self, category: Category) -> Result<String> {
        let manifest_id = category.id.clone();
        let name = category.name.clone();
        match self.store.get_category_by_name(&category.name)? {
            Some(existing) => match self.options.duplicate_resolution {
                DuplicateResolution::Skip => {
                    self.category_ids.insert(manifest_id, existing.id);
                    self.skipped += 1;
                }
                DuplicateResolution::Replace => {
                    if !self.options.dry_run {
                        let mut updated = category;
                        updated.id = existing.id.clone();
                        self.store.update_category(&updated)?;
                    }
                    self.category_ids.insert(manifest_id, existing.id);
                    self.applied_categories += 1;
                }
                DuplicateResolution::Rename => {
                    let mut renamed = category;
                    renamed.name = self.disambiguate_name(&renamed.name)?;
                    if self.store.get_category(&renamed.id)?.is_some() {
                        renamed.id = Uuid::new_v4().to_string();
                    }
                    if !self.options.dry_run {
                        self.store.insert_category(&renamed)?;
                    }
                    self.category_ids.insert(manifest_id, renamed.id);
                    self.applied_categories += 1;
                }
            },
            None => {
                let mut incoming = category;
                // Same id already used by a differently-named local category.
                if self.store.get_category(&incoming.id)?.is_some() {
                    incoming.id = Uuid::new_v4().to_string();
                }
                if !self.options.dry_run {
                    self.store.insert_category(&incoming)?;
                }
                self.category_ids.insert(manifest_id, incoming.id);
                self.applied_categories += 1;
            }
        }
        Ok(name)
    }

    /// First free `name_2`, `name_3`, ... suffix.
    fn disambiguate_name(&self, name: &str) -> Result<String> {
        let mut n = 2u32;
        loop {
            let candidate = format!("{name}_{n}");
            if self.store.get_category_by_name(&candidate)?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn apply_photo(&mut self, photo: Photo) -> Result<String> {
        let mut incoming = photo;
        let name = incoming.name.clone();

        // Remap the category reference onto whatever the category phase
        // resolved it to. An unmapped reference is left as-is and surfaces
        // as a per-item foreign key error below.
        if let Some(ref manifest_category) = incoming.category_id {
            if let Some(local) = self.category_ids.get(manifest_category) {
                incoming.category_id = Some(local.clone());
            }
        }

        // Soft-deleted rows count as present for duplicate detection.
        match self.store.get_photo(&incoming.id)? {
            Some(_) => match self.options.duplicate_resolution {
                DuplicateResolution::Skip => {
                    self.skipped += 1;
                }
                DuplicateResolution::Replace => {
                    self.materialize_file(&mut incoming)?;
                    if !self.options.dry_run {
                        self.store.update_photo(&incoming)?;
                    }
                    self.applied_photos += 1;
                }
                DuplicateResolution::Rename => {
                    incoming.id = Uuid::new_v4().to_string();
                    self.materialize_file(&mut incoming)?;
                    if !self.options.dry_run {
                        self.store.insert_photo(&incoming)?;
                    }
                    self.applied_photos += 1;
                }
            },
            None => {
                self.materialize_file(&mut incoming)?;
                if !self.options.dry_run {
                    self.store.insert_photo(&incoming)?;
                }
                self.applied_photos += 1;
            }
        }
        Ok(name)
    }

    /// Copy the photo's packaged file out of the extracted archive into the
    /// library media directory, rewriting `path` to the new location. A
    /// metadata-only entry (soft-deleted, or a JSON backup) keeps its path.
    fn materialize_file(&self, photo: &mut Photo) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }
        let Some(ref root) = self.staging_root else {
            return Ok(());
        };
        // Absolute paths mean a metadata-only entry (soft-deleted, or an
        // unpackaged photo); those keep their recorded location.
        let Ok(rel) = sanitized_entry_path(&photo.path) else {
            return Ok(());
        };
        let source = root.join(rel);
        if !source.is_file() {
            return Ok(());
        }
        // The destination name comes from the row id, not the archive entry:
        // a renamed duplicate has a fresh id by now, and reusing the entry
        // name would overwrite the existing photo's file.
        let file_name = match source.extension() {
            Some(ext) => format!("{}.{}", photo.id, ext.to_string_lossy()),
            None => photo.id.clone(),
        };
        fs::create_dir_all(&self.media_dir)?;
        let dest = self.media_dir.join(file_name);
        fs::copy(&source, &dest)?;
        photo.path = dest.to_string_lossy().into_owned();
        Ok(())
    }

    fn finish(&mut self) -> RestoreEvent {
        self.state = StreamState::Done;
        if !self.options.dry_run {
            if let Err(e) = self.store.recompute_photo_counts() {
                self.errors.push(e.to_string());
            }
        }
        log::info!(
            "restore finished: {} categories, {} photos applied, {} skipped, {} errors",
            self.applied_categories,
            self.applied_photos,
            self.skipped,
            self.errors.len()
        );
        RestoreEvent::Complete {
            applied_categories: self.applied_categories,
            applied_photos: self.applied_photos,
            settings_applied: self.settings_applied,
            skipped: self.skipped,
            errors: self.errors.clone(),
            dry_run: self.options.dry_run,
        }
    }
}

impl Iterator for RestoreStream<'_> {
    type Item = RestoreEvent;

    fn next(&mut self) -> Option<RestoreEvent> {
        loop {
            match self.state {
                StreamState::Start => {
                    if self.options.strategy == MergeStrategy::Replace && !self.options.dry_run {
                        if let Err(e) = self.store.clear_non_default_data() {
                            return Some(
                                self.fail(RestorePhase::Categories, e.to_string()),
                            );
                        }
                    }
                    self.state = StreamState::Categories;
                }
                StreamState::Categories => {
                    let Some(category) = self.categories.pop_front() else {
                        self.state = StreamState::Photos;
                        continue;
                    };
                    self.processed += 1;
                    let operation = match self.apply_category(category) {
                        Ok(name) => format!("Restoring category {name}"),
                        Err(e) => match self.record_item_error(RestorePhase::Categories, e) {
                            Some(fatal) => return Some(fatal),
                            None => "Restoring categories".to_string(),
                        },
                    };
                    return Some(self.progress(RestorePhase::Categories, operation));
                }
                StreamState::Photos => {
                    let Some(photo) = self.photos.pop_front() else {
                        self.state = StreamState::Settings;
                        continue;
                    };
                    self.processed += 1;
                    let operation = match self.apply_photo(photo) {
                        Ok(name) => format!("Restoring photo {name}"),
                        Err(e) => match self.record_item_error(RestorePhase::Photos, e) {
                            Some(fatal) => return Some(fatal),
                            None => "Restoring photos".to_string(),
                        },
                    };
                    return Some(self.progress(RestorePhase::Photos, operation));
                }
                StreamState::Settings => {
                    let Some(settings) = self.settings.take() else {
                        self.state = StreamState::Finish;
                        continue;
                    };
                    self.processed += 1;
                    if !self.options.dry_run {
                        if let Err(e) = self.store.save_settings(&settings) {
                            return Some(self.fail(RestorePhase::Settings, e.to_string()));
                        }
                    }
                    self.settings_applied = true;
                    self.state = StreamState::Finish;
                    return Some(
                        self.progress(RestorePhase::Settings, "Restoring settings".to_string()),
                    );
                }
                StreamState::Finish => return Some(self.finish()),
                StreamState::Done => return None,
            }
        }
    }
}
