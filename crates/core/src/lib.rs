//! SmilePile core: an SQLite-backed photo library with category
//! organization, soft deletion, and a ZIP/JSON backup and restore engine.
//!
//! [`Library`] is the top-level handle: it owns the database and the media
//! directory and fronts the backup ([`backup`]) and restore ([`restore`])
//! pipelines.

pub mod archive;
pub mod backup;
pub mod domain;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod restore;
pub mod store;

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub use backup::{ExportOptions, ExportProgress, ExportStage, ExportSummary};
pub use domain::*;
pub use error::{Error, Result};
pub use restore::{RestoreEvent, RestoreOptions, RestorePhase, RestoreStream};
pub use store::Store;

/// A photo library rooted at a directory: `library.db` plus a `photos/`
/// media folder.
pub struct Library {
    store: Store,
    root: PathBuf,
}

impl Library {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root.join("photos"))?;
        let store = Store::open(&root.join("library.db"))?;
        Ok(Self {
            store,
            root: root.to_path_buf(),
        })
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.root.join("photos")
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ── Categories ───────────────────────────────────────────────────

    /// Create a category from its display name. The unique key is the
    /// normalized form; position is appended after existing categories.
    pub fn create_category(
        &self,
        display_name: &str,
        color_hex: Option<String>,
        description: Option<String>,
    ) -> Result<Category> {
        let name = normalize_category_name(display_name);
        if name.is_empty() {
            return Err(Error::InvalidName(display_name.to_string()));
        }
        let position = self
            .store
            .get_all_categories()?
            .iter()
            .map(|c| c.position)
            .max()
            .map_or(0, |p| p + 1);
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name,
            display_name: display_name.trim().to_string(),
            color_hex,
            cover_image_path: None,
            description,
            position,
            photo_count: 0,
            is_default: false,
            created_at: store::now_ms(),
        };
        self.store.insert_category(&category)?;
        Ok(category)
    }

    pub fn categories(&self) -> Result<Vec<Category>> {
        self.store.get_all_categories()
    }

    /// Delete by display or normalized name. Member photos are orphaned,
    /// not removed.
    pub fn delete_category(&self, name: &str) -> Result<Category> {
        let category = self.resolve_category(name)?;
        self.store.delete_category(&category.id)
    }

    fn resolve_category(&self, name: &str) -> Result<Category> {
        self.store
            .get_category_by_name(&normalize_category_name(name))?
            .ok_or_else(|| Error::CategoryNotFound(name.to_string()))
    }

    // ── Photos ───────────────────────────────────────────────────────

    /// Copy a file into the library's media directory and record it,
    /// optionally assigned to a category by name.
    pub fn import_photo(&self, file: &Path, category_name: Option<&str>) -> Result<Photo> {
        if !file.is_file() {
            return Err(Error::SourceNotFound(file.to_path_buf()));
        }
        let category_id = match category_name {
            Some(name) => Some(self.resolve_category(name)?.id),
            None => None,
        };

        let id = Uuid::new_v4().to_string();
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        let dest = self.photos_dir().join(format!("{id}.{ext}"));
        std::fs::copy(file, &dest)?;
        let file_size = std::fs::metadata(&dest)?.len() as i64;

        // Dimensions are best-effort; an undecodable file imports anyway.
        let (width, height) = match image::image_dimensions(file) {
            Ok((w, h)) => (w as i64, h as i64),
            Err(e) => {
                log::debug!("could not read dimensions of {}: {e}", file.display());
                (0, 0)
            }
        };

        let position = match category_id {
            Some(ref cid) => self
                .store
                .get_photos_by_category(cid)?
                .iter()
                .map(|p| p.position)
                .max()
                .map_or(0, |p| p + 1),
            None => 0,
        };
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{id}.{ext}"));

        let photo = Photo {
            id,
            path: dest.to_string_lossy().into_owned(),
            name,
            category_id,
            position,
            created_at: store::now_ms(),
            is_from_assets: false,
            file_size,
            width,
            height,
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
        };
        self.store.insert_photo(&photo)?;
        Ok(photo)
    }

    pub fn photos(&self) -> Result<Vec<Photo>> {
        self.store.get_all_photos()
    }

    pub fn photos_by_category(&self, name: &str) -> Result<Vec<Photo>> {
        let category = self.resolve_category(name)?;
        self.store.get_photos_by_category(&category.id)
    }

    /// Soft delete. The media file stays on disk for `undelete_photo`.
    pub fn delete_photo(&self, id: &str) -> Result<()> {
        self.store.delete_photo(id)
    }

    pub fn undelete_photo(&self, id: &str) -> Result<()> {
        self.store.restore_photo(id)
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        let mut photo = self
            .store
            .get_photo(id)?
            .ok_or_else(|| Error::PhotoNotFound(id.to_string()))?;
        photo.is_favorite = favorite;
        self.store.update_photo(&photo)
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn settings(&self) -> Result<AppSettings> {
        self.store.load_settings()
    }

    pub fn update_settings(&self, settings: &AppSettings) -> Result<()> {
        self.store.save_settings(settings)
    }

    // ── Backup and restore ───────────────────────────────────────────

    pub fn export_to_zip(
        &self,
        options: &ExportOptions,
        dest: &Path,
        progress: Option<&mut dyn FnMut(ExportProgress)>,
    ) -> Result<ExportSummary> {
        backup::export_to_zip(&self.store, options, dest, progress)
    }

    pub fn export_to_json(&self) -> Result<String> {
        backup::export_to_json(&self.store)
    }

    pub fn backup_stats(&self) -> Result<BackupStats> {
        backup::backup_stats(&self.store)
    }

    pub fn backup_history(&self) -> Result<Vec<BackupHistoryEntry>> {
        self.store.list_history()
    }

    pub fn validate_backup(&self, path: &Path, check_integrity: bool) -> Result<BackupManifest> {
        restore::validate_backup(path, check_integrity)
    }

    pub fn restore_from_backup(
        &self,
        path: &Path,
        options: RestoreOptions,
    ) -> Result<RestoreStream<'_>> {
        restore::restore_from_backup(&self.store, &self.photos_dir(), path, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_library(tmp: &tempfile::TempDir) -> Library {
        Library::open(&tmp.path().join("library")).unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        assert!(lib.photos_dir().is_dir());
        assert!(tmp.path().join("library/library.db").is_file());
    }

    #[test]
    fn test_create_category_normalizes_and_positions() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);

        let first = lib.create_category("Summer Trip", None, None).unwrap();
        assert_eq!(first.name, "summer_trip");
        assert_eq!(first.display_name, "Summer Trip");
        assert_eq!(first.position, 0);

        let second = lib.create_category("Family", None, None).unwrap();
        assert_eq!(second.position, 1);
    }

    #[test]
    fn test_create_category_rejects_empty_name() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        let err = lib.create_category("  --  ", None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
    }

    #[test]
    fn test_import_photo_copies_into_media_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        lib.create_category("Family", None, None).unwrap();

        let source = tmp.path().join("cat.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();

        let photo = lib.import_photo(&source, Some("Family")).unwrap();
        assert!(Path::new(&photo.path).starts_with(lib.photos_dir()));
        assert!(Path::new(&photo.path).is_file());
        assert_eq!(photo.name, "cat.jpg");
        assert_eq!(photo.file_size, 17);
        // Undecodable bytes: dimensions default to zero.
        assert_eq!((photo.width, photo.height), (0, 0));
        assert_eq!(lib.photos().unwrap().len(), 1);
    }

    #[test]
    fn test_import_photo_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        let err = lib
            .import_photo(&tmp.path().join("nope.jpg"), None)
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_import_photo_unknown_category() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        let source = tmp.path().join("a.jpg");
        std::fs::write(&source, b"x").unwrap();
        let err = lib.import_photo(&source, Some("ghost")).unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound(_)));
    }

    #[test]
    fn test_favorite_toggle() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = open_library(&tmp);
        let source = tmp.path().join("a.jpg");
        std::fs::write(&source, b"x").unwrap();
        let photo = lib.import_photo(&source, None).unwrap();

        lib.set_favorite(&photo.id, true).unwrap();
        assert!(lib.store().get_photo(&photo.id).unwrap().unwrap().is_favorite);
        lib.set_favorite(&photo.id, false).unwrap();
        assert!(!lib.store().get_photo(&photo.id).unwrap().unwrap().is_favorite);
    }
}
