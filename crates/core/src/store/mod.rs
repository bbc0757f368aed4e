pub mod schema;

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::*;
use crate::error::{Error, Result};

/// SQLite-backed store for categories, photos, settings, and backup history.
pub struct Store {
    conn: Connection,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Store {
    /// Open or create a store at the given path with WAL mode, running any
    /// pending schema migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Categories ───────────────────────────────────────────────────

    pub fn insert_category(&self, category: &Category) -> Result<()> {
        if self.get_category_by_name(&category.name)?.is_some() {
            return Err(Error::UniqueConstraint(category.name.clone()));
        }
        self.conn.execute(
            "INSERT INTO categories
                (id, name, display_name, color_hex, cover_image_path,
                 description, position, photo_count, is_default, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                category.id,
                category.name,
                category.display_name,
                category.color_hex,
                category.cover_image_path,
                category.description,
                category.position,
                category.photo_count,
                category.is_default,
                category.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_category(&self, category: &Category) -> Result<()> {
        if let Some(existing) = self.get_category_by_name(&category.name)? {
            if existing.id != category.id {
                return Err(Error::UniqueConstraint(category.name.clone()));
            }
        }
        let changed = self.conn.execute(
            "UPDATE categories SET
                name=?1, display_name=?2, color_hex=?3, cover_image_path=?4,
                description=?5, position=?6, is_default=?7
             WHERE id=?8",
            params![
                category.name,
                category.display_name,
                category.color_hex,
                category.cover_image_path,
                category.description,
                category.position,
                category.is_default,
                category.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::CategoryNotFound(category.id.clone()));
        }
        Ok(())
    }

    /// Delete a category. Photos referencing it survive with a null category
    /// (SET NULL foreign key), never a cascade. Returns the removed row.
    pub fn delete_category(&self, id: &str) -> Result<Category> {
        let category = self
            .get_category(id)?
            .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;
        self.conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        self.recompute_photo_counts()?;
        Ok(category)
    }

    pub fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1"),
                params![name],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// All categories in display order (position, then name for stability).
    pub fn get_all_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY position, name"
        ))?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_category_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ── Photos ───────────────────────────────────────────────────────

    pub fn insert_photo(&self, photo: &Photo) -> Result<()> {
        if let Some(ref category_id) = photo.category_id {
            if self.get_category(category_id)?.is_none() {
                return Err(Error::ForeignKeyViolation(category_id.clone()));
            }
        }
        // Soft-delete invariant: deleted_at is non-null exactly when
        // is_deleted is set.
        let deleted_at = if photo.is_deleted {
            Some(photo.deleted_at.unwrap_or_else(now_ms))
        } else {
            None
        };
        self.conn.execute(
            "INSERT INTO photos
                (id, path, name, category_id, position, created_at,
                 is_from_assets, file_size, width, height, is_favorite,
                 is_deleted, deleted_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                photo.id,
                photo.path,
                photo.name,
                photo.category_id,
                photo.position,
                photo.created_at,
                photo.is_from_assets,
                photo.file_size,
                photo.width,
                photo.height,
                photo.is_favorite,
                photo.is_deleted,
                deleted_at,
            ],
        )?;
        self.recompute_photo_counts()?;
        Ok(())
    }

    pub fn update_photo(&self, photo: &Photo) -> Result<()> {
        if let Some(ref category_id) = photo.category_id {
            if self.get_category(category_id)?.is_none() {
                return Err(Error::ForeignKeyViolation(category_id.clone()));
            }
        }
        let deleted_at = if photo.is_deleted {
            Some(photo.deleted_at.unwrap_or_else(now_ms))
        } else {
            None
        };
        let changed = self.conn.execute(
            "UPDATE photos SET
                path=?1, name=?2, category_id=?3, position=?4, created_at=?5,
                is_from_assets=?6, file_size=?7, width=?8, height=?9,
                is_favorite=?10, is_deleted=?11, deleted_at=?12
             WHERE id=?13",
            params![
                photo.path,
                photo.name,
                photo.category_id,
                photo.position,
                photo.created_at,
                photo.is_from_assets,
                photo.file_size,
                photo.width,
                photo.height,
                photo.is_favorite,
                photo.is_deleted,
                deleted_at,
                photo.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::PhotoNotFound(photo.id.clone()));
        }
        self.recompute_photo_counts()?;
        Ok(())
    }

    /// Soft-delete: the row stays, flagged and timestamped, and disappears
    /// from normal listings. A no-op when the photo is already deleted.
    pub fn delete_photo(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE photos SET is_deleted = 1, deleted_at = ?1
             WHERE id = ?2 AND is_deleted = 0",
            params![now_ms(), id],
        )?;
        if changed == 0 && self.get_photo(id)?.is_none() {
            return Err(Error::PhotoNotFound(id.to_string()));
        }
        self.recompute_photo_counts()?;
        Ok(())
    }

    /// Undo a soft delete, clearing both flag and timestamp together.
    pub fn restore_photo(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE photos SET is_deleted = 0, deleted_at = NULL WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(Error::PhotoNotFound(id.to_string()));
        }
        self.recompute_photo_counts()?;
        Ok(())
    }

    /// Look up a photo by id, soft-deleted rows included. Restore duplicate
    /// detection treats soft-deleted rows as present.
    pub fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        let photo = self
            .conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id],
                row_to_photo,
            )
            .optional()?;
        Ok(photo)
    }

    /// All live (non-soft-deleted) photos, ordered by category then position.
    pub fn get_all_photos(&self) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE is_deleted = 0
             ORDER BY category_id, position, id"
        ))?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Every photo row including soft-deleted ones. Backups use this so
    /// soft-delete state survives a round trip.
    pub fn get_all_photos_with_deleted(&self) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY category_id, position, id"
        ))?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    pub fn get_photos_by_category(&self, category_id: &str) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE category_id = ?1 AND is_deleted = 0
             ORDER BY position, id"
        ))?;
        let photos = stmt
            .query_map(params![category_id], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Count of live photos.
    pub fn get_photo_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE is_deleted = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn get_photo_count_with_deleted(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Refresh the denormalized `photo_count` cache from actual associations.
    pub fn recompute_photo_counts(&self) -> Result<()> {
        self.conn.execute(
            "UPDATE categories SET photo_count =
                (SELECT COUNT(*) FROM photos
                 WHERE photos.category_id = categories.id
                   AND photos.is_deleted = 0)",
            [],
        )?;
        Ok(())
    }

    /// Clear everything a restore REPLACE strategy replaces: all photo rows
    /// and all non-default categories.
    pub fn clear_non_default_data(&self) -> Result<()> {
        self.conn.execute("DELETE FROM photos", [])?;
        self.conn
            .execute("DELETE FROM categories WHERE is_default = 0", [])?;
        self.recompute_photo_counts()?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn load_settings(&self) -> Result<AppSettings> {
        Ok(AppSettings {
            is_dark_mode: self.get_flag("is_dark_mode")?,
            security_settings: SecuritySettings {
                has_pin: self.get_flag("has_pin")?,
                has_pattern: self.get_flag("has_pattern")?,
                kid_safe_mode_enabled: self.get_flag("kid_safe_mode_enabled")?,
                camera_access_allowed: self.get_flag("camera_access_allowed")?,
                delete_protection_enabled: self.get_flag("delete_protection_enabled")?,
            },
        })
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        self.set_flag("is_dark_mode", settings.is_dark_mode)?;
        let sec = &settings.security_settings;
        self.set_flag("has_pin", sec.has_pin)?;
        self.set_flag("has_pattern", sec.has_pattern)?;
        self.set_flag("kid_safe_mode_enabled", sec.kid_safe_mode_enabled)?;
        self.set_flag("camera_access_allowed", sec.camera_access_allowed)?;
        self.set_flag("delete_protection_enabled", sec.delete_protection_enabled)?;
        Ok(())
    }

    fn get_flag(&self, key: &str) -> Result<bool> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref() == Some("1"))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, if value { "1" } else { "0" }],
        )?;
        Ok(())
    }

    // ── Backup history ───────────────────────────────────────────────

    /// Record a completed export. Returns the entry with its assigned id.
    pub fn insert_history_entry(&self, entry: &BackupHistoryEntry) -> Result<BackupHistoryEntry> {
        self.conn.execute(
            "INSERT INTO backup_history
                (timestamp, file_name, file_path, file_size, format,
                 photos_count, categories_count, compression_level, success)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                entry.timestamp,
                entry.file_name,
                entry.file_path,
                entry.file_size,
                entry.format.as_str(),
                entry.photos_count,
                entry.categories_count,
                entry.compression_level.as_str(),
                entry.success,
            ],
        )?;
        let mut recorded = entry.clone();
        recorded.id = self.conn.last_insert_rowid();
        Ok(recorded)
    }

    /// Past exports, newest first.
    pub fn list_history(&self) -> Result<Vec<BackupHistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM backup_history ORDER BY timestamp DESC, id DESC"
        ))?;
        let entries = stmt
            .query_map([], row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// The most recent successful export, used for incremental change
    /// detection against photo timestamps.
    pub fn last_successful_backup(&self) -> Result<Option<BackupHistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {HISTORY_COLUMNS} FROM backup_history
                     WHERE success = 1 ORDER BY timestamp DESC, id DESC LIMIT 1"
                ),
                [],
                row_to_history,
            )
            .optional()?;
        Ok(entry)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

const CATEGORY_COLUMNS: &str = "id, name, display_name, color_hex, cover_image_path, \
     description, position, photo_count, is_default, created_at";

const PHOTO_COLUMNS: &str = "id, path, name, category_id, position, created_at, \
     is_from_assets, file_size, width, height, is_favorite, is_deleted, deleted_at";

const HISTORY_COLUMNS: &str = "id, timestamp, file_name, file_path, file_size, format, \
     photos_count, categories_count, compression_level, success";

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        color_hex: row.get(3)?,
        cover_image_path: row.get(4)?,
        description: row.get(5)?,
        position: row.get(6)?,
        photo_count: row.get(7)?,
        is_default: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        category_id: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        is_from_assets: row.get(6)?,
        file_size: row.get(7)?,
        width: row.get(8)?,
        height: row.get(9)?,
        is_favorite: row.get(10)?,
        is_deleted: row.get(11)?,
        deleted_at: row.get(12)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<BackupHistoryEntry> {
    let format: String = row.get(5)?;
    let level: String = row.get(8)?;
    Ok(BackupHistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        file_size: row.get(4)?,
        format: if format == "JSON" {
            BackupFormat::Json
        } else {
            BackupFormat::Zip
        },
        photos_count: row.get(6)?,
        categories_count: row.get(7)?,
        compression_level: level.to_ascii_lowercase().parse().unwrap_or_default(),
        success: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_category(id: &str, name: &str, position: i64) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            display_name: {
                let mut c = name.chars();
                match c.next() {
                    Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
                    None => String::new(),
                }
            },
            color_hex: None,
            cover_image_path: None,
            description: None,
            position,
            photo_count: 0,
            is_default: false,
            created_at: 1000,
        }
    }

    pub(crate) fn make_photo(id: &str, category_id: Option<&str>) -> Photo {
        Photo {
            id: id.to_string(),
            path: format!("/photos/{id}.jpg"),
            name: format!("{id}.jpg"),
            category_id: category_id.map(str::to_string),
            position: 0,
            created_at: 1000,
            is_from_assets: false,
            file_size: 1024,
            width: 640,
            height: 480,
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
        }
    }

    // ── Categories ───────────────────────────────────────────────

    #[test]
    fn test_insert_and_get_category() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();

        let fetched = store.get_category("c1").unwrap().unwrap();
        assert_eq!(fetched.name, "family");
        assert_eq!(fetched.display_name, "Family");
        assert_eq!(store.get_category_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_category_name_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "animals", 0)).unwrap();

        let err = store
            .insert_category(&make_category("c2", "animals", 1))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueConstraint(ref n) if n == "animals"));

        // The pre-existing category is unmodified.
        let existing = store.get_category_by_name("animals").unwrap().unwrap();
        assert_eq!(existing.id, "c1");
        assert_eq!(existing.position, 0);
        assert_eq!(store.get_category_count().unwrap(), 1);
    }

    #[test]
    fn test_categories_ordered_by_position() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "zoo", 5)).unwrap();
        store.insert_category(&make_category("c2", "art", 1)).unwrap();
        store.insert_category(&make_category("c3", "sea", 3)).unwrap();

        let names: Vec<String> = store
            .get_all_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["art", "sea", "zoo"]);
    }

    #[test]
    fn test_update_category() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();

        let mut updated = make_category("c1", "family", 7);
        updated.display_name = "The Family".to_string();
        updated.color_hex = Some("#ff8800".to_string());
        store.update_category(&updated).unwrap();

        let fetched = store.get_category("c1").unwrap().unwrap();
        assert_eq!(fetched.position, 7);
        assert_eq!(fetched.display_name, "The Family");
        assert_eq!(fetched.color_hex.as_deref(), Some("#ff8800"));
    }

    #[test]
    fn test_update_category_missing() {
        let store = Store::open_in_memory().unwrap();
        let err = store.update_category(&make_category("ghost", "x", 0)).unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound(_)));
    }

    #[test]
    fn test_update_category_name_collision() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();
        store.insert_category(&make_category("c2", "animals", 1)).unwrap();

        let err = store.update_category(&make_category("c2", "family", 1)).unwrap_err();
        assert!(matches!(err, Error::UniqueConstraint(_)));
    }

    // ── Category deletion sets photos to null ────────────────────

    #[test]
    fn test_delete_category_orphans_photos() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();
        store.insert_photo(&make_photo("p1", Some("c1"))).unwrap();
        store.insert_photo(&make_photo("p2", Some("c1"))).unwrap();

        store.delete_category("c1").unwrap();

        assert!(store.get_category("c1").unwrap().is_none());
        let p1 = store.get_photo("p1").unwrap().unwrap();
        let p2 = store.get_photo("p2").unwrap().unwrap();
        assert_eq!(p1.category_id, None);
        assert!(!p1.is_deleted);
        assert_eq!(p2.category_id, None);
        assert!(!p2.is_deleted);
        assert_eq!(store.get_photo_count().unwrap(), 2);
    }

    #[test]
    fn test_delete_category_missing() {
        let store = Store::open_in_memory().unwrap();
        let err = store.delete_category("nope").unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound(_)));
    }

    // ── Photos ───────────────────────────────────────────────────

    #[test]
    fn test_insert_photo_unknown_category() {
        let store = Store::open_in_memory().unwrap();
        let err = store.insert_photo(&make_photo("p1", Some("missing"))).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(ref c) if c == "missing"));
    }

    #[test]
    fn test_insert_photo_uncategorized() {
        let store = Store::open_in_memory().unwrap();
        store.insert_photo(&make_photo("p1", None)).unwrap();
        assert_eq!(store.get_photo_count().unwrap(), 1);
    }

    #[test]
    fn test_photos_by_category_ordering() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();

        let mut a = make_photo("pa", Some("c1"));
        a.position = 10;
        let mut b = make_photo("pb", Some("c1"));
        b.position = -3; // positions may be negative
        let mut c = make_photo("pc", Some("c1"));
        c.position = 4;
        store.insert_photo(&a).unwrap();
        store.insert_photo(&b).unwrap();
        store.insert_photo(&c).unwrap();

        let ids: Vec<String> = store
            .get_photos_by_category("c1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["pb", "pc", "pa"]);
    }

    // ── Soft delete ──────────────────────────────────────────────

    #[test]
    fn test_soft_delete_pairs_flag_and_timestamp() {
        let store = Store::open_in_memory().unwrap();
        store.insert_photo(&make_photo("p1", None)).unwrap();

        store.delete_photo("p1").unwrap();
        let p = store.get_photo("p1").unwrap().unwrap();
        assert!(p.is_deleted);
        assert!(p.deleted_at.is_some());

        store.restore_photo("p1").unwrap();
        let p = store.get_photo("p1").unwrap().unwrap();
        assert!(!p.is_deleted);
        assert_eq!(p.deleted_at, None);
    }

    #[test]
    fn test_soft_deleted_excluded_from_listings() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();
        store.insert_photo(&make_photo("p1", Some("c1"))).unwrap();
        store.insert_photo(&make_photo("p2", Some("c1"))).unwrap();

        store.delete_photo("p1").unwrap();

        assert_eq!(store.get_photo_count().unwrap(), 1);
        assert_eq!(store.get_all_photos().unwrap().len(), 1);
        assert_eq!(store.get_photos_by_category("c1").unwrap().len(), 1);
        // Still reachable by id, and present in the full listing.
        assert!(store.get_photo("p1").unwrap().is_some());
        assert_eq!(store.get_all_photos_with_deleted().unwrap().len(), 2);
    }

    #[test]
    fn test_soft_delete_twice_is_noop() {
        let store = Store::open_in_memory().unwrap();
        store.insert_photo(&make_photo("p1", None)).unwrap();

        store.delete_photo("p1").unwrap();
        let first = store.get_photo("p1").unwrap().unwrap().deleted_at;
        store.delete_photo("p1").unwrap();
        let second = store.get_photo("p1").unwrap().unwrap().deleted_at;
        assert_eq!(first, second);
    }

    #[test]
    fn test_delete_photo_missing() {
        let store = Store::open_in_memory().unwrap();
        let err = store.delete_photo("nope").unwrap_err();
        assert!(matches!(err, Error::PhotoNotFound(_)));
    }

    #[test]
    fn test_insert_normalizes_deleted_at() {
        let store = Store::open_in_memory().unwrap();

        // Not deleted but carrying a stale timestamp: timestamp is dropped.
        let mut p = make_photo("p1", None);
        p.deleted_at = Some(123);
        store.insert_photo(&p).unwrap();
        assert_eq!(store.get_photo("p1").unwrap().unwrap().deleted_at, None);

        // Deleted without a timestamp: one is assigned.
        let mut q = make_photo("p2", None);
        q.is_deleted = true;
        store.insert_photo(&q).unwrap();
        assert!(store.get_photo("p2").unwrap().unwrap().deleted_at.is_some());
    }

    // ── Photo count cache ────────────────────────────────────────

    #[test]
    fn test_photo_count_cache_follows_mutations() {
        let store = Store::open_in_memory().unwrap();
        store.insert_category(&make_category("c1", "family", 0)).unwrap();

        store.insert_photo(&make_photo("p1", Some("c1"))).unwrap();
        store.insert_photo(&make_photo("p2", Some("c1"))).unwrap();
        assert_eq!(store.get_category("c1").unwrap().unwrap().photo_count, 2);

        store.delete_photo("p1").unwrap();
        assert_eq!(store.get_category("c1").unwrap().unwrap().photo_count, 1);

        store.restore_photo("p1").unwrap();
        assert_eq!(store.get_category("c1").unwrap().unwrap().photo_count, 2);
    }

    // ── Clear for REPLACE strategy ───────────────────────────────

    #[test]
    fn test_clear_non_default_data_keeps_default_categories() {
        let store = Store::open_in_memory().unwrap();
        let mut default_cat = make_category("c0", "all", 0);
        default_cat.is_default = true;
        store.insert_category(&default_cat).unwrap();
        store.insert_category(&make_category("c1", "family", 1)).unwrap();
        store.insert_photo(&make_photo("p1", Some("c1"))).unwrap();

        store.clear_non_default_data().unwrap();

        assert_eq!(store.get_photo_count_with_deleted().unwrap(), 0);
        let remaining = store.get_all_categories().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "all");
    }

    // ── Settings ─────────────────────────────────────────────────

    #[test]
    fn test_settings_defaults() {
        let store = Store::open_in_memory().unwrap();
        let settings = store.load_settings().unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_settings_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let settings = AppSettings {
            is_dark_mode: true,
            security_settings: SecuritySettings {
                has_pin: true,
                kid_safe_mode_enabled: true,
                ..Default::default()
            },
        };
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), settings);
    }

    // ── Backup history ───────────────────────────────────────────

    fn make_history(timestamp: i64, success: bool) -> BackupHistoryEntry {
        BackupHistoryEntry {
            id: 0,
            timestamp,
            file_name: "backup.zip".to_string(),
            file_path: "/tmp/backup.zip".to_string(),
            file_size: 4096,
            format: BackupFormat::Zip,
            photos_count: 3,
            categories_count: 2,
            compression_level: CompressionLevel::Medium,
            success,
        }
    }

    #[test]
    fn test_history_insert_and_list() {
        let store = Store::open_in_memory().unwrap();
        let recorded = store.insert_history_entry(&make_history(1000, true)).unwrap();
        assert!(recorded.id > 0);
        store.insert_history_entry(&make_history(2000, true)).unwrap();

        let entries = store.list_history().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, 2000); // newest first
        assert_eq!(entries[0].compression_level, CompressionLevel::Medium);
    }

    #[test]
    fn test_last_successful_backup_skips_failures() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.last_successful_backup().unwrap().is_none());

        store.insert_history_entry(&make_history(1000, true)).unwrap();
        store.insert_history_entry(&make_history(2000, false)).unwrap();

        let last = store.last_successful_backup().unwrap().unwrap();
        assert_eq!(last.timestamp, 1000);
    }

    // ── Schema versioning and migration ──────────────────────────

    #[test]
    fn test_schema_version_stamped_on_fresh_db() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_config("schema_version").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_reject_future_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        schema::initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO config (key, value) VALUES ('schema_version', '999')",
            [],
        )
        .unwrap();

        let err = schema::migrate(&conn).unwrap_err();
        assert!(matches!(err, Error::SchemaTooNew { db: 999, code: 2 }));
    }

    #[test]
    fn test_migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        schema::initialize(&conn).unwrap();
        schema::migrate(&conn).unwrap();
        schema::migrate(&conn).unwrap(); // second call is a no-op
        let v: String = conn
            .query_row(
                "SELECT value FROM config WHERE key = 'schema_version'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(v, "2");
    }

    /// Build a v1 database with live rows, migrate, and verify: columns
    /// added with defaults, associations intact, and the foreign key now
    /// orphans instead of cascading.
    #[test]
    fn test_migration_v1_to_v2_preserves_data_and_fixes_fk() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("library.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.pragma_update(None, "foreign_keys", "ON").unwrap();
            schema::initialize(&conn).unwrap();
            conn.execute(
                "INSERT INTO categories (id, name, display_name, position, created_at)
                 VALUES ('c1', 'family', 'Family', 0, 500)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO photos (id, path, name, category_id, position, created_at)
                 VALUES ('p1', '/photos/p1.jpg', 'p1.jpg', 'c1', 0, 600)",
                [],
            )
            .unwrap();
            // v1 photos table has no soft-delete columns
            let cols: Vec<String> = conn
                .prepare("SELECT name FROM pragma_table_info('photos')")
                .unwrap()
                .query_map([], |r| r.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect();
            assert!(!cols.contains(&"is_deleted".to_string()));
        }

        let store = Store::open(&db_path).unwrap();

        // Row survived with the new columns' defaults.
        let p = store.get_photo("p1").unwrap().unwrap();
        assert_eq!(p.category_id.as_deref(), Some("c1"));
        assert!(!p.is_deleted);
        assert_eq!(p.deleted_at, None);
        assert_eq!(p.created_at, 600);

        // The index on is_deleted exists.
        let idx_count: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'index' AND name = 'idx_photos_is_deleted'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(idx_count, 1);

        // Category deletion now orphans instead of cascading.
        store.delete_category("c1").unwrap();
        let p = store.get_photo("p1").unwrap().unwrap();
        assert_eq!(p.category_id, None);
        assert!(!p.is_deleted);
    }

    // ── Schema structure pinning ────────────────────────────────

    #[test]
    fn test_store_tables_exist() {
        let store = Store::open_in_memory().unwrap();
        let mut stmt = store
            .conn()
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            tables,
            vec!["backup_history", "categories", "config", "photos", "settings"]
        );
    }

    #[test]
    fn test_photos_columns_after_migration() {
        let store = Store::open_in_memory().unwrap();
        let mut stmt = store
            .conn()
            .prepare("SELECT name FROM pragma_table_info('photos') ORDER BY cid")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            columns,
            vec![
                "id", "path", "name", "category_id", "position", "created_at",
                "is_from_assets", "file_size", "width", "height", "is_favorite",
                "is_deleted", "deleted_at",
            ]
        );
    }

    #[test]
    fn test_data_survives_close_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("library.db");

        {
            let store = Store::open(&db_path).unwrap();
            store.insert_category(&make_category("c1", "family", 0)).unwrap();
            store.insert_photo(&make_photo("p1", Some("c1"))).unwrap();
            store.save_settings(&AppSettings {
                is_dark_mode: true,
                ..Default::default()
            })
            .unwrap();
        }
        {
            let store = Store::open(&db_path).unwrap();
            assert_eq!(store.get_category_count().unwrap(), 1);
            assert_eq!(store.get_photo_count().unwrap(), 1);
            assert!(store.load_settings().unwrap().is_dark_mode);
        }
    }
}
