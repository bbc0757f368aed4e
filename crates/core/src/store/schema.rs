use rusqlite::Connection;

use crate::error::{Error, Result};

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 2;

/// Create the version-1 schema if no tables exist yet. Version 1 is the
/// original layout: no soft-delete columns on `photos`, and a CASCADE
/// delete from categories to photos. `migrate` brings it forward.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL UNIQUE,
            display_name     TEXT NOT NULL,
            color_hex        TEXT,
            cover_image_path TEXT,
            description      TEXT,
            position         INTEGER NOT NULL DEFAULT 0,
            photo_count      INTEGER NOT NULL DEFAULT 0,
            is_default       INTEGER NOT NULL DEFAULT 0,
            created_at       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photos (
            id             TEXT PRIMARY KEY,
            path           TEXT NOT NULL,
            name           TEXT NOT NULL,
            category_id    TEXT REFERENCES categories(id) ON DELETE CASCADE,
            position       INTEGER NOT NULL DEFAULT 0,
            created_at     INTEGER NOT NULL,
            is_from_assets INTEGER NOT NULL DEFAULT 0,
            file_size      INTEGER NOT NULL DEFAULT 0,
            width          INTEGER NOT NULL DEFAULT 0,
            height         INTEGER NOT NULL DEFAULT 0,
            is_favorite    INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_photos_category ON photos(category_id);
        CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos(created_at);

        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS backup_history (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp         INTEGER NOT NULL,
            file_name         TEXT NOT NULL,
            file_path         TEXT NOT NULL,
            file_size         INTEGER NOT NULL,
            format            TEXT NOT NULL,
            photos_count      INTEGER NOT NULL,
            categories_count  INTEGER NOT NULL,
            compression_level TEXT NOT NULL,
            success           INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Bring the database forward to `SCHEMA_VERSION`. Forward-only; a database
/// stamped with a newer version than this build is rejected. Safe to call on
/// every open.
pub fn migrate(conn: &Connection) -> Result<()> {
    let db_version = current_version(conn)?;

    if db_version > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew {
            db: db_version,
            code: SCHEMA_VERSION,
        });
    }

    if db_version < 2 {
        migrate_v1_to_v2(conn)?;
    }

    set_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Version 1 → 2, in one atomic step:
/// - add `is_deleted` (default 0) and `deleted_at` (nullable) to `photos`
/// - index `is_deleted` so soft-delete filtering stays cheap
/// - change the category foreign key from CASCADE DELETE to SET NULL
///
/// SQLite cannot alter a foreign key in place, so the table is rebuilt.
/// Every pre-existing row keeps its values and its category association.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    log::info!("migrating library schema v1 -> v2");

    // The rebuild drops and renames tables; FK enforcement must be off for
    // the duration, and the whole step runs inside one transaction.
    conn.pragma_update(None, "foreign_keys", "OFF")?;

    let result = conn.execute_batch(
        "
        BEGIN;

        CREATE TABLE photos_v2 (
            id             TEXT PRIMARY KEY,
            path           TEXT NOT NULL,
            name           TEXT NOT NULL,
            category_id    TEXT REFERENCES categories(id) ON DELETE SET NULL,
            position       INTEGER NOT NULL DEFAULT 0,
            created_at     INTEGER NOT NULL,
            is_from_assets INTEGER NOT NULL DEFAULT 0,
            file_size      INTEGER NOT NULL DEFAULT 0,
            width          INTEGER NOT NULL DEFAULT 0,
            height         INTEGER NOT NULL DEFAULT 0,
            is_favorite    INTEGER NOT NULL DEFAULT 0,
            is_deleted     INTEGER NOT NULL DEFAULT 0,
            deleted_at     INTEGER
        );

        INSERT INTO photos_v2
            (id, path, name, category_id, position, created_at,
             is_from_assets, file_size, width, height, is_favorite,
             is_deleted, deleted_at)
        SELECT id, path, name, category_id, position, created_at,
               is_from_assets, file_size, width, height, is_favorite,
               0, NULL
        FROM photos;

        DROP TABLE photos;
        ALTER TABLE photos_v2 RENAME TO photos;

        CREATE INDEX idx_photos_category ON photos(category_id);
        CREATE INDEX idx_photos_created_at ON photos(created_at);
        CREATE INDEX idx_photos_is_deleted ON photos(is_deleted);

        COMMIT;
        ",
    );

    conn.pragma_update(None, "foreign_keys", "ON")?;
    result?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<u32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();
    // A database initialized before version stamping existed is version 1.
    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(1))
}

fn set_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version.to_string()],
    )?;
    Ok(())
}
