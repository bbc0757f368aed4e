use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("not a SmilePile backup: {0}")]
    UnsupportedFormat(String),

    #[error("backup archive is corrupted: {0}")]
    CorruptArchive(String),

    #[error("malformed backup manifest: {0}")]
    MalformedBackup(String),

    #[error("archive entry escapes the extraction root: {0}")]
    PathTraversal(String),

    #[error("not enough free space: archive declares {needed} bytes, {available} available")]
    InsufficientStorage { needed: u64, available: u64 },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("failed to write archive {}: {message}", .path.display())]
    ArchiveWrite { path: PathBuf, message: String },

    #[error("category name already exists: {0}")]
    UniqueConstraint(String),

    #[error("invalid category name: {0:?}")]
    InvalidName(String),

    #[error("photo references unknown category: {0}")]
    ForeignKeyViolation(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("photo not found: {0}")]
    PhotoNotFound(String),

    #[error("source file does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("library schema version {db} is newer than this build supports ({code})")]
    SchemaTooNew { db: u32, code: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
