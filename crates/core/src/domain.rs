//! Core domain types and their JSON wire form. Serde names follow the
//! camelCase manifest format; struct fields stay snake_case in Rust.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named photo grouping. `name` is the normalized unique key;
/// `display_name` is what users see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub color_hex: Option<String>,
    pub cover_image_path: Option<String>,
    pub description: Option<String>,
    pub position: i64,
    pub photo_count: i64,
    pub is_default: bool,
    pub created_at: i64,
}

impl Default for Category {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            display_name: String::new(),
            color_hex: None,
            cover_image_path: None,
            description: None,
            position: 0,
            photo_count: 0,
            is_default: false,
            created_at: 0,
        }
    }
}

/// A photo record. `category_id` is nullable: deleting a category orphans
/// its photos rather than removing them. Soft-deleted rows keep
/// `is_deleted` and `deleted_at` in lockstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Photo {
    pub id: String,
    pub path: String,
    pub name: String,
    pub category_id: Option<String>,
    pub position: i64,
    pub created_at: i64,
    pub is_from_assets: bool,
    pub file_size: i64,
    pub width: i64,
    pub height: i64,
    pub is_favorite: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
}

impl Default for Photo {
    fn default() -> Self {
        Self {
            id: String::new(),
            path: String::new(),
            name: String::new(),
            category_id: None,
            position: 0,
            created_at: 0,
            is_from_assets: false,
            file_size: 0,
            width: 0,
            height: 0,
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

/// Boolean security flags only; no credentials ever cross the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    #[serde(rename = "hasPIN")]
    pub has_pin: bool,
    pub has_pattern: bool,
    pub kid_safe_mode_enabled: bool,
    pub camera_access_allowed: bool,
    pub delete_protection_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub is_dark_mode: bool,
    pub security_settings: SecuritySettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFormat {
    #[default]
    #[serde(rename = "ZIP")]
    Zip,
    #[serde(rename = "JSON")]
    Json,
}

impl BackupFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupFormat::Zip => "ZIP",
            BackupFormat::Json => "JSON",
        }
    }
}

/// One integrity entry: archive-relative photo path plus its SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoChecksum {
    pub path: String,
    pub checksum: String,
}

/// The versioned backup document (`backup_metadata.json`). `version`,
/// `categories`, and `photos` are required; everything else defaults when
/// absent so older manifests still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub version: u32,
    #[serde(default)]
    pub export_date: i64,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub format: BackupFormat,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub settings: Option<AppSettings>,
    #[serde(default)]
    pub photo_manifest: Vec<PhotoChecksum>,
}

/// Small human-scannable `manifest.json` written next to the full
/// metadata inside the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub format_version: u32,
    pub app_version: String,
    pub category_count: usize,
    pub photo_count: usize,
    pub exported_at: i64,
}

/// A recorded export attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupHistoryEntry {
    pub id: i64,
    pub timestamp: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub format: BackupFormat,
    pub photos_count: i64,
    pub categories_count: i64,
    pub compression_level: CompressionLevel,
    pub success: bool,
}

/// Quick pre-export counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupStats {
    pub category_count: usize,
    pub photo_count: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    /// Deflate level passed to the ZIP writer.
    pub fn deflate_level(&self) -> i64 {
        match self {
            CompressionLevel::Low => 1,
            CompressionLevel::Medium => 6,
            CompressionLevel::High => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Low => "LOW",
            CompressionLevel::Medium => "MEDIUM",
            CompressionLevel::High => "HIGH",
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(format!("unknown compression level: {other}")),
        }
    }
}

/// How a restore treats the existing library as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Add to the current library, resolving collisions per item.
    #[default]
    Merge,
    /// Clear photos and non-default categories first, then apply.
    Replace,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(MergeStrategy::Merge),
            "replace" => Ok(MergeStrategy::Replace),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// Per-item collision handling during a merge restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateResolution {
    /// Keep the existing item untouched.
    #[default]
    Skip,
    /// Overwrite the existing item with the incoming one.
    Replace,
    /// Keep both, giving the incoming item a disambiguated identity.
    Rename,
}

impl FromStr for DuplicateResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(DuplicateResolution::Skip),
            "replace" => Ok(DuplicateResolution::Replace),
            "rename" => Ok(DuplicateResolution::Rename),
            other => Err(format!("unknown duplicate resolution: {other}")),
        }
    }
}

/// Normalize a display name into the unique category key: lowercase,
/// runs of non-alphanumerics collapsed to single underscores.
pub fn normalize_category_name(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut pending_sep = false;
    for c in display_name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}
