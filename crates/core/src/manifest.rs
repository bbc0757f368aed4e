//! Versioned JSON conversion between live domain objects and the
//! `BackupManifest` wire form (`backup_metadata.json`).

use serde_json::Value;

use crate::domain::{AppSettings, BackupFormat, BackupManifest, Category, Photo};
use crate::error::{Error, Result};
use crate::store;

/// Manifest format version written by this build. Version 1 manifests
/// (no soft-delete fields) still parse; their absent fields default.
pub const FORMAT_VERSION: u32 = 2;

/// Assemble a manifest with deterministic ordering: categories by position
/// then name, photos by category then position then id. Stable ordering
/// keeps the serialized form diff-friendly and checksum-stable.
pub fn build(
    mut categories: Vec<Category>,
    mut photos: Vec<Photo>,
    settings: Option<AppSettings>,
    format: BackupFormat,
) -> BackupManifest {
    categories.sort_by(|a, b| (a.position, &a.name).cmp(&(b.position, &b.name)));
    photos.sort_by(|a, b| {
        (&a.category_id, a.position, &a.id).cmp(&(&b.category_id, b.position, &b.id))
    });
    BackupManifest {
        version: FORMAT_VERSION,
        export_date: store::now_ms(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        format,
        categories,
        photos,
        settings,
        photo_manifest: Vec::new(),
    }
}

pub fn to_json(manifest: &BackupManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest)
        .map_err(|e| Error::MalformedBackup(format!("failed to serialize manifest: {e}")))
}

/// Parse and validate manifest bytes. Required top-level fields (`version`,
/// `categories`, `photos`) must be present with the right types; unknown
/// fields are ignored and absent optional fields default.
pub fn parse(bytes: &[u8]) -> Result<BackupManifest> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::MalformedBackup(format!("invalid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedBackup("top level must be an object".to_string()))?;

    let version = obj
        .get("version")
        .ok_or_else(|| Error::MalformedBackup("missing required field: version".to_string()))?
        .as_u64()
        .ok_or_else(|| Error::MalformedBackup("version must be an integer".to_string()))?;

    if version == 0 || version > FORMAT_VERSION as u64 {
        return Err(Error::MalformedBackup(format!(
            "unsupported manifest version {version} (this build reads up to {FORMAT_VERSION})"
        )));
    }

    for field in ["categories", "photos"] {
        match obj.get(field) {
            None => {
                return Err(Error::MalformedBackup(format!(
                    "missing required field: {field}"
                )))
            }
            Some(v) if !v.is_array() => {
                return Err(Error::MalformedBackup(format!("{field} must be an array")))
            }
            Some(_) => {}
        }
    }

    let manifest: BackupManifest = serde_json::from_value(value)
        .map_err(|e| Error::MalformedBackup(format!("invalid manifest: {e}")))?;

    // The wire form never carries credentials; settings are flags only, so
    // nothing further to sanitize here.
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SecuritySettings;

    fn category(id: &str, name: &str, position: i64) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            display_name: name.to_string(),
            color_hex: None,
            cover_image_path: None,
            description: None,
            position,
            photo_count: 0,
            is_default: false,
            created_at: 100,
        }
    }

    fn photo(id: &str, category_id: Option<&str>, position: i64) -> Photo {
        Photo {
            id: id.to_string(),
            path: format!("photos/{id}.jpg"),
            name: format!("{id}.jpg"),
            category_id: category_id.map(str::to_string),
            position,
            created_at: 100,
            is_from_assets: false,
            file_size: 10,
            width: 1,
            height: 1,
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn test_build_orders_deterministically() {
        let manifest = build(
            vec![category("c2", "zoo", 1), category("c1", "art", 0)],
            vec![
                photo("p2", Some("c1"), 5),
                photo("p1", Some("c1"), 2),
                photo("p3", None, 0),
            ],
            None,
            BackupFormat::Zip,
        );
        let names: Vec<&str> = manifest.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["art", "zoo"]);
        let ids: Vec<&str> = manifest.photos.iter().map(|p| p.id.as_str()).collect();
        // Uncategorized (None) sorts first, then by position within c1.
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
        assert_eq!(manifest.version, FORMAT_VERSION);
    }

    #[test]
    fn test_roundtrip() {
        let manifest = build(
            vec![category("c1", "family", 0)],
            vec![photo("p1", Some("c1"), 0)],
            Some(AppSettings {
                is_dark_mode: true,
                security_settings: SecuritySettings {
                    has_pin: true,
                    ..Default::default()
                },
            }),
            BackupFormat::Zip,
        );
        let json = to_json(&manifest).unwrap();
        let parsed = parse(json.as_bytes()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_serialized_form_is_deterministic() {
        let cats = vec![category("c1", "family", 0)];
        let photos = vec![photo("p1", Some("c1"), 0)];
        let mut a = build(cats.clone(), photos.clone(), None, BackupFormat::Zip);
        let mut b = build(cats, photos, None, BackupFormat::Zip);
        a.export_date = 0;
        b.export_date = 0;
        assert_eq!(to_json(&a).unwrap(), to_json(&b).unwrap());
    }

    #[test]
    fn test_parse_rejects_missing_required_fields() {
        let err = parse(br#"{"categories": [], "photos": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(ref m) if m.contains("version")));

        let err = parse(br#"{"version": 2, "photos": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(ref m) if m.contains("categories")));

        let err = parse(br#"{"version": 2, "categories": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(ref m) if m.contains("photos")));
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let err = parse(br#"{"version": "two", "categories": [], "photos": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(_)));

        let err = parse(br#"{"version": 2, "categories": {}, "photos": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(_)));

        let err = parse(b"not json at all").unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(_)));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let json = br#"{
            "version": 2,
            "categories": [],
            "photos": [],
            "futureFeature": {"nested": true},
            "anotherUnknown": 42
        }"#;
        let parsed = parse(json).unwrap();
        assert!(parsed.categories.is_empty());
        assert!(parsed.photos.is_empty());
    }

    #[test]
    fn test_parse_defaults_absent_optional_fields() {
        let json = br#"{"version": 1, "categories": [], "photos": []}"#;
        let parsed = parse(json).unwrap();
        assert_eq!(parsed.export_date, 0);
        assert_eq!(parsed.app_version, "");
        assert_eq!(parsed.format, BackupFormat::Zip);
        assert!(parsed.settings.is_none());
        assert!(parsed.photo_manifest.is_empty());
    }

    #[test]
    fn test_parse_rejects_future_version() {
        let err = parse(br#"{"version": 99, "categories": [], "photos": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedBackup(ref m) if m.contains("version 99")));
    }

    #[test]
    fn test_parse_v1_photo_without_soft_delete_fields() {
        let json = br#"{
            "version": 1,
            "categories": [],
            "photos": [{"id": "p1", "path": "photos/p1.jpg", "name": "p1.jpg"}]
        }"#;
        let parsed = parse(json).unwrap();
        assert_eq!(parsed.photos.len(), 1);
        assert!(!parsed.photos[0].is_deleted);
        assert_eq!(parsed.photos[0].deleted_at, None);
    }
}
