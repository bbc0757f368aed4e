use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use smilepile_core::{
    normalize_category_name, CompressionLevel, ExportOptions, ExportProgress, Library,
};

#[derive(Args)]
pub struct BackupArgs {
    /// Output file; defaults to smilepile-backup-<timestamp>.zip
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// low, medium, or high
    #[arg(long, default_value = "medium")]
    compression: CompressionLevel,

    /// Only export these categories (by name, repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Only photos created at or after this epoch-ms timestamp
    #[arg(long)]
    after: Option<i64>,

    /// Only photos created before this epoch-ms timestamp
    #[arg(long)]
    before: Option<i64>,

    /// Metadata only, no photo files
    #[arg(long)]
    no_photos: bool,

    /// Include downscaled thumbnails in the archive
    #[arg(long)]
    thumbnails: bool,

    /// Leave app settings out of the backup
    #[arg(long)]
    no_settings: bool,

    /// Write the JSON manifest instead of a ZIP archive
    #[arg(long)]
    json: bool,
}

pub fn run(library: &Library, args: BackupArgs) -> Result<()> {
    if args.json {
        let dest = args
            .output
            .unwrap_or_else(|| PathBuf::from(default_file_name("json")));
        std::fs::write(&dest, library.export_to_json()?)
            .with_context(|| format!("writing {}", dest.display()))?;
        println!("wrote {}", dest.display());
        return Ok(());
    }

    let selected_categories = resolve_category_ids(library, &args.categories)?;
    let options = ExportOptions {
        include_photos: !args.no_photos,
        include_thumbnails: args.thumbnails,
        include_settings: !args.no_settings,
        compression_level: args.compression,
        selected_categories,
        date_range_start: args.after,
        date_range_end: args.before,
    };
    let dest = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_file_name("zip")));

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg:<24} [{bar:30}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let mut progress = |event: ExportProgress| match event {
        ExportProgress::Stage { stage } => {
            bar.set_message(stage.label());
            bar.set_position(0);
        }
        ExportProgress::PhotoCopied { current, total }
        | ExportProgress::ArchiveEntry { current, total } => {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        }
    };

    let summary = library.export_to_zip(&options, &dest, Some(&mut progress))?;
    bar.finish_and_clear();
    println!(
        "wrote {} ({} photos, {} categories, {} bytes)",
        summary.file_path.display(),
        summary.photo_count,
        summary.category_count,
        summary.file_size
    );
    Ok(())
}

/// Map category names from the command line onto stored ids.
fn resolve_category_ids(library: &Library, names: &[String]) -> Result<Option<Vec<String>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let by_name: HashMap<String, String> = library
        .categories()?
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect();
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        match by_name.get(&normalize_category_name(name)) {
            Some(id) => ids.push(id.clone()),
            None => bail!("unknown category: {name}"),
        }
    }
    Ok(Some(ids))
}

fn default_file_name(ext: &str) -> String {
    format!(
        "smilepile-backup-{}.{ext}",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    )
}
