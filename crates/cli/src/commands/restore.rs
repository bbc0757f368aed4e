use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use smilepile_core::{DuplicateResolution, Library, MergeStrategy, RestoreEvent, RestoreOptions};

#[derive(Args)]
pub struct RestoreArgs {
    /// Backup file (.zip or .json)
    file: PathBuf,

    /// merge or replace
    #[arg(long, default_value = "merge")]
    strategy: MergeStrategy,

    /// skip, replace, or rename
    #[arg(long, default_value = "skip")]
    duplicates: DuplicateResolution,

    /// Walk the whole restore without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Verify photo checksums before applying
    #[arg(long)]
    verify: bool,

    /// Leave stored app settings untouched
    #[arg(long)]
    no_settings: bool,

    /// Inspect the backup and print its contents without applying
    #[arg(long)]
    validate_only: bool,
}

pub fn run(library: &Library, args: RestoreArgs) -> Result<()> {
    if args.validate_only {
        let manifest = library.validate_backup(&args.file, args.verify)?;
        println!("{} is a valid backup", args.file.display());
        println!("  format version: {}", manifest.version);
        println!("  exported by:    {}", manifest.app_version);
        println!("  categories:     {}", manifest.categories.len());
        println!("  photos:         {}", manifest.photos.len());
        println!("  settings:       {}", if manifest.settings.is_some() { "yes" } else { "no" });
        return Ok(());
    }

    let options = RestoreOptions {
        strategy: args.strategy,
        duplicate_resolution: args.duplicates,
        dry_run: args.dry_run,
        validate_integrity: args.verify,
        restore_settings: !args.no_settings,
    };

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg:<40} [{bar:30}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    for event in library.restore_from_backup(&args.file, options)? {
        match event {
            RestoreEvent::Progress {
                processed_items,
                total_items,
                current_operation,
                ..
            } => {
                bar.set_length(total_items as u64);
                bar.set_position(processed_items as u64);
                bar.set_message(current_operation);
            }
            RestoreEvent::Complete {
                applied_categories,
                applied_photos,
                settings_applied,
                skipped,
                errors,
                dry_run,
            } => {
                bar.finish_and_clear();
                println!(
                    "{}applied {applied_categories} categories, {applied_photos} photos, \
                     skipped {skipped}{}",
                    if dry_run { "[dry run] would have " } else { "" },
                    if settings_applied { ", settings restored" } else { "" }
                );
                for error in &errors {
                    eprintln!("warning: {error}");
                }
            }
            RestoreEvent::Failed {
                phase,
                applied_items,
                message,
            } => {
                bar.finish_and_clear();
                bail!(
                    "restore failed during '{}' after {applied_items} items: {message}",
                    phase.label()
                );
            }
        }
    }
    Ok(())
}
