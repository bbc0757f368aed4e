use anyhow::Result;
use smilepile_core::Library;

pub fn run(library: &Library) -> Result<()> {
    let stats = library.backup_stats()?;
    println!(
        "{} categories, {} photos",
        stats.category_count, stats.photo_count
    );

    let history = library.backup_history()?;
    if history.is_empty() {
        println!("no backups yet");
        return Ok(());
    }
    println!("backup history (newest first):");
    for entry in history {
        println!(
            "  {}  {:<36} {:>4} {:>9}B  {} photos  {}",
            entry.timestamp,
            entry.file_name,
            entry.format.as_str(),
            entry.file_size,
            entry.photos_count,
            if entry.success { "ok" } else { "FAILED" }
        );
    }
    Ok(())
}
