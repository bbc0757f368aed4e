use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use smilepile_core::Library;

#[derive(Subcommand)]
pub enum PhotoCommand {
    /// Copy a photo file into the library
    Import {
        file: PathBuf,
        /// Assign to this category
        #[arg(long)]
        category: Option<String>,
    },
    /// List photos, optionally for one category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Soft-delete a photo (recoverable with `photo restore`)
    Delete { id: String },
    /// Recover a soft-deleted photo
    Restore { id: String },
    /// Mark or unmark a photo as favorite
    Favorite {
        id: String,
        #[arg(long)]
        remove: bool,
    },
}

pub fn run(library: &Library, command: PhotoCommand) -> Result<()> {
    match command {
        PhotoCommand::Import { file, category } => {
            let photo = library.import_photo(&file, category.as_deref())?;
            println!("imported '{}' as {}", photo.name, photo.id);
        }
        PhotoCommand::List { category } => {
            let photos = match category {
                Some(name) => library.photos_by_category(&name)?,
                None => library.photos()?,
            };
            if photos.is_empty() {
                println!("no photos");
                return Ok(());
            }
            for photo in photos {
                println!(
                    "{}  {:<28} {:>9}B{}",
                    photo.id,
                    photo.name,
                    photo.file_size,
                    if photo.is_favorite { "  *" } else { "" }
                );
            }
        }
        PhotoCommand::Delete { id } => {
            library.delete_photo(&id)?;
            println!("deleted {id} (recoverable with `photo restore {id}`)");
        }
        PhotoCommand::Restore { id } => {
            library.undelete_photo(&id)?;
            println!("restored {id}");
        }
        PhotoCommand::Favorite { id, remove } => {
            library.set_favorite(&id, !remove)?;
            println!("{} favorite on {id}", if remove { "removed" } else { "set" });
        }
    }
    Ok(())
}
