use anyhow::Result;
use clap::Subcommand;
use smilepile_core::Library;

#[derive(Subcommand)]
pub enum CategoryCommand {
    /// Create a category
    Add {
        /// Display name; the unique key is its normalized form
        name: String,
        /// Hex color like #ff8800
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List categories in display order
    List,
    /// Delete a category; its photos become uncategorized
    Remove { name: String },
}

pub fn run(library: &Library, command: CategoryCommand) -> Result<()> {
    match command {
        CategoryCommand::Add {
            name,
            color,
            description,
        } => {
            let category = library.create_category(&name, color, description)?;
            println!("created category '{}' ({})", category.display_name, category.name);
        }
        CategoryCommand::List => {
            let categories = library.categories()?;
            if categories.is_empty() {
                println!("no categories");
                return Ok(());
            }
            for category in categories {
                println!(
                    "{:>3}  {:<24} {:>5} photos{}",
                    category.position,
                    category.display_name,
                    category.photo_count,
                    if category.is_default { "  (default)" } else { "" }
                );
            }
        }
        CategoryCommand::Remove { name } => {
            let removed = library.delete_category(&name)?;
            println!(
                "removed category '{}'; {} photos are now uncategorized",
                removed.display_name, removed.photo_count
            );
        }
    }
    Ok(())
}
