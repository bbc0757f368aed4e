use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use smilepile_core::Library;

mod commands;

#[derive(Parser)]
#[command(
    name = "smilepile",
    version,
    about = "Photo library with categories, soft deletion, and ZIP backup/restore"
)]
struct Cli {
    /// Library directory (created on first use)
    #[arg(short, long, default_value = ".", global = true)]
    library: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage categories
    #[command(subcommand)]
    Category(commands::categories::CategoryCommand),
    /// Manage photos
    #[command(subcommand)]
    Photo(commands::photos::PhotoCommand),
    /// Export the library to a backup file
    Backup(commands::backup::BackupArgs),
    /// Restore the library from a backup file
    Restore(commands::restore::RestoreArgs),
    /// Show library counts and backup history
    Status,
    /// Show or change app settings
    #[command(subcommand)]
    Settings(commands::settings::SettingsCommand),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let library = Library::open(&cli.library)?;
    match cli.command {
        Command::Category(command) => commands::categories::run(&library, command),
        Command::Photo(command) => commands::photos::run(&library, command),
        Command::Backup(args) => commands::backup::run(&library, args),
        Command::Restore(args) => commands::restore::run(&library, args),
        Command::Status => commands::status::run(&library),
        Command::Settings(command) => commands::settings::run(&library, command),
    }
}
