use anyhow::{bail, Result};
use clap::Subcommand;
use smilepile_core::Library;

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print all settings
    Show,
    /// Set a boolean flag: dark-mode, pin, pattern, kid-safe, camera,
    /// delete-protection
    Set { key: String, value: bool },
}

pub fn run(library: &Library, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = library.settings()?;
            let sec = &settings.security_settings;
            println!("dark-mode:         {}", settings.is_dark_mode);
            println!("pin:               {}", sec.has_pin);
            println!("pattern:           {}", sec.has_pattern);
            println!("kid-safe:          {}", sec.kid_safe_mode_enabled);
            println!("camera:            {}", sec.camera_access_allowed);
            println!("delete-protection: {}", sec.delete_protection_enabled);
        }
        SettingsCommand::Set { key, value } => {
            let mut settings = library.settings()?;
            match key.as_str() {
                "dark-mode" => settings.is_dark_mode = value,
                "pin" => settings.security_settings.has_pin = value,
                "pattern" => settings.security_settings.has_pattern = value,
                "kid-safe" => settings.security_settings.kid_safe_mode_enabled = value,
                "camera" => settings.security_settings.camera_access_allowed = value,
                "delete-protection" => {
                    settings.security_settings.delete_protection_enabled = value
                }
                other => bail!("unknown setting: {other}"),
            }
            library.update_settings(&settings)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
