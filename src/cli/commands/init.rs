//! Init and Config commands.

use crate::config::{ConfigError, Settings};

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    match Settings::init_config_file(force) {
        Ok(path) => {
            if force {
                println!("Wrote configuration file at: {}", path.display());
            } else {
                println!("Created configuration file at: {}", path.display());
            }
            println!("Set alert.token_url before running 'canary-watch watch'.");
            Ok(())
        }
        Err(e @ ConfigError::AlreadyExists { .. }) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context("could not create configuration")),
    }
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(config) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => eprintln!("Error displaying config: {e}"),
    }
}
