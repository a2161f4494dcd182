//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;
use std::time::Duration;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Parse a `--linger` value. Settings hold whole milliseconds, so a nonzero
/// value below 1ms is rejected instead of silently becoming zero.
fn parse_linger(value: &str) -> Result<Duration, String> {
    let linger = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if !linger.is_zero() && linger < Duration::from_millis(1) {
        return Err(format!("{value} is below the 1ms resolution; use 0 or at least 1ms"));
    }
    Ok(linger)
}

/// Ping a canary token when files are touched
#[derive(Parser, Debug)]
#[command(
    name = "canary-watch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Ping a canary token when files are touched",
    long_about = "Watch a file or directory and hit a canary token url whenever it is \
                  created, written, renamed or removed. Bursts of changes to the same \
                  path are coalesced into a single ping.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a path and ping the token url on changes
    Watch(WatchArgs),

    /// Set up .canary-watch directory with default settings
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,
}

/// Flags for the watch command. Each one overrides file and env settings.
#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    /// File or directory to monitor for changes
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Canary token url generated from canarytokens.org to be pinged on events
    #[arg(long)]
    pub token_url: Option<String>,

    /// Time to wait for new events to arrive before pinging the token url (e.g. 1s, 250ms)
    #[arg(long, value_parser = parse_linger)]
    pub linger: Option<Duration>,

    /// Also watch subdirectories
    #[arg(long)]
    pub recursive: bool,
}
