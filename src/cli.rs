use crate::RunConfig;
use clap::Parser;
use std::path::PathBuf;

pub const USAGE: &str = "Usage: BOT=botname shotbot [--dry]";

/// First positional argument that switches on dry-run mode (case-insensitive).
pub const DRY_RUN_FLAG: &str = "--dry";

/// Exit code when the pipeline gives up or the bot cannot be loaded.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when no bot was named.
pub const EXIT_USAGE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "shotbot")]
#[command(about = "Capture a web screenshot and post it to social targets")]
#[command(version)]
pub struct Cli {
    #[arg(long, env = "BOT", help = "Bot whose config and behavior files to load")]
    pub bot: Option<String>,

    #[arg(
        long,
        env = "SHOTBOT_HOME",
        default_value = ".",
        help = "Directory containing configs/, behaviors/ and scratch/"
    )]
    pub config_dir: PathBuf,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        value_name = "MODE",
        allow_hyphen_values = true,
        help = "Pass --dry to write the image to scratch/ instead of posting"
    )]
    pub mode: Option<String>,
}

impl Cli {
    /// Selected bot name; an empty or blank `BOT` counts as unset.
    pub fn bot(&self) -> Option<&str> {
        self.bot.as_deref().filter(|bot| !bot.trim().is_empty())
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case(DRY_RUN_FLAG))
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            dry_run: self.is_dry_run(),
            scratch_dir: self.config_dir.join("scratch"),
        }
    }
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
}
