//! CLI argument definitions using clap derive API

use clap::Parser;
use std::path::PathBuf;

/// migshell - pick a connection profile, repair gap migrations, apply the rest
#[derive(Parser, Debug)]
#[command(name = "ms")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding profiles.json [default: <user config dir>/migshell]
    #[arg(long, env = "MIGSHELL_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Report progress through the log instead of spinners
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
