//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use template_clone::output::{ColorChoice, OutputConfig};

/// Template Clone - Clone template entity graphs in a schema-driven store
#[derive(Parser, Debug)]
#[command(name = "template-clone")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone a template into a subject entity of a store snapshot
    Clone(commands::clone::CloneArgs),

    /// Validate a type catalog and its auto-link pairings
    Validate(commands::validate::ValidateArgs),

    /// Show the clone action chosen for every field of a catalog
    Plan(commands::plan::PlanArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::new(self.color);

        match self.command {
            Commands::Clone(args) => commands::clone::execute(args, &output),
            Commands::Validate(args) => commands::validate::execute(args, &output),
            Commands::Plan(args) => commands::plan::execute(args),
        }
    }
}

/// Install the process logger. `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // a logger may already be installed when running inside tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
