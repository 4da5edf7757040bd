//! Command-line interface definitions.
//!
//! Three independent entry points: `build`, `serve` and `watch`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quire: build, serve and watch a static blog
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to root (default: site.toml)
    #[arg(short = 'C', long, global = true, default_value = "site.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the site builder once, inject the analytics script and write the feed
    Build,

    /// Serve the output directory over HTTP
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build, serve, and rebuild + restart the server on every change
    Watch,
}

impl Cli {
    /// Whether this invocation runs the external site builder.
    pub const fn runs_builder(&self) -> bool {
        matches!(self.command, Commands::Build | Commands::Watch)
    }
}
