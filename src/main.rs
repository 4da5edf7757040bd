//! quire: build, serve and watch a static blog.

mod build;
mod cli;
mod config;
mod generator;
mod logger;
mod serve;
mod supervisor;
mod utils;
mod watch;

use anyhow::Result;
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use watch::watch_site;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(SiteConfig::load(cli)?));

    match &cli.command {
        Commands::Build => build_site(config).map(|_| ()),
        Commands::Serve { .. } => serve_site(config),
        Commands::Watch => watch_site(config),
    }
}
