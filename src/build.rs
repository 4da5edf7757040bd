//! One build: external site builder, then the post-build steps.
//!
//! ```text
//! SitePipeline::run()
//!     │
//!     ├── SiteBuilder::build() ──► `astrodon build --content .. --out ..`
//!     │
//!     └── rayon::join
//!             ├── inject_dir()  ──► snippet into every output page
//!             └── build_feed()  ──► posts → feed.xml
//! ```

use crate::{
    config::SiteConfig,
    exec,
    generator::feed::build_feed,
    log,
    utils::inject::{InjectReport, inject_dir},
};
use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// ============================================================================
// Site Builder
// ============================================================================

/// Directories handed to the site builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirs {
    pub root: PathBuf,
    pub content: PathBuf,
    pub output: PathBuf,
    pub assets: PathBuf,
    pub components: PathBuf,
}

impl BuildDirs {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            root: config.get_root().to_path_buf(),
            content: config.build.content.clone(),
            output: config.build.output.clone(),
            assets: config.build.assets.clone(),
            components: config.build.components.clone(),
        }
    }
}

/// Renders the site's pages into the output directory.
pub trait SiteBuilder {
    fn build(&self, dirs: &BuildDirs) -> Result<()>;
}

/// Runs the configured builder command in the project root.
#[derive(Debug, Clone)]
pub struct ExternalBuilder {
    pub command: Vec<String>,
}

impl SiteBuilder for ExternalBuilder {
    fn build(&self, dirs: &BuildDirs) -> Result<()> {
        exec!(
            dirs.root.as_path();
            &self.command;
            "--content", &dirs.content,
            "--out", &dirs.output,
            "--assets", &dirs.assets,
            "--components", &dirs.components,
        )
        .context("Site builder failed")?;
        Ok(())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Counts from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Output pages considered for injection.
    pub scanned: usize,
    /// Output pages that received the snippet.
    pub patched: usize,
    pub feed_entries: usize,
    pub elapsed: Duration,
}

/// A complete build, as seen by the watch supervisor.
pub trait Pipeline {
    fn run(&self) -> Result<BuildReport>;
}

/// Builder, then injection and feed over the fresh output.
pub struct SitePipeline<'a, B: SiteBuilder = ExternalBuilder> {
    config: &'a SiteConfig,
    builder: B,
}

impl<'a> SitePipeline<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self::with_builder(
            config,
            ExternalBuilder {
                command: config.build.command.clone(),
            },
        )
    }
}

impl<'a, B: SiteBuilder> SitePipeline<'a, B> {
    pub const fn with_builder(config: &'a SiteConfig, builder: B) -> Self {
        Self { config, builder }
    }
}

impl<B: SiteBuilder> Pipeline for SitePipeline<'_, B> {
    fn run(&self) -> Result<BuildReport> {
        let start = Instant::now();
        let config = self.config;

        self.builder.build(&BuildDirs::from_config(config))?;

        // Injection touches output pages only; the feed reads posts and
        // writes a single xml file, so the two never overlap.
        let (inject, feed) = rayon::join(
            || inject_output(config),
            || build_feed(config),
        );
        let inject = inject?;
        let feed_entries = feed?;

        Ok(BuildReport {
            scanned: inject.scanned,
            patched: inject.patched,
            feed_entries,
            elapsed: start.elapsed(),
        })
    }
}

fn inject_output(config: &SiteConfig) -> Result<InjectReport> {
    let analytics = &config.build.analytics;
    if !analytics.enable {
        return Ok(InjectReport::default());
    }

    let report = inject_dir(&config.build.output, analytics)?;
    if report.patched > 0 {
        log!("inject"; "patched {} of {} pages", report.patched, report.scanned);
    }
    Ok(report)
}

/// Run one build and log its summary.
pub fn build_site(config: &SiteConfig) -> Result<BuildReport> {
    log!("build"; "building {}", rel_display(&config.build.content, config.get_root()));

    let report = SitePipeline::new(config).run()?;
    log_report(&report);
    Ok(report)
}

pub fn log_report(report: &BuildReport) {
    log!(
        "build";
        "done in {:.2}s ({} pages, {} patched, {} feed entries)",
        report.elapsed.as_secs_f64(),
        report.scanned,
        report.patched,
        report.feed_entries
    );
}

fn rel_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// ============================================================================
// Tests
// ============================================================================
