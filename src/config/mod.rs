//! Site configuration management for `site.toml`.
//!
//! # Sections
//!
//! | Section             | Purpose                                     |
//! |---------------------|---------------------------------------------|
//! | `[base]`            | Site metadata (title, author, url)          |
//! | `[build]`           | Directory layout and builder command        |
//! | `[build.feed]`      | Feed path, excerpt length, permalinks       |
//! | `[build.analytics]` | Snippet injected into every output page     |
//! | `[serve]`           | Static server interface and port            |
//! | `[watch]`           | What to do with changes during a build      |
//!
//! The file is optional: without it every value takes its default, which
//! reproduces the site's fixed layout (`routes/`, `dist/`, port 8000).
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! url = "https://example.com"
//!
//! [build]
//! command = ["astrodon", "build"]
//!
//! [serve]
//! port = 8000
//! ```

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use build::AnalyticsConfig;
pub use serve::BusyPolicy;

use base::BaseConfig;
use build::BuildConfig;
use error::ConfigError;
use serve::{ServeConfig, WatchConfig};

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing site.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Static server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Watch loop settings
    #[serde(default)]
    pub watch: WatchConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in `{}`", path.display()))
    }

    /// Load the config named on the command line, falling back to defaults
    /// when the file does not exist, then resolve and validate it.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = expand_root(cli.root.as_deref());
        let config_path = root.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.config_path = cli.config.clone();
        config.update_with_cli(cli, &root);
        config.validate(cli)?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Absolute path of the feed file.
    pub fn feed_path(&self) -> PathBuf {
        self.build.output.join(&self.build.feed.path)
    }

    /// Public URL of the feed file (used for the self link).
    pub fn feed_url(&self) -> String {
        let rel = self.build.feed.path.to_string_lossy().replace('\\', "/");
        format!("{}/{}", self.base.url_trimmed(), rel.trim_start_matches('/'))
    }

    /// Update configuration with CLI arguments and resolve paths against root
    pub fn update_with_cli(&mut self, cli: &Cli, root: &Path) {
        if let Commands::Serve { interface, port } = &cli.command {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
        self.update_path_with_root(root);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(&self.config_path));
        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.assets = Self::normalize_path(&root.join(&self.build.assets));
        self.build.components = Self::normalize_path(&root.join(&self.build.components));
        self.build.posts = Self::normalize_path(&root.join(&self.build.posts));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self, cli: &Cli) -> Result<()> {
        let url = &self.base.url;
        if self.build.feed.enable && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            bail!(ConfigError::Invalid {
                field: "[base.url]",
                reason: "must start with http:// or https://",
            });
        }

        if self.build.analytics.enable && !self.build.analytics.snippet.contains("</") {
            bail!(ConfigError::Invalid {
                field: "[build.analytics.snippet]",
                reason: "does not look like markup",
            });
        }

        if cli.runs_builder() {
            Self::check_command_installed("[build.command]", &self.build.command)?;
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::EmptyCommand(field.to_owned()));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

/// Resolve the `--root` argument, expanding a leading `~`.
fn expand_root(root: Option<&Path>) -> PathBuf {
    match root {
        Some(path) => {
            let raw = path.to_string_lossy();
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        }
        None => PathBuf::from("./"),
    }
}

// ============================================================================
// Tests
// ============================================================================
