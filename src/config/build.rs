//! `[build]` section configuration.
//!
//! Directory layout handed to the site builder, the builder command itself,
//! and the two post-build steps (analytics injection and the feed).

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in site.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "routes"
/// output = "dist"
/// command = ["astrodon", "build"]
///
/// [build.feed]
/// excerpt_len = 200
///
/// [build.analytics]
/// enable = false
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (set from CLI, not from the file).
    #[serde(skip)]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Page sources handed to the builder.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Builder output directory; also the directory that gets served.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Static assets copied by the builder.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Shared components used by the builder.
    #[serde(default = "defaults::build::components")]
    #[educe(Default = defaults::build::components())]
    pub components: PathBuf,

    /// Markdown posts that make up the feed.
    #[serde(default = "defaults::build::posts")]
    #[educe(Default = defaults::build::posts())]
    pub posts: PathBuf,

    /// External site builder command (program followed by fixed arguments).
    #[serde(default = "defaults::build::command")]
    #[educe(Default = defaults::build::command())]
    pub command: Vec<String>,

    /// Feed generation settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Analytics snippet injection settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// `[build.feed]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Enable feed generation.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Feed file path, relative to the output directory.
    #[serde(default = "defaults::build::feed::path")]
    #[educe(Default = defaults::build::feed::path())]
    pub path: PathBuf,

    /// Maximum excerpt length in characters (ellipsis not counted).
    #[serde(default = "defaults::build::feed::excerpt_len")]
    #[educe(Default = defaults::build::feed::excerpt_len())]
    pub excerpt_len: usize,

    /// URL segment between the base URL and the post slug.
    #[serde(default = "defaults::build::feed::permalink_prefix")]
    #[educe(Default = defaults::build::feed::permalink_prefix())]
    pub permalink_prefix: String,
}

/// `[build.analytics]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Enable snippet injection.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Markup inserted before `</body>`.
    #[serde(default = "defaults::build::analytics::snippet")]
    #[educe(Default = defaults::build::analytics::snippet())]
    pub snippet: String,

    /// Substring whose presence means the snippet is already in the file.
    #[serde(default = "defaults::build::analytics::marker")]
    #[educe(Default = defaults::build::analytics::marker())]
    pub marker: String,

    /// File extensions (without dot) that receive the snippet.
    #[serde(default = "defaults::build::analytics::extensions")]
    #[educe(Default = defaults::build::analytics::extensions())]
    pub extensions: Vec<String>,
}
