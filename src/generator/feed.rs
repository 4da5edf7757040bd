//! RSS feed generation from markdown posts.
//!
//! Posts are read straight from the posts directory (the builder's output
//! carries no metadata), summarized from their front matter and body, and
//! written as a single RSS 2.0 document into the output directory.

use crate::{
    config::SiteConfig,
    log,
    utils::{
        date::PostDate,
        excerpt::excerpt,
        frontmatter::{self, Document, FieldValue, FrontMatter},
    },
};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use rss::{
    ChannelBuilder, GuidBuilder, Item, ItemBuilder,
    extension::atom::{AtomExtension, Link},
    validation::Validate,
};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use walkdir::WalkDir;

const POST_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];
const SECTION_INDEX: &str = "index.md";
const GENERATOR: &str = "quire";

static RE_CDATA_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description><!\[CDATA\[(.*?)\]\]></description>").unwrap()
});

// ============================================================================
// Public API
// ============================================================================

/// Write the feed if enabled. Returns the number of entries written.
pub fn build_feed(config: &SiteConfig) -> Result<usize> {
    if !config.build.feed.enable {
        return Ok(0);
    }
    write_feed(config, Utc::now())
}

/// Collect, sort, render and atomically write the feed using `now` as the
/// build instant and the stand-in for unreadable dates.
pub fn write_feed(config: &SiteConfig, now: DateTime<Utc>) -> Result<usize> {
    let mut posts = collect_posts(&config.build.posts, config, now)?;
    sort_posts(&mut posts);

    let xml = render_feed(&posts, config, now)?;
    let path = config.feed_path();
    write_atomic(&path, &xml)?;

    log!("feed"; "{} entries -> {}", posts.len(), path.display());
    Ok(posts.len())
}

// ============================================================================
// Post Summaries
// ============================================================================

/// Everything the feed needs from one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub title: String,
    /// Date as written in the front matter (empty when absent).
    pub date_raw: String,
    pub date: PostDate,
    pub author: String,
    /// File stem, used in the permalink.
    pub slug: String,
    pub description: String,
    pub source: PathBuf,
}

impl PostSummary {
    /// Summarize one post's text.
    pub fn from_text(source: &Path, text: &str, config: &SiteConfig, now: DateTime<Utc>) -> Self {
        let doc = frontmatter::parse(text);
        let fm = &doc.front_matter;

        let slug = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let date_raw = field(fm, "date").unwrap_or_default();
        let description = field(fm, "description")
            .unwrap_or_else(|| excerpt(doc.body, config.build.feed.excerpt_len));

        let summary = Self {
            title: field(fm, "title").unwrap_or_else(|| slug.clone()),
            date: PostDate::parse_or(&date_raw, now),
            date_raw,
            author: field(fm, "author").unwrap_or_else(|| config.base.author.clone()),
            slug,
            description,
            source: source.to_path_buf(),
        };
        summary.log_fallbacks(&doc);
        summary
    }

    /// Report every value that was substituted or kept raw.
    fn log_fallbacks(&self, doc: &Document<'_>) {
        let file = self.source.file_name().unwrap_or_default().to_string_lossy();
        let fm = &doc.front_matter;

        if !doc.has_block {
            log!("feed"; "{file}: no front matter");
        } else if fm.is_empty() {
            log!("feed"; "{file}: empty front matter");
        }

        for key in fm.keys() {
            if fm.get(key).is_some_and(FieldValue::is_fallback) {
                log!("feed"; "{file}: `{key}` is not valid structured data, kept as text");
            }
        }

        if self.date.is_fallback() {
            if self.date_raw.is_empty() {
                log!("feed"; "{file}: no date, using build time");
            } else {
                log!("feed"; "{file}: unreadable date `{}`, using build time", self.date_raw);
            }
        }
    }

    /// Absolute URL of the rendered post.
    pub fn permalink(&self, config: &SiteConfig) -> String {
        let prefix = config.build.feed.permalink_prefix.trim_matches('/');
        let slug = urlencoding::encode(&self.slug);
        if prefix.is_empty() {
            format!("{}/{slug}", config.base.url_trimmed())
        } else {
            format!("{}/{prefix}/{slug}", config.base.url_trimmed())
        }
    }

    fn to_item(&self, config: &SiteConfig) -> Item {
        let link = self.permalink(config);
        ItemBuilder::default()
            .title(self.title.clone())
            .link(link.clone())
            .guid(GuidBuilder::default().permalink(true).value(link).build())
            .description(self.description.clone())
            .pub_date(self.date.to_rfc2822())
            .author(self.author.clone())
            .build()
    }
}

fn field(fm: &FrontMatter, key: &str) -> Option<String> {
    fm.text(key).map(|s| s.trim().to_owned())
}

/// Read every post directly inside `dir`, in file name order.
pub fn collect_posts(dir: &Path, config: &SiteConfig, now: DateTime<Utc>) -> Result<Vec<PostSummary>> {
    let mut posts = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read posts directory {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_post(path) {
            continue;
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read post {}", path.display()))?;
        posts.push(PostSummary::from_text(path, &text, config, now));
    }

    Ok(posts)
}

fn is_post(path: &Path) -> bool {
    let is_index = path.file_name().is_some_and(|name| name == SECTION_INDEX);
    let has_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| POST_EXTENSIONS.contains(&ext));
    has_ext && !is_index
}

/// Newest first. Stable, so equal dates keep file name order.
pub fn sort_posts(posts: &mut [PostSummary]) {
    posts.sort_by(|a, b| b.date.instant().cmp(&a.date.instant()));
}

// ============================================================================
// Rendering
// ============================================================================

/// Render sorted posts into a validated RSS 2.0 document.
pub fn render_feed(posts: &[PostSummary], config: &SiteConfig, now: DateTime<Utc>) -> Result<String> {
    let items: Vec<Item> = posts.iter().map(|post| post.to_item(config)).collect();

    let channel = ChannelBuilder::default()
        .title(config.base.title.clone())
        .link(config.base.url_trimmed().to_owned())
        .description(config.base.description.clone())
        .language(config.base.language.clone())
        .last_build_date(now.to_rfc2822())
        .generator(GENERATOR.to_owned())
        .atom_ext(self_link(&config.feed_url()))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("feed validation failed: {e}"))?;
    Ok(escape_descriptions(&channel.to_string()))
}

/// `rss` writes item descriptions as CDATA; rewrite them as escaped text.
fn escape_descriptions(xml: &str) -> String {
    RE_CDATA_DESCRIPTION
        .replace_all(xml, |caps: &Captures| {
            // A `]]>` in the text is split across adjacent CDATA sections.
            let text = caps[1].replace("]]><![CDATA[", "");
            format!("<description>{}</description>", escape_xml(&text))
        })
        .into_owned()
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn self_link(feed_url: &str) -> AtomExtension {
    let mut link = Link::default();
    link.set_href(feed_url);
    link.set_rel("self");
    link.set_mime_type(Some("application/rss+xml".to_owned()));

    let mut ext = AtomExtension::default();
    ext.set_links(vec![link]);
    ext
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
