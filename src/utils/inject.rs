//! Analytics snippet injection into generated pages.

use crate::config::AnalyticsConfig;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{fs, path::Path};
use walkdir::WalkDir;

const BODY_CLOSE: &str = "</body>";

/// Outcome of patching one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// Snippet inserted; holds the new text.
    Inserted(String),
    /// Marker already present, text untouched.
    AlreadyPresent,
    /// No `</body>` to anchor on, text untouched.
    NoBodyTag,
}

/// Counts from one pass over the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectReport {
    pub scanned: usize,
    pub patched: usize,
}

/// Insert `snippet` and a newline right before the first `</body>`,
/// unless `marker` already occurs in `html`.
pub fn inject_snippet(html: &str, snippet: &str, marker: &str) -> Injection {
    if html.contains(marker) {
        return Injection::AlreadyPresent;
    }
    let Some(pos) = html.find(BODY_CLOSE) else {
        return Injection::NoBodyTag;
    };

    let mut out = String::with_capacity(html.len() + snippet.len() + 1);
    out.push_str(&html[..pos]);
    out.push_str(snippet);
    out.push('\n');
    out.push_str(&html[pos..]);
    Injection::Inserted(out)
}

/// Patch every matching file under `dir` in place.
///
/// Only changed files are written back.
pub fn inject_dir(dir: &Path, config: &AnalyticsConfig) -> Result<InjectReport> {
    let files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| has_extension(path, &config.extensions))
        .collect();

    let patched = files
        .par_iter()
        .map(|path| inject_file(path, config))
        .collect::<Result<Vec<bool>>>()?
        .into_iter()
        .filter(|&changed| changed)
        .count();

    Ok(InjectReport {
        scanned: files.len(),
        patched,
    })
}

/// Returns whether the file was rewritten.
fn inject_file(path: &Path, config: &AnalyticsConfig) -> Result<bool> {
    let html =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match inject_snippet(&html, &config.snippet, &config.marker) {
        Injection::Inserted(patched) => {
            fs::write(path, patched)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(true)
        }
        Injection::AlreadyPresent | Injection::NoBodyTag => Ok(false),
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SNIPPET: &str = r#"<script defer src="https://stats.example/script.js"></script>"#;
    const MARKER: &str = "stats.example/script.js";

    fn config() -> AnalyticsConfig {
        AnalyticsConfig {
            snippet: SNIPPET.into(),
            marker: MARKER.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_inject_before_body_close() {
        let html = "<html><body><p>hi</p></body></html>";
        let Injection::Inserted(out) = inject_snippet(html, SNIPPET, MARKER) else {
            panic!("expected insertion");
        };
        assert_eq!(out, format!("<html><body><p>hi</p>{SNIPPET}\n</body></html>"));
    }

    #[test]
    fn test_inject_is_idempotent() {
        let html = "<body>x</body>";
        let Injection::Inserted(once) = inject_snippet(html, SNIPPET, MARKER) else {
            panic!("expected insertion");
        };
        assert_eq!(inject_snippet(&once, SNIPPET, MARKER), Injection::AlreadyPresent);
        assert_eq!(once.matches(MARKER).count(), 1);
    }

    #[test]
    fn test_inject_first_body_close_only() {
        let html = "<body><pre>&lt;/body&gt;</pre></body><!-- </body> -->";
        let Injection::Inserted(out) = inject_snippet(html, SNIPPET, MARKER) else {
            panic!("expected insertion");
        };
        assert_eq!(out.matches(SNIPPET).count(), 1);
        assert!(out.ends_with("</pre><script defer src=\"https://stats.example/script.js\"></script>\n</body><!-- </body> -->"));
    }

    #[test]
    fn test_missing_body_tag_untouched() {
        assert_eq!(
            inject_snippet("<p>fragment</p>", SNIPPET, MARKER),
            Injection::NoBodyTag
        );
    }

    #[test]
    fn test_inject_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("blogs/hello")).unwrap();
        fs::write(root.join("index.html"), "<body>home</body>").unwrap();
        fs::write(root.join("blogs/hello/index.html"), "<BODY>post</body>").unwrap();
        fs::write(root.join("partial.html"), "<div>no body</div>").unwrap();
        fs::write(root.join("style.css"), "body{} </body>").unwrap();

        let report = inject_dir(root, &config()).unwrap();
        assert_eq!(report, InjectReport { scanned: 3, patched: 2 });

        let home = fs::read_to_string(root.join("index.html")).unwrap();
        assert!(home.contains(MARKER));
        assert_eq!(fs::read_to_string(root.join("style.css")).unwrap(), "body{} </body>");
        assert_eq!(
            fs::read_to_string(root.join("partial.html")).unwrap(),
            "<div>no body</div>"
        );

        // Second pass changes nothing
        let report = inject_dir(root, &config()).unwrap();
        assert_eq!(report, InjectReport { scanned: 3, patched: 0 });
        assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), home);
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let exts = vec!["html".to_string()];
        assert!(has_extension(Path::new("a/B.HTML"), &exts));
        assert!(!has_extension(Path::new("a/b.htm"), &exts));
        assert!(!has_extension(Path::new("a/html"), &exts));
    }
}
