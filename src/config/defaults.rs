//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn title() -> String {
        "nergy.space".into()
    }

    pub fn description() -> String {
        "Notes and posts".into()
    }

    pub fn url() -> String {
        "https://nergy.space".into()
    }

    pub fn author() -> String {
        "nergy".into()
    }

    pub fn language() -> String {
        "en".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "routes".into()
    }

    pub fn output() -> PathBuf {
        "dist".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn components() -> PathBuf {
        "components".into()
    }

    pub fn posts() -> PathBuf {
        "routes/blogs".into()
    }

    pub fn command() -> Vec<String> {
        vec!["astrodon".into(), "build".into()]
    }

    pub mod feed {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "feed.xml".into()
        }

        pub fn excerpt_len() -> usize {
            crate::utils::excerpt::DEFAULT_MAX_LEN
        }

        pub fn permalink_prefix() -> String {
            "blogs".into()
        }
    }

    pub mod analytics {
        pub fn snippet() -> String {
            r#"<script defer src="https://umami.nergy.space/script.js" data-website-id="d3572366-bf4c-462c-8c3e-d3db77869836"></script>"#.into()
        }

        pub fn marker() -> String {
            "umami.nergy.space/script.js".into()
        }

        pub fn extensions() -> Vec<String> {
            vec!["html".into()]
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8000
    }
}
